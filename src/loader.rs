//! Archive extraction, log discovery and the image index.

use crate::error::ExtractionError;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_SCAN_DEPTH: usize = 3;

/// Unpack the whole archive into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
    let file = fs::File::open(archive).map_err(|source| ExtractionError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let archive_error = |source| ExtractionError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = zip::ZipArchive::new(file).map_err(archive_error)?;
    zip.extract(dest).map_err(archive_error)?;
    debug!(entries = zip.len(), dest = %dest.display(), "archive extracted");
    Ok(())
}

/// Find the conversation log under `root`, scanning up to 3 levels deep.
///
/// A log at the root always wins. Otherwise the shallowest match is used,
/// ties broken by path order.
pub fn find_conversation_log(root: &Path, name: &str) -> Result<PathBuf, ExtractionError> {
    let direct = root.join(name);
    if direct.is_file() {
        return Ok(direct);
    }

    let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back((root.to_path_buf(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }

        if current != root {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if depth == MAX_SCAN_DEPTH {
            continue;
        }

        let entries = fs::read_dir(&current).map_err(|source| ExtractionError::Read {
            path: current.clone(),
            source,
        })?;
        let mut children: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_dir())
            .collect();
        children.sort();
        queue.extend(children.into_iter().map(|path| (path, depth + 1)));
    }

    Err(ExtractionError::MissingLog {
        name: name.to_string(),
    })
}

/// Filename-to-path lookup over the image folder, sorted by filename.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    files: BTreeMap<String, PathBuf>,
}

impl ImageIndex {
    /// Index the regular files directly inside `dir`.
    ///
    /// A missing folder gives an empty index; exports without images are valid.
    pub fn scan(dir: &Path) -> Result<Self, ExtractionError> {
        let mut files = BTreeMap::new();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no image folder");
            return Ok(Self { files });
        }

        let read_error = |source| ExtractionError::Read {
            path: dir.to_path_buf(),
            source,
        };
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                files.insert(name.to_string(), path.clone());
            }
        }

        debug!(images = ?files.keys().collect::<Vec<_>>(), "images indexed");
        Ok(Self { files })
    }

    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        Self {
            files: files.into_iter().collect(),
        }
    }

    /// First indexed file whose name starts with `asset_id`.
    ///
    /// Keys are sorted, so every name sharing the prefix sits in one run
    /// starting at the first key not below `asset_id`.
    pub fn resolve(&self, asset_id: &str) -> Option<&Path> {
        if asset_id.is_empty() {
            return None;
        }
        self.files
            .range::<str, _>((Bound::Included(asset_id), Bound::Unbounded))
            .next()
            .filter(|(name, _)| name.starts_with(asset_id))
            .map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
