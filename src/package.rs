//! Bundling rendered documents into the result archive.

use crate::error::PackagingError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write every document into one zip at `output`, named by base file name.
///
/// Entries keep the order given. If two documents share a base name the
/// later one replaces the earlier, and a warning is logged.
pub fn pack_documents(documents: &[PathBuf], output: &Path) -> Result<PathBuf, PackagingError> {
    let mut entries: Vec<(String, &Path)> = Vec::with_capacity(documents.len());
    for path in documents {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(pos) = entries.iter().position(|(existing, _)| *existing == name) {
            warn!(entry = %name, "duplicate entry name, keeping the later document");
            entries.remove(pos);
        }
        entries.push((name, path.as_path()));
    }

    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| PackagingError::Io { path, source }
    };

    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(io_error(parent))?;
    let mut zip = ZipWriter::new(staged.as_file_mut());
    for &(ref name, path) in &entries {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)?;
        let mut source = fs::File::open(path).map_err(io_error(path))?;
        io::copy(&mut source, &mut zip).map_err(io_error(output))?;
    }
    zip.finish()?;

    staged.persist(output)?;
    info!(entries = entries.len(), output = %output.display(), "result archive written");
    Ok(output.to_path_buf())
}
