//! End-to-end conversion: export archive in, archive of documents out.

use crate::error::{ConvertError, ExtractionError, RenderError};
use crate::loader::{extract_archive, find_conversation_log, ImageIndex};
use crate::package::pack_documents;
use crate::parser::decode_conversation_log;
use crate::render::{assign_file_names, render_conversation};
use crate::types::{RawConversation, RenderedDocument};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_LOG_FILE: &str = "conversations.json";
pub const DEFAULT_IMAGE_DIR: &str = "Dalle-generations";
pub const DEFAULT_OUTPUT_NAME: &str = "conversations_output.zip";

/// Knobs for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Name of the conversation log inside the archive.
    pub log_file_name: String,
    /// Image folder, relative to the directory holding the log.
    pub image_dir: String,
    /// Destination of the result archive. Defaults to
    /// `conversations_output.zip` beside the input archive.
    pub output_path: Option<PathBuf>,
    /// Render conversations on the rayon pool.
    pub parallel: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            log_file_name: DEFAULT_LOG_FILE.to_string(),
            image_dir: DEFAULT_IMAGE_DIR.to_string(),
            output_path: None,
            parallel: true,
        }
    }
}

impl ConvertOptions {
    fn output_for(&self, input: &Path) -> PathBuf {
        self.output_path.clone().unwrap_or_else(|| {
            input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_NAME)
        })
    }
}

/// What a successful run produced.
#[derive(Debug)]
pub struct ConversionReport {
    pub output: PathBuf,
    /// Documents in the result archive, in log order.
    pub documents: Vec<RenderedDocument>,
    /// Conversations left out of the result archive.
    pub failures: Vec<RenderError>,
}

impl ConversionReport {
    pub fn missing_images(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .flat_map(|doc| doc.missing_images.iter().map(String::as_str))
    }
}

/// Convert with default options.
pub fn run(input: &Path) -> Result<ConversionReport, ConvertError> {
    convert_archive(input, &ConvertOptions::default())
}

/// Convert an export archive into a zip of Word documents.
///
/// Scratch directories live only for the duration of the call. Conversations
/// that fail to render are reported in [`ConversionReport::failures`] and do
/// not stop the others.
pub fn convert_archive(
    input: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport, ConvertError> {
    let workspace = scratch_dir("convos-docx-extract-")?;
    extract_archive(input, workspace.path())?;

    let log_path = find_conversation_log(workspace.path(), &options.log_file_name)?;
    let export_root = log_path.parent().unwrap_or(workspace.path());
    let images = ImageIndex::scan(&export_root.join(&options.image_dir))?;
    info!(images = images.len(), log = %log_path.display(), "archive unpacked");

    let bytes = fs::read(&log_path).map_err(|source| ExtractionError::Read {
        path: log_path.clone(),
        source,
    })?;
    let conversations = decode_conversation_log(&bytes)?;
    info!(conversations = conversations.len(), "conversation log decoded");

    let documents_dir = scratch_dir("convos-docx-documents-")?;
    let titles: Vec<String> = conversations.iter().map(RawConversation::title).collect();
    let file_names = assign_file_names(titles.iter().map(String::as_str));
    let jobs: Vec<(&RawConversation, &String)> = conversations.iter().zip(&file_names).collect();

    let render = |(conversation, file_name): &(&RawConversation, &String)| {
        render_conversation(conversation, file_name, &images, documents_dir.path())
    };
    let outcomes: Vec<Result<RenderedDocument, RenderError>> = if options.parallel {
        jobs.par_iter().map(render).collect()
    } else {
        jobs.iter().map(render).collect()
    };

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(document) => documents.push(document),
            Err(err) => {
                error!(title = %err.title, error = %err.failure, "conversation skipped");
                failures.push(err);
            }
        }
    }

    let paths: Vec<PathBuf> = documents
        .iter()
        .map(|doc| documents_dir.path().join(&doc.file_name))
        .collect();
    let output = pack_documents(&paths, &options.output_for(input))?;

    info!(
        documents = documents.len(),
        skipped = failures.len(),
        output = %output.display(),
        "conversion finished"
    );
    Ok(ConversionReport {
        output,
        documents,
        failures,
    })
}

fn scratch_dir(prefix: &str) -> Result<tempfile::TempDir, ConvertError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(ConvertError::Scratch)
}
