//! Error taxonomy for the conversion pipeline.
//!
//! Extraction, decoding and packaging failures end the run. Render and image
//! failures are confined to one conversation or one image.

use std::path::PathBuf;

/// The input archive could not be unpacked or did not contain a log.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("could not open archive `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{path}` is not a readable archive: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("could not find `{name}` inside the archive")]
    MissingLog { name: String },

    #[error("could not read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// None of the candidate encodings produced a parseable log.
#[derive(Debug, thiserror::Error)]
#[error("no available encoding could parse the conversation log (tried {})", .tried.join(", "))]
pub struct DecodeError {
    pub tried: Vec<&'static str>,
    #[source]
    pub last: Option<serde_json::Error>,
}

/// One conversation could not be turned into a document.
#[derive(Debug, thiserror::Error)]
#[error("conversation `{title}` was skipped: {failure}")]
pub struct RenderError {
    pub title: String,
    #[source]
    pub failure: RenderFailure,
}

impl RenderError {
    pub fn new(title: impl Into<String>, failure: impl Into<RenderFailure>) -> Self {
        Self {
            title: title.into(),
            failure: failure.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderFailure {
    #[error("malformed conversation record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("could not create document file: {0}")]
    Create(#[from] std::io::Error),

    #[error("could not save document: {0}")]
    Save(String),
}

/// An image reference that could not be embedded.
#[derive(Debug, thiserror::Error)]
pub enum ImageResolutionError {
    #[error("no image found for asset `{asset_id}`")]
    NotFound { asset_id: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unreadable(#[from] image::ImageError),
}

/// The result archive could not be written.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("could not write `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not build result archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("could not move result archive into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// A failure that ends the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Packaging(#[from] PackagingError),

    #[error("could not create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
}
