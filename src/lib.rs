//! Convos DOCX - turn exported ChatGPT conversations into Word documents
//!
//! This library takes a ChatGPT data export archive (a `conversations.json`
//! log plus a folder of generated images), writes one `.docx` document per
//! conversation and bundles the documents into a single zip archive. It can
//! be driven from the bundled CLI or from any other front end that hands it
//! an archive path.
//!
//! # Examples
//!
//! ## Converting an archive
//!
//! ```no_run
//! use convos_docx::run;
//! use std::path::Path;
//!
//! let report = run(Path::new("/path/to/export.zip")).unwrap();
//! println!("wrote {}", report.output.display());
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! ```
//!
//! ## Walking a single conversation
//!
//! ```
//! use convos_docx::{decode_conversation_log, linearize, RenderItem};
//!
//! let log = br#"[{"title": "Demo", "mapping": {
//!     "root": {"message": null},
//!     "a": {"message": {"author": {"role": "user"}, "content": {"parts": ["Hello"]}}}
//! }}]"#;
//! let conversations = decode_conversation_log(log).unwrap();
//! let record = conversations[0].parse().unwrap();
//! assert_eq!(
//!     linearize(&record),
//!     vec![RenderItem::Title("Demo".into()), RenderItem::UserText("Hello".into())]
//! );
//! ```

pub mod types;
pub mod error;
pub mod loader;
pub mod parser;
pub mod render;
pub mod package;
pub mod convert;

// Re-export commonly used types and functions for convenience
pub use types::{
    ConversationRecord, Node, NodeMapping, Part, RawConversation, RenderItem, RenderedDocument,
    Role,
};
pub use error::{
    ConvertError, DecodeError, ExtractionError, ImageResolutionError, PackagingError,
    RenderError, RenderFailure,
};
pub use loader::{extract_archive, find_conversation_log, ImageIndex};
pub use parser::{asset_id, decode_conversation_log, linearize};
pub use render::{assign_file_names, build_document, document_file_name, render_conversation};
pub use package::pack_documents;
pub use convert::{convert_archive, run, ConversionReport, ConvertOptions};

/// Human-readable size of a written archive, in binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let (value, unit) = UNITS[1..].iter().fold(
        (bytes as f64 / 1024.0, UNITS[0]),
        |(value, unit), next| {
            if value >= 1024.0 {
                (value / 1024.0, *next)
            } else {
                (value, unit)
            }
        },
    );
    format!("{value:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::format_size;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(5 * 1024_u64.pow(5)), "5120.0 TB");
    }
}
