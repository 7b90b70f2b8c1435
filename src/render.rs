//! Word document rendering for a single conversation.

use crate::error::{ImageResolutionError, RenderError, RenderFailure};
use crate::loader::ImageIndex;
use crate::parser::linearize;
use crate::types::{RawConversation, RenderItem, RenderedDocument};
use docx_rs::{AlignmentType, BreakType, Docx, LineSpacing, Paragraph, Pic, Run, Style, StyleType};
use image::{GenericImageView, ImageFormat};
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{info_span, warn};

const USER_PREFIX: &str = "Utilisateur: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";
const USER_COLOR: &str = "0066CC";
const TITLE_STYLE: &str = "ConversationTitle";
/// Title size in half-points.
const TITLE_SIZE: usize = 56;
/// 6pt, in twentieths of a point.
const PARAGRAPH_SPACING: u32 = 120;
/// Four inches, in EMUs.
const IMAGE_WIDTH_EMU: u32 = 4 * 914_400;
const DOCUMENT_EXTENSION: &str = "docx";
/// Longest file stem, in bytes, before the suffix and extension.
pub const MAX_STEM_BYTES: usize = 200;

/// Parse, walk and render one conversation into `out_dir/file_name`.
pub fn render_conversation(
    conversation: &RawConversation,
    file_name: &str,
    images: &ImageIndex,
    out_dir: &Path,
) -> Result<RenderedDocument, RenderError> {
    let title = conversation.title();
    let _span = info_span!("conversation", index = conversation.index, title = %title).entered();

    let record = conversation
        .parse()
        .map_err(|err| RenderError::new(&title, err))?;
    let items = linearize(&record);
    let built = build_document(&items, images);

    let path = out_dir.join(file_name);
    let file = fs::File::create(&path).map_err(|err| RenderError::new(&title, err))?;
    built
        .docx
        .build()
        .pack(file)
        .map_err(|err| RenderError::new(&title, RenderFailure::Save(err.to_string())))?;

    Ok(RenderedDocument {
        title,
        file_name: file_name.to_string(),
        missing_images: built.missing_images,
        failed_images: built.failed_images,
    })
}

/// A document assembled in memory, with what happened to its images.
pub struct BuiltDocument {
    pub docx: Docx,
    pub missing_images: Vec<String>,
    pub failed_images: usize,
}

/// Assemble the document for a render sequence.
pub fn build_document(items: &[RenderItem], images: &ImageIndex) -> BuiltDocument {
    let mut docx = Docx::new().add_style(
        Style::new(TITLE_STYLE, StyleType::Paragraph)
            .name("Conversation Title")
            .size(TITLE_SIZE)
            .bold(),
    );
    let mut missing_images = Vec::new();
    let mut failed_images = 0;

    for item in items {
        match item {
            RenderItem::Title(title) => {
                docx = docx
                    .add_paragraph(
                        spaced(text_run(title).bold())
                            .style(TITLE_STYLE)
                            .align(AlignmentType::Center),
                    )
                    .add_paragraph(Paragraph::new());
            }
            RenderItem::UserText(text) => {
                let run = text_run(&format!("{USER_PREFIX}{text}"))
                    .bold()
                    .underline("single")
                    .color(USER_COLOR);
                docx = docx.add_paragraph(spaced(run));
            }
            RenderItem::AssistantText(text) => {
                docx = docx.add_paragraph(spaced(text_run(&format!("{ASSISTANT_PREFIX}{text}"))));
            }
            RenderItem::Image { asset_id } => match resolve_image(asset_id, images) {
                Ok((path, pic)) => {
                    let caption = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    docx = docx
                        .add_paragraph(Paragraph::new())
                        .add_paragraph(
                            Paragraph::new()
                                .add_run(Run::new().add_image(pic))
                                .align(AlignmentType::Center),
                        )
                        .add_paragraph(
                            spaced(text_run(&format!("(Image : {caption})")))
                                .align(AlignmentType::Center),
                        );
                }
                Err(ImageResolutionError::NotFound { asset_id }) => {
                    warn!(asset = %asset_id, "image missing from archive");
                    missing_images.push(asset_id);
                }
                Err(err) => {
                    warn!(asset = %asset_id, error = %err, "image could not be embedded");
                    failed_images += 1;
                    docx = docx.add_paragraph(spaced(text_run(&format!(
                        "(Erreur lors de l'insertion de l'image : {err})"
                    ))));
                }
            },
        }
    }

    BuiltDocument {
        docx,
        missing_images,
        failed_images,
    }
}

fn resolve_image<'a>(
    asset_id: &str,
    images: &'a ImageIndex,
) -> Result<(&'a Path, Pic), ImageResolutionError> {
    let path = images
        .resolve(asset_id)
        .ok_or_else(|| ImageResolutionError::NotFound {
            asset_id: asset_id.to_string(),
        })?;
    Ok((path, load_picture(path)?))
}

/// Decode an image file, re-encode it as PNG and size it for the page.
fn load_picture(path: &Path) -> Result<Pic, ImageResolutionError> {
    let bytes = fs::read(path)?;
    let img = image::load_from_memory(&bytes)?;
    let (width, height) = img.dimensions();
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let height_emu = u64::from(IMAGE_WIDTH_EMU) * u64::from(height) / u64::from(width.max(1));
    let height_emu = u32::try_from(height_emu).unwrap_or(u32::MAX);
    Ok(Pic::new_with_dimensions(png, width, height).size(IMAGE_WIDTH_EMU, height_emu))
}

fn spaced(run: Run) -> Paragraph {
    Paragraph::new().add_run(run).line_spacing(
        LineSpacing::new()
            .before(PARAGRAPH_SPACING)
            .after(PARAGRAPH_SPACING),
    )
}

// Line breaks inside one run keep multi-line messages in a single paragraph.
fn text_run(text: &str) -> Run {
    let mut run = Run::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    run
}

/// File name for a conversation title: spaces and characters that are not
/// allowed in file names become underscores.
///
/// The stem is capped at [`MAX_STEM_BYTES`] so the name stays under the
/// usual 255-byte filename limit even with a collision suffix.
pub fn document_file_name(title: &str) -> String {
    format!("{}.{DOCUMENT_EXTENSION}", file_stem(title))
}

fn file_stem(title: &str) -> String {
    let mut stem = String::new();
    for ch in title.trim().chars() {
        let ch = match ch {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        };
        if stem.len() + ch.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(ch);
    }
    match stem.as_str() {
        "" | "." | ".." => "untitled".to_string(),
        _ => stem,
    }
}

/// Distinct file names for titles in log order; repeats get `_2`, `_3`, ...
///
/// Names are compared case-insensitively so `Demo` and `demo` never land on
/// the same file on case-insensitive filesystems.
pub fn assign_file_names<'a, I>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    let mut names = Vec::new();

    for title in titles {
        let stem = file_stem(title);
        let mut name = format!("{stem}.{DOCUMENT_EXTENSION}");
        let mut suffix = 2;
        while !taken.insert(name.to_lowercase()) {
            name = format!("{stem}_{suffix}.{DOCUMENT_EXTENSION}");
            suffix += 1;
        }
        if suffix > 2 {
            warn!(title, file = %name, "duplicate title, document renamed");
        }
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;

    fn document_xml(built: BuiltDocument) -> String {
        let mut buf = Vec::new();
        built.docx.build().pack(Cursor::new(&mut buf)).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(buf)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn prefixes_and_orders_messages() {
        let items = vec![
            RenderItem::Title("Demo".into()),
            RenderItem::UserText("Hello".into()),
            RenderItem::AssistantText("World".into()),
        ];
        let xml = document_xml(build_document(&items, &ImageIndex::default()));

        let title = xml.find("Demo").unwrap();
        let user = xml.find("Utilisateur: Hello").unwrap();
        let assistant = xml.find("Assistant: World").unwrap();
        assert!(title < user && user < assistant);
        assert!(xml.contains(USER_COLOR));
        assert!(xml.contains("<w:b />") || xml.contains("<w:b/>"));
        assert!(xml.contains(r#"<w:u w:val="single""#));
        assert!(xml.contains(r#"<w:jc w:val="center""#));
        assert!(xml.contains(r#"w:before="120""#));
        assert!(xml.contains(r#"w:after="120""#));
    }

    #[test]
    fn assistant_run_has_default_styling() {
        let items = vec![RenderItem::AssistantText("Plain".into())];
        let xml = document_xml(build_document(&items, &ImageIndex::default()));
        let text = xml.find("Assistant: Plain").unwrap();
        let paragraph_start = xml[..text].rfind("<w:p ").unwrap();
        let paragraph = &xml[paragraph_start..text];
        assert!(!paragraph.contains(USER_COLOR));
        assert!(!paragraph.contains("<w:u "));
        assert!(!paragraph.contains("<w:b "));
    }

    #[test]
    fn image_caption_is_centered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        let images = ImageIndex::from_files([("pic.png".to_string(), path)]);

        let items = vec![RenderItem::Image { asset_id: "pic".into() }];
        let xml = document_xml(build_document(&items, &images));
        let caption = xml.find("(Image : pic.png)").unwrap();
        let paragraph_start = xml[..caption].rfind("<w:p").unwrap();
        assert!(xml[paragraph_start..caption].contains(r#"<w:jc w:val="center""#));
    }

    #[test]
    fn missing_image_is_reported_not_rendered() {
        let items = vec![
            RenderItem::Title("Pics".into()),
            RenderItem::Image { asset_id: "xyz".into() },
        ];
        let built = build_document(&items, &ImageIndex::default());
        assert_eq!(built.missing_images, ["xyz"]);
        assert_eq!(built.failed_images, 0);
        assert!(!document_xml(built).contains("(Image :"));
    }

    #[test]
    fn undecodable_image_becomes_error_paragraph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad123.png");
        fs::write(&path, b"definitely not a png").unwrap();
        let images = ImageIndex::from_files([("bad123.png".to_string(), path)]);

        let items = vec![
            RenderItem::Title("Pics".into()),
            RenderItem::Image { asset_id: "bad123".into() },
        ];
        let built = build_document(&items, &images);
        assert_eq!(built.failed_images, 1);
        assert!(document_xml(built).contains("Erreur lors de"));
    }

    #[test]
    fn embeds_resolved_image_with_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc123.webp.png");
        image::RgbImage::from_pixel(8, 4, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();
        let images = ImageIndex::from_files([("abc123.webp.png".to_string(), PathBuf::from(&path))]);

        let items = vec![
            RenderItem::Title("Pics".into()),
            RenderItem::Image { asset_id: "abc123".into() },
        ];
        let built = build_document(&items, &images);
        assert_eq!(built.failed_images, 0);
        assert!(built.missing_images.is_empty());
        assert!(document_xml(built).contains("(Image : abc123.webp.png)"));
    }

    #[test]
    fn file_names_replace_spaces_and_separators() {
        assert_eq!(document_file_name("Demo"), "Demo.docx");
        assert_eq!(document_file_name("My first chat"), "My_first_chat.docx");
        assert_eq!(document_file_name("a/b: c?"), "a_b__c_.docx");
        assert_eq!(document_file_name("  "), "untitled.docx");
    }

    #[test]
    fn duplicate_titles_get_suffixes() {
        let names = assign_file_names(["Demo", "Other", "Demo", "Demo"]);
        assert_eq!(names, ["Demo.docx", "Other.docx", "Demo_2.docx", "Demo_3.docx"]);
    }

    #[test]
    fn titles_differing_only_in_case_get_suffixes() {
        let names = assign_file_names(["Demo", "demo", "DEMO"]);
        assert_eq!(names, ["Demo.docx", "demo_2.docx", "DEMO_3.docx"]);
    }

    #[test]
    fn long_titles_are_cut_at_a_char_boundary() {
        let title = "会話".repeat(60);
        let name = document_file_name(&title);
        let stem = name.trim_end_matches(".docx");
        assert!(stem.len() <= MAX_STEM_BYTES);
        assert!(title.starts_with(stem));
        assert_eq!(stem.len(), 198);

        let names = assign_file_names([title.as_str(), title.as_str()]);
        assert!(names.iter().all(|name| name.len() < 255));
        assert!(names[1].ends_with("_2.docx"));
    }
}
