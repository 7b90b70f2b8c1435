//! Decoding the conversation log and walking conversations into render items.

use crate::error::DecodeError;
use crate::types::*;
use encoding_rs::Encoding;
use serde_json::Value;
use tracing::debug;

/// Encodings tried, in order, until one yields a parseable log.
///
/// `latin1` and `iso-8859-1` both resolve to windows-1252 in `encoding_rs`,
/// so bytes 0x80-0x9F decode to their windows-1252 characters (0x80 is `€`)
/// rather than to C1 control characters.
pub const LOG_ENCODINGS: [&str; 3] = ["utf-8", "latin1", "iso-8859-1"];

/// Decode the raw log bytes into its records, in log order.
///
/// Only the outer shape (a JSON array) is checked here. Each record is
/// parsed on its own later so that a bad record costs only itself.
pub fn decode_conversation_log(bytes: &[u8]) -> Result<Vec<RawConversation>, DecodeError> {
    let mut tried = Vec::with_capacity(LOG_ENCODINGS.len());
    let mut last = None;

    for label in LOG_ENCODINGS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        tried.push(label);

        let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) else {
            debug!(encoding = label, "log is not valid in this encoding");
            continue;
        };

        match serde_json::from_str::<Vec<Value>>(&text) {
            Ok(records) => {
                debug!(encoding = label, records = records.len(), "conversation log decoded");
                return Ok(records
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| RawConversation { index, value })
                    .collect());
            }
            Err(err) => {
                debug!(encoding = label, error = %err, "log did not parse");
                last = Some(err);
            }
        }
    }

    Err(DecodeError { tried, last })
}

/// Linearize a conversation into the items the renderer consumes.
///
/// The title always comes first. Nodes follow in mapping order; nodes
/// without a message, blank text and unrecognised parts contribute nothing.
pub fn linearize(record: &ConversationRecord) -> Vec<RenderItem> {
    let mut items = vec![RenderItem::Title(record.display_title())];

    for (_, node) in record.mapping.iter() {
        let Some(message) = &node.message else {
            continue;
        };

        for part in message.content.parts() {
            match part {
                Part::Text(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let text = text.to_string();
                    items.push(match message.author.role {
                        Role::User => RenderItem::UserText(text),
                        Role::Assistant | Role::Other(_) => RenderItem::AssistantText(text),
                    });
                }
                Part::Image { asset_pointer } => items.push(RenderItem::Image {
                    asset_id: asset_id(asset_pointer).to_string(),
                }),
                Part::Unknown => {}
            }
        }
    }

    items
}

/// Lookup key for an asset pointer: its last path segment.
///
/// `file-service://file-abc123` becomes `file-abc123`.
pub fn asset_id(pointer: &str) -> &str {
    pointer.rsplit('/').next().unwrap_or(pointer)
}
