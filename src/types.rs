//! Core data types for exported conversations and the render sequence.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Title used when a record has no usable title.
pub const UNTITLED: &str = "(untitled conversation)";

/// One element of the conversation log, kept undecoded until it is rendered.
///
/// Holding the raw value lets a single malformed record fail on its own
/// instead of taking the whole log down with it.
#[derive(Debug, Clone)]
pub struct RawConversation {
    pub index: usize,
    pub value: Value,
}

impl RawConversation {
    /// Best-effort title, available even when the record does not parse.
    pub fn title(&self) -> String {
        display_title(self.value.get("title").and_then(Value::as_str))
    }

    /// Parse the record into its typed form.
    pub fn parse(&self) -> serde_json::Result<ConversationRecord> {
        ConversationRecord::deserialize(&self.value)
    }
}

/// A conversation as exported by ChatGPT.
#[derive(Debug, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mapping: NodeMapping,
}

impl ConversationRecord {
    pub fn display_title(&self) -> String {
        display_title(self.title.as_deref())
    }
}

fn display_title(title: Option<&str>) -> String {
    title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

/// Node mapping in the order the export stored it.
///
/// The export's key order is treated as message order; nothing here follows
/// parent/child links.
#[derive(Debug, Default)]
pub struct NodeMapping(Vec<(String, Node)>);

impl NodeMapping {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Node)> for NodeMapping {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        NodeMapping(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for NodeMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = NodeMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of node ids to nodes")
            }

            fn visit_unit<E: de::Error>(self) -> Result<NodeMapping, E> {
                Ok(NodeMapping::default())
            }

            fn visit_map<A>(self, mut access: A) -> Result<NodeMapping, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut nodes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, node)) = access.next_entry::<String, Node>()? {
                    nodes.push((id, node));
                }
                Ok(NodeMapping(nodes))
            }
        }

        deserializer.deserialize_any(MappingVisitor)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Node {
    #[serde(default, deserialize_with = "non_empty_message")]
    pub message: Option<MessageRecord>,
}

// `null` and `{}` both mean "no message" (synthetic root nodes use either).
fn non_empty_message<'de, D>(deserializer: D) -> Result<Option<MessageRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => MessageRecord::deserialize(value)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRecord {
    pub author: MessageAuthor,
    pub content: MessageContent,
}

#[derive(Debug, Deserialize)]
pub struct MessageAuthor {
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

impl MessageContent {
    pub fn parts(&self) -> &[Part] {
        self.parts.as_deref().unwrap_or_default()
    }
}

/// Who wrote a message. Anything that is not the user renders as the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.to_lowercase().as_str() {
            "human" | "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(role),
        }
    }
}

/// One entry of a message's `content.parts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum Part {
    Text(String),
    Image { asset_pointer: String },
    Unknown,
}

impl From<Value> for Part {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Part::Text(text),
            Value::Object(map) => {
                let is_image = map.get("content_type").and_then(Value::as_str)
                    == Some("image_asset_pointer");
                match map.get("asset_pointer").and_then(Value::as_str) {
                    Some(pointer) if is_image => Part::Image {
                        asset_pointer: pointer.to_string(),
                    },
                    _ => Part::Unknown,
                }
            }
            _ => Part::Unknown,
        }
    }
}

/// Renderer-agnostic item produced by walking a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderItem {
    Title(String),
    UserText(String),
    AssistantText(String),
    /// An image to be looked up in the image index by filename prefix.
    Image { asset_id: String },
}

/// A document written for one conversation.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub title: String,
    pub file_name: String,
    /// Asset ids that had no matching image file.
    pub missing_images: Vec<String>,
    pub failed_images: usize,
}
