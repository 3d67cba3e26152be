//! Entries: one typed representation (tag + payload) of a record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `general.text`: metadata-only text record.
pub const TAG_TEXT: &str = "general.text";
/// `text/plain`: plain text and hyperlinks.
pub const TAG_PLAIN_TEXT: &str = "text/plain";
/// `text/html`: HTML fragments.
pub const TAG_HTML: &str = "text/html";
/// `text/uri`: file, folder and media URIs.
pub const TAG_URI: &str = "text/uri";
/// `text/want`: structured intent object.
pub const TAG_WANT: &str = "text/want";
/// Fixed tag for system-defined application items.
pub const TAG_APP_ITEM: &str = "openharmony.app-item";
/// Fixed tag for opaque pixel-map descriptors.
pub const TAG_PIXEL_MAP: &str = "openharmony.pixel-map";

/// Structured key/value object payload. Also used for record details.
pub type Object = BTreeMap<String, FieldValue>;

/// A single value inside an [`Object`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Opaque image descriptor handed over by the image-codec service.
///
/// The pasteboard never decodes `data`; it only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelMapDescriptor {
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl PixelMapDescriptor {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Entry payload: explicit sum type, one variant per storage shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Object(Object),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Image(PixelMapDescriptor),
}

impl Payload {
    /// Short shape name for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Object(_) => "object",
            Self::Bytes(_) => "bytes",
            Self::Image(_) => "image",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&PixelMapDescriptor> {
        match self {
            Self::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Read a text field from an object payload.
    pub fn object_text(&self, key: &str) -> Option<&str> {
        self.as_object()?.get(key)?.as_text()
    }
}

/// One typed representation of a record's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub tag: String,
    pub payload: Payload,
}

impl Entry {
    pub fn new(tag: impl Into<String>, payload: Payload) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }
}
