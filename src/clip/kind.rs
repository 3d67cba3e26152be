//! Type adapter: semantic record kinds ⇄ MIME-tagged entries.
//!
//! Each [`Kind`] owns one row of the canonical table: the tag its
//! entries are filed under and the payload shape that counts as a
//! match. [`SemanticRecord`] is the typed value a producer builds and a
//! reader gets back; [`SemanticRecord::to_entries`] and [`Kind::extract`]
//! are the two directions of the mapping.

use serde::{Deserialize, Serialize};

use super::entry::{
    Entry, FieldValue, Object, Payload, PixelMapDescriptor, TAG_APP_ITEM, TAG_HTML, TAG_PIXEL_MAP,
    TAG_PLAIN_TEXT, TAG_TEXT, TAG_URI, TAG_WANT,
};
use super::record::Record;

const KEY_URL: &str = "url";
const KEY_DESCRIPTION: &str = "description";
const KEY_URI: &str = "uri";
const KEY_URI_KIND: &str = "uriKind";

/// Semantic record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Text,
    PlainText,
    Hyperlink,
    Html,
    File,
    Folder,
    Image,
    Video,
    Audio,
    SystemDefinedAppItem,
    ApplicationDefined,
    Want,
    PixelMap,
}

/// What a `text/uri` entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriKind {
    File,
    Folder,
    Image,
    Video,
    Audio,
}

impl UriKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "folder" => Some(Self::Folder),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Kind of a `text/uri` object payload. A missing discriminator reads as a file.
    fn of(payload: &Payload) -> Option<Self> {
        match payload.object_text(KEY_URI_KIND) {
            Some(s) => Self::parse(s),
            None => Some(Self::File),
        }
    }
}

/// System-defined application item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppItem {
    pub app_id: String,
    pub app_name: String,
    pub bundle_name: String,
    pub ability_name: String,
    pub app_icon_id: i64,
    pub app_label_id: i64,
}

impl AppItem {
    fn to_object(&self) -> Object {
        let mut obj = Object::new();
        obj.insert("appId".into(), self.app_id.as_str().into());
        obj.insert("appName".into(), self.app_name.as_str().into());
        obj.insert("bundleName".into(), self.bundle_name.as_str().into());
        obj.insert("abilityName".into(), self.ability_name.as_str().into());
        obj.insert("appIconId".into(), self.app_icon_id.into());
        obj.insert("appLabelId".into(), self.app_label_id.into());
        obj
    }

    fn from_object(obj: &Object) -> Self {
        let text = |key: &str| {
            obj.get(key)
                .and_then(FieldValue::as_text)
                .unwrap_or_default()
                .to_string()
        };
        let int = |key: &str| obj.get(key).and_then(FieldValue::as_int).unwrap_or_default();
        Self {
            app_id: text("appId"),
            app_name: text("appName"),
            bundle_name: text("bundleName"),
            ability_name: text("abilityName"),
            app_icon_id: int("appIconId"),
            app_label_id: int("appLabelId"),
        }
    }
}

/// A typed clipboard record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticRecord {
    /// Metadata-only text record; content lives in the record details.
    Text,
    PlainText { text: String },
    Hyperlink { url: String, description: Option<String> },
    Html { html: String, plain: Option<String> },
    Uri { kind: UriKind, uri: String },
    Want(Object),
    AppItem(AppItem),
    ApplicationDefined { tag: String, data: Vec<u8> },
    PixelMap(PixelMapDescriptor),
}

impl SemanticRecord {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Text => Kind::Text,
            Self::PlainText { .. } => Kind::PlainText,
            Self::Hyperlink { .. } => Kind::Hyperlink,
            Self::Html { .. } => Kind::Html,
            Self::Uri { kind, .. } => match kind {
                UriKind::File => Kind::File,
                UriKind::Folder => Kind::Folder,
                UriKind::Image => Kind::Image,
                UriKind::Video => Kind::Video,
                UriKind::Audio => Kind::Audio,
            },
            Self::Want(_) => Kind::Want,
            Self::AppItem(_) => Kind::SystemDefinedAppItem,
            Self::ApplicationDefined { .. } => Kind::ApplicationDefined,
            Self::PixelMap(_) => Kind::PixelMap,
        }
    }

    /// Flatten into entries, primary entry first.
    pub fn to_entries(&self) -> Vec<Entry> {
        match self {
            Self::Text => vec![Entry::new(TAG_TEXT, Payload::Object(Object::new()))],
            Self::PlainText { text } => {
                vec![Entry::new(TAG_PLAIN_TEXT, Payload::Text(text.clone()))]
            }
            Self::Hyperlink { url, description } => {
                let mut obj = Object::new();
                obj.insert(KEY_URL.into(), url.as_str().into());
                if let Some(desc) = description {
                    obj.insert(KEY_DESCRIPTION.into(), desc.as_str().into());
                }
                vec![Entry::new(TAG_PLAIN_TEXT, Payload::Object(obj))]
            }
            Self::Html { html, plain } => {
                let mut entries = vec![Entry::new(TAG_HTML, Payload::Text(html.clone()))];
                if let Some(plain) = plain {
                    entries.push(Entry::new(TAG_PLAIN_TEXT, Payload::Text(plain.clone())));
                }
                entries
            }
            Self::Uri { kind, uri } => {
                let mut obj = Object::new();
                obj.insert(KEY_URI.into(), uri.as_str().into());
                obj.insert(KEY_URI_KIND.into(), kind.as_str().into());
                vec![Entry::new(TAG_URI, Payload::Object(obj))]
            }
            Self::Want(obj) => vec![Entry::new(TAG_WANT, Payload::Object(obj.clone()))],
            Self::AppItem(item) => {
                vec![Entry::new(TAG_APP_ITEM, Payload::Object(item.to_object()))]
            }
            Self::ApplicationDefined { tag, data } => {
                vec![Entry::new(tag.clone(), Payload::Bytes(data.clone()))]
            }
            Self::PixelMap(img) => vec![Entry::new(TAG_PIXEL_MAP, Payload::Image(img.clone()))],
        }
    }
}

impl Kind {
    /// Tag this kind's entries are filed under. `None` for
    /// application-defined records, whose tag is caller-chosen.
    pub fn canonical_tag(self) -> Option<&'static str> {
        match self {
            Self::Text => Some(TAG_TEXT),
            Self::PlainText | Self::Hyperlink => Some(TAG_PLAIN_TEXT),
            Self::Html => Some(TAG_HTML),
            Self::File | Self::Folder | Self::Image | Self::Video | Self::Audio => Some(TAG_URI),
            Self::Want => Some(TAG_WANT),
            Self::SystemDefinedAppItem => Some(TAG_APP_ITEM),
            Self::PixelMap => Some(TAG_PIXEL_MAP),
            Self::ApplicationDefined => None,
        }
    }

    fn uri_kind(self) -> Option<UriKind> {
        match self {
            Self::File => Some(UriKind::File),
            Self::Folder => Some(UriKind::Folder),
            Self::Image => Some(UriKind::Image),
            Self::Video => Some(UriKind::Video),
            Self::Audio => Some(UriKind::Audio),
            _ => None,
        }
    }

    /// Whether `entry` satisfies this kind's canonical shape.
    pub fn matches(self, entry: &Entry) -> bool {
        let payload = &entry.payload;
        let Some(tag) = self.canonical_tag() else {
            return matches!(payload, Payload::Bytes(_)) && !is_builtin_tag(&entry.tag);
        };
        if tag != entry.tag {
            return false;
        }
        match self {
            Self::Text | Self::Want | Self::SystemDefinedAppItem => {
                matches!(payload, Payload::Object(_))
            }
            Self::PlainText | Self::Html => matches!(payload, Payload::Text(_)),
            Self::Hyperlink => payload.object_text(KEY_URL).is_some(),
            Self::PixelMap => matches!(payload, Payload::Image(_)),
            Self::File | Self::Folder | Self::Image | Self::Video | Self::Audio => {
                payload.object_text(KEY_URI).is_some() && UriKind::of(payload) == self.uri_kind()
            }
            Self::ApplicationDefined => false,
        }
    }

    /// First entry of `record` matching this kind.
    pub fn find_entry(self, record: &Record) -> Option<&Entry> {
        record.entries().iter().find(|e| self.matches(e))
    }

    /// Rebuild the typed value of this kind from `record`, if it holds one.
    pub fn extract(self, record: &Record) -> Option<SemanticRecord> {
        let entry = self.find_entry(record)?;
        let payload = &entry.payload;
        let value = match self {
            Self::Text => SemanticRecord::Text,
            Self::PlainText => SemanticRecord::PlainText {
                text: payload.as_text()?.to_string(),
            },
            Self::Hyperlink => SemanticRecord::Hyperlink {
                url: payload.object_text(KEY_URL)?.to_string(),
                description: payload.object_text(KEY_DESCRIPTION).map(str::to_string),
            },
            Self::Html => SemanticRecord::Html {
                html: payload.as_text()?.to_string(),
                plain: Self::PlainText
                    .find_entry(record)
                    .and_then(|e| e.payload.as_text())
                    .map(str::to_string),
            },
            Self::File | Self::Folder | Self::Image | Self::Video | Self::Audio => {
                SemanticRecord::Uri {
                    kind: self.uri_kind()?,
                    uri: payload.object_text(KEY_URI)?.to_string(),
                }
            }
            Self::Want => SemanticRecord::Want(payload.as_object()?.clone()),
            Self::SystemDefinedAppItem => {
                SemanticRecord::AppItem(AppItem::from_object(payload.as_object()?))
            }
            Self::ApplicationDefined => SemanticRecord::ApplicationDefined {
                tag: entry.tag.clone(),
                data: payload.as_bytes()?.to_vec(),
            },
            Self::PixelMap => SemanticRecord::PixelMap(payload.as_image()?.clone()),
        };
        Some(value)
    }

    pub const ALL: [Kind; 13] = [
        Kind::Text,
        Kind::PlainText,
        Kind::Hyperlink,
        Kind::Html,
        Kind::File,
        Kind::Folder,
        Kind::Image,
        Kind::Video,
        Kind::Audio,
        Kind::SystemDefinedAppItem,
        Kind::ApplicationDefined,
        Kind::Want,
        Kind::PixelMap,
    ];
}

/// Whether `tag` is the canonical tag of a built-in kind. Application-defined
/// data only matches tags outside this set.
pub fn is_builtin_tag(tag: &str) -> bool {
    Kind::ALL.iter().any(|k| k.canonical_tag() == Some(tag))
}

/// Whether any kind claims `entry`.
pub fn is_well_typed(entry: &Entry) -> bool {
    Kind::ALL.iter().any(|k| k.matches(entry))
}
