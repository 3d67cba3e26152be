//! Records: one clip item, an ordered set of uniquely-tagged entries.

use serde::{Deserialize, Serialize};

use super::entry::{Entry, Object, Payload, PixelMapDescriptor};
use super::error::PasteboardError;
use super::kind::{self, AppItem, Kind, SemanticRecord};
use super::validate;

/// One clip item.
///
/// Entries are kept newest-first: [`Record::add_entry`] inserts at
/// index 0, and the entry at index 0 is the record's primary
/// representation. `details` is an opaque side-channel copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Object::is_empty")]
    details: Object,
}

impl Record {
    /// Create a record holding a single entry.
    pub fn new(tag: impl Into<String>, payload: Payload) -> Result<Self, PasteboardError> {
        let tag = tag.into();
        validate::check_entry(&tag, &payload)?;
        Ok(Self {
            entries: vec![Entry::new(tag, payload)],
            details: Object::new(),
        })
    }

    /// Create a record from a typed value through the type adapter.
    pub fn from_semantic(value: &SemanticRecord) -> Result<Self, PasteboardError> {
        let record = Self::from_entries_unchecked(value.to_entries());
        validate::check_record(&record)?;
        Ok(record)
    }

    /// Plain-text record, the common case.
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::from_entries_unchecked(
            SemanticRecord::PlainText { text: text.into() }.to_entries(),
        )
    }

    pub(crate) fn from_entries_unchecked(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            details: Object::new(),
        }
    }

    /// Attach a details map, replacing any previous one.
    pub fn with_details(mut self, details: Object) -> Self {
        self.details = details;
        self
    }

    /// Add an entry at index 0.
    ///
    /// An existing entry with the same tag is dropped first so tags stay
    /// unique; the new entry still lands at index 0.
    pub fn add_entry(
        &mut self,
        tag: impl Into<String>,
        payload: Payload,
    ) -> Result<(), PasteboardError> {
        let tag = tag.into();
        validate::check_entry(&tag, &payload)?;
        self.entries.retain(|e| e.tag != tag);
        self.entries.insert(0, Entry::new(tag, payload));
        Ok(())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, tag: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    /// Entry tags in order.
    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.tag.as_str())
    }

    pub fn primary_mime_type(&self) -> Option<&str> {
        self.entries.first().map(|e| e.tag.as_str())
    }

    /// Tags whose payload shape actually matches a kind mapped to that tag.
    pub fn valid_types(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| kind::is_well_typed(e))
            .map(|e| e.tag.as_str())
            .collect()
    }

    pub fn details(&self) -> &Object {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut Object {
        &mut self.details
    }

    /// Typed value of `kind` held by this record, if any.
    pub fn get(&self, kind: Kind) -> Option<SemanticRecord> {
        kind.extract(self)
    }

    // -- Kind accessors. Mismatched shapes read as empty. --

    pub fn text(&self) -> Option<&str> {
        Kind::PlainText.find_entry(self)?.payload.as_text()
    }

    pub fn html(&self) -> Option<&str> {
        Kind::Html.find_entry(self)?.payload.as_text()
    }

    pub fn url(&self) -> Option<&str> {
        Kind::Hyperlink.find_entry(self)?.payload.object_text("url")
    }

    /// URI of any file/folder/media entry.
    pub fn uri(&self) -> Option<&str> {
        [Kind::File, Kind::Folder, Kind::Image, Kind::Video, Kind::Audio]
            .iter()
            .find_map(|k| k.find_entry(self))?
            .payload
            .object_text("uri")
    }

    pub fn want(&self) -> Option<&Object> {
        Kind::Want.find_entry(self)?.payload.as_object()
    }

    pub fn pixel_map(&self) -> Option<&PixelMapDescriptor> {
        Kind::PixelMap.find_entry(self)?.payload.as_image()
    }

    pub fn app_item(&self) -> Option<AppItem> {
        match Kind::SystemDefinedAppItem.extract(self)? {
            SemanticRecord::AppItem(item) => Some(item),
            _ => None,
        }
    }

    /// Raw bytes filed under `tag`.
    pub fn raw_data(&self, tag: &str) -> Option<&[u8]> {
        self.entry(tag)?.payload.as_bytes()
    }

    /// Best-effort plain-text rendering of the record.
    ///
    /// Preference order: plain text, hyperlink URL, HTML source, URI.
    pub fn to_plain_text(&self) -> String {
        self.text()
            .or_else(|| self.url())
            .or_else(|| self.html())
            .or_else(|| self.uri())
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::entry::{TAG_HTML, TAG_PIXEL_MAP, TAG_PLAIN_TEXT, TAG_URI};
    use crate::clip::kind::UriKind;

    #[test]
    fn add_entry_inserts_at_front() {
        let mut r = Record::plain_text("hello");
        r.add_entry(TAG_HTML, Payload::Text("<p>hello</p>".into()))
            .unwrap();
        let tags: Vec<&str> = r.mime_types().collect();
        assert_eq!(tags, vec![TAG_HTML, TAG_PLAIN_TEXT]);
        assert_eq!(r.primary_mime_type(), Some(TAG_HTML));
    }

    #[test]
    fn add_entry_with_existing_tag_replaces_it() {
        let mut r = Record::plain_text("old");
        r.add_entry(TAG_HTML, Payload::Text("<i>x</i>".into()))
            .unwrap();
        r.add_entry(TAG_PLAIN_TEXT, Payload::Text("new".into()))
            .unwrap();
        assert_eq!(r.entries().len(), 2);
        assert_eq!(r.primary_mime_type(), Some(TAG_PLAIN_TEXT));
        assert_eq!(r.text(), Some("new"));
    }

    #[test]
    fn add_entry_rejects_without_mutating() {
        let mut r = Record::plain_text("keep");
        let err = r
            .add_entry(TAG_PIXEL_MAP, Payload::Text("not an image".into()))
            .unwrap_err();
        assert_eq!(err.code(), "parameter_error");
        assert_eq!(r.entries().len(), 1);
        assert_eq!(r.text(), Some("keep"));
    }

    #[test]
    fn oversize_tag_rejected() {
        let err = Record::new("x".repeat(1025), Payload::Text("a".into())).unwrap_err();
        assert!(matches!(err, PasteboardError::Parameter(_)));
    }

    #[test]
    fn mismatched_payload_accepted_but_reads_empty() {
        let img = PixelMapDescriptor {
            width: 1,
            height: 1,
            pixel_format: "RGBA_8888".into(),
            data: vec![0; 4],
        };
        let r = Record::new(TAG_PLAIN_TEXT, Payload::Image(img)).unwrap();
        assert_eq!(r.text(), None);
        assert_eq!(r.pixel_map(), None);
        assert!(r.valid_types().is_empty());
        assert!(r.has_type(TAG_PLAIN_TEXT));
    }

    #[test]
    fn valid_types_lists_only_matching_entries() {
        let mut r = Record::plain_text("ok");
        r.add_entry(TAG_URI, Payload::Text("no object".into()))
            .unwrap();
        assert_eq!(r.valid_types(), vec![TAG_PLAIN_TEXT]);
    }

    #[test]
    fn bytes_under_text_tags_are_not_valid_types() {
        let r = Record::new(TAG_PLAIN_TEXT, Payload::Bytes(vec![1, 2])).unwrap();
        assert_eq!(r.text(), None);
        assert!(r.valid_types().is_empty());

        let r = Record::new(TAG_HTML, Payload::Bytes(vec![1, 2])).unwrap();
        assert_eq!(r.html(), None);
        assert!(r.valid_types().is_empty());
        assert_eq!(r.raw_data(TAG_HTML), Some(&[1u8, 2][..]));
    }

    #[test]
    fn details_preserved_verbatim() {
        let mut details = Object::new();
        details.insert("source".into(), "editor".into());
        details.insert("line".into(), 42i64.into());
        let r = Record::from_semantic(&SemanticRecord::Text)
            .unwrap()
            .with_details(details.clone());
        assert_eq!(r.details(), &details);

        let encoded = rmp_serde::to_vec_named(&r).unwrap();
        let decoded: Record = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded.details(), &details);
    }

    #[test]
    fn to_plain_text_prefers_text_then_url() {
        assert_eq!(Record::plain_text("abc").to_plain_text(), "abc");
        let link = Record::from_semantic(&SemanticRecord::Hyperlink {
            url: "https://example.com".into(),
            description: None,
        })
        .unwrap();
        assert_eq!(link.to_plain_text(), "https://example.com");
        let file = Record::from_semantic(&SemanticRecord::Uri {
            kind: UriKind::File,
            uri: "file:///a".into(),
        })
        .unwrap();
        assert_eq!(file.uri(), Some("file:///a"));
        assert_eq!(file.to_plain_text(), "file:///a");
    }

    #[test]
    fn raw_data_by_tag() {
        let r = Record::from_semantic(&SemanticRecord::ApplicationDefined {
            tag: "application/x-demo".into(),
            data: vec![9, 8, 7],
        })
        .unwrap();
        assert_eq!(r.raw_data("application/x-demo"), Some(&[9u8, 8, 7][..]));
        assert_eq!(r.raw_data("text/plain"), None);
    }
}
