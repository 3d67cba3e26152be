//! Clip data model: records, entries, kinds and validation.
//!
//! A [`Clip`] is one pasteboard snapshot: an ordered sequence of
//! [`Record`]s (newest first), clip-level [`Properties`] and the version
//! stamp assigned when it was published. Clips are built by producers,
//! handed to the store on `set`, and handed back to readers as private
//! copies. The store never mutates a published clip in place.

pub mod entry;
pub mod error;
pub mod kind;
pub mod properties;
pub mod record;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use entry::{Entry, FieldValue, Object, Payload, PixelMapDescriptor};
pub use error::{PasteboardError, ProviderError};
pub use kind::{AppItem, Kind, SemanticRecord, UriKind};
pub use properties::{Properties, ShareOption};
pub use record::Record;

/// Maximum number of records in a clip.
pub const MAX_RECORDS: usize = 512;

/// Maximum length of an entry type tag, in bytes.
pub const MAX_TAG_BYTES: usize = 1024;

/// One pasteboard snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    version: u64,
}

impl Clip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip holding a single plain-text record.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            records: vec![Record::plain_text(text)],
            ..Self::default()
        }
    }

    /// Empty clip carrying only properties, as seen by out-of-scope readers
    /// and delayed-rendering placeholders.
    pub(crate) fn placeholder(properties: Properties, version: u64) -> Self {
        Self {
            records: Vec::new(),
            properties,
            version,
        }
    }

    // -- Mutation (producer side, before publish) --

    /// Add a single-entry record at index 0.
    pub fn add_record(
        &mut self,
        tag: impl Into<String>,
        payload: Payload,
    ) -> Result<(), PasteboardError> {
        validate::check_capacity(self.records.len())?;
        let record = Record::new(tag, payload)?;
        self.records.insert(0, record);
        Ok(())
    }

    /// Add a typed record at index 0.
    pub fn add_kind_record(&mut self, value: &SemanticRecord) -> Result<(), PasteboardError> {
        validate::check_capacity(self.records.len())?;
        let record = Record::from_semantic(value)?;
        self.records.insert(0, record);
        Ok(())
    }

    /// Add a prebuilt record at index 0.
    pub fn insert_record(&mut self, record: Record) -> Result<(), PasteboardError> {
        validate::check_capacity(self.records.len())?;
        validate::check_record(&record)?;
        self.records.insert(0, record);
        Ok(())
    }

    /// Swap the record at `index` for `record` as a whole.
    pub fn replace_record(&mut self, index: usize, record: Record) -> Result<(), PasteboardError> {
        validate::check_index(index, self.records.len())?;
        validate::check_record(&record)?;
        self.records[index] = record;
        Ok(())
    }

    /// Remove the record at `index`; later records shift down by one.
    pub fn remove_record(&mut self, index: usize) -> Result<Record, PasteboardError> {
        validate::check_index(index, self.records.len())?;
        Ok(self.records.remove(index))
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.properties.tag = tag.into();
    }

    pub fn set_local_only(&mut self, local_only: bool) {
        self.properties.local_only = local_only;
    }

    pub fn set_share_option(&mut self, share_option: ShareOption) {
        self.properties.share_option = share_option;
    }

    /// Assign the commit stamp. Only the store calls this.
    pub(crate) fn stamp(&mut self, version: u64, timestamp: u64) {
        self.version = version;
        self.properties.timestamp = timestamp;
    }

    // -- Access --

    pub fn get_record(&self, index: usize) -> Result<&Record, PasteboardError> {
        validate::check_index(index, self.records.len())?;
        Ok(&self.records[index])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn share_option(&self) -> ShareOption {
        self.properties.share_option
    }

    /// Version stamp of the commit that published this clip; 0 if unpublished.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether any record carries an entry tagged `tag`.
    pub fn has_type(&self, tag: &str) -> bool {
        self.records.iter().any(|r| r.has_type(tag))
    }

    /// Deduplicated entry tags in record-then-entry order.
    pub fn mime_types(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for tag in self.records.iter().flat_map(Record::mime_types) {
            if !out.iter().any(|t| t == tag) {
                out.push(tag.to_string());
            }
        }
        out
    }

    /// Tag of the first entry of the first record.
    pub fn primary_mime_type(&self) -> Option<&str> {
        self.records.first()?.primary_mime_type()
    }

    /// First record holding a value of `kind`, as a typed value.
    pub fn primary(&self, kind: Kind) -> Option<SemanticRecord> {
        self.records.iter().find_map(|r| kind.extract(r))
    }

    // -- Primary accessors: scan from index 0, empty when nothing matches. --

    pub fn primary_text(&self) -> &str {
        self.records.iter().find_map(Record::text).unwrap_or_default()
    }

    pub fn primary_html(&self) -> &str {
        self.records.iter().find_map(Record::html).unwrap_or_default()
    }

    pub fn primary_uri(&self) -> &str {
        self.records.iter().find_map(Record::uri).unwrap_or_default()
    }

    pub fn primary_url(&self) -> &str {
        self.records.iter().find_map(Record::url).unwrap_or_default()
    }

    pub fn primary_want(&self) -> Option<&Object> {
        self.records.iter().find_map(Record::want)
    }

    pub fn primary_pixel_map(&self) -> Option<&PixelMapDescriptor> {
        self.records.iter().find_map(Record::pixel_map)
    }

    pub fn primary_app_item(&self) -> Option<AppItem> {
        self.records.iter().find_map(Record::app_item)
    }

    /// Bytes of the first record carrying an application-defined `tag`.
    pub fn primary_raw_data(&self, tag: &str) -> &[u8] {
        self.records
            .iter()
            .find_map(|r| r.raw_data(tag))
            .unwrap_or_default()
    }
}
