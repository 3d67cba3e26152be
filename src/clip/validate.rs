//! Validation gate: shape, size and count checks run before any mutation.
//!
//! Every mutating clip operation calls into this module first and only
//! touches its data once the check passes, so a rejected call leaves the
//! clip exactly as it was.
//!
//! Shape policy: the fixed system tags (`general.text`, `text/want`,
//! `openharmony.app-item`, `openharmony.pixel-map`) declare a single
//! payload shape and reject anything else. Free MIME tags (`text/plain`,
//! `text/html`, `text/uri`, application-defined tags) accept any shape;
//! a mismatched payload there just resolves to empty through the kind
//! accessors.

use std::collections::HashSet;

use super::entry::{Payload, TAG_APP_ITEM, TAG_PIXEL_MAP, TAG_TEXT, TAG_WANT};
use super::error::PasteboardError;
use super::record::Record;
use super::{Clip, MAX_RECORDS, MAX_TAG_BYTES};

/// Check that a tag is non-empty and at most [`MAX_TAG_BYTES`] long.
pub fn check_tag(tag: &str) -> Result<(), PasteboardError> {
    if tag.is_empty() {
        return Err(PasteboardError::Parameter("type tag is empty".into()));
    }
    if tag.len() > MAX_TAG_BYTES {
        return Err(PasteboardError::Parameter(format!(
            "type tag is {} bytes (max {MAX_TAG_BYTES})",
            tag.len()
        )));
    }
    Ok(())
}

/// The payload shape a fixed tag requires, if any.
fn declared_shape(tag: &str) -> Option<&'static str> {
    match tag {
        TAG_TEXT | TAG_WANT | TAG_APP_ITEM => Some("object"),
        TAG_PIXEL_MAP => Some("image"),
        _ => None,
    }
}

/// Check that `payload` is admissible under `tag`.
pub fn check_shape(tag: &str, payload: &Payload) -> Result<(), PasteboardError> {
    match declared_shape(tag) {
        Some(expected) if expected != payload.shape() => Err(PasteboardError::Parameter(format!(
            "tag {tag} requires a {expected} payload, got {}",
            payload.shape()
        ))),
        _ => Ok(()),
    }
}

/// Tag and shape check for a single entry.
pub fn check_entry(tag: &str, payload: &Payload) -> Result<(), PasteboardError> {
    check_tag(tag)?;
    check_shape(tag, payload)
}

/// Check that one more record fits.
pub fn check_capacity(current: usize) -> Result<(), PasteboardError> {
    if current >= MAX_RECORDS {
        return Err(PasteboardError::Capacity { limit: MAX_RECORDS });
    }
    Ok(())
}

/// Check that `index` addresses an existing record.
pub fn check_index(index: usize, len: usize) -> Result<(), PasteboardError> {
    if index >= len {
        return Err(PasteboardError::Index { index, len });
    }
    Ok(())
}

/// Check a whole record: at least one entry, every entry valid, tags unique.
pub fn check_record(record: &Record) -> Result<(), PasteboardError> {
    if record.entries().is_empty() {
        return Err(PasteboardError::Parameter("record has no entries".into()));
    }
    let mut seen = HashSet::new();
    for entry in record.entries() {
        check_entry(&entry.tag, &entry.payload)?;
        if !seen.insert(entry.tag.as_str()) {
            return Err(PasteboardError::Parameter(format!(
                "duplicate type tag {} in record",
                entry.tag
            )));
        }
    }
    Ok(())
}

/// Full check of a clip about to be published.
///
/// Clips arriving over the wire bypass the mutators, so the broker
/// re-runs the whole gate on `set`.
pub fn check_clip(clip: &Clip) -> Result<(), PasteboardError> {
    if clip.record_count() > MAX_RECORDS {
        return Err(PasteboardError::Capacity { limit: MAX_RECORDS });
    }
    for record in clip.records() {
        check_record(record)?;
    }
    Ok(())
}
