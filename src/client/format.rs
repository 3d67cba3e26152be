//! Output formatting for CLI client commands.
//!
//! Status lines and record tables for humans. For `paste`, the clip text
//! goes to stdout and everything else to stderr so that piping works
//! (`pasteboardd client paste | wc -c`).

use std::io::{self, Write};

use crate::clip::{Clip, Entry, Payload, Record, ShareOption};

/// Longest payload preview shown in the records table.
const PREVIEW_CHARS: usize = 40;

/// Write the clip's primary text to stdout, unterminated.
pub fn print_text(clip: &Clip) -> Result<(), io::Error> {
    if clip.is_empty() {
        eprintln!("Pasteboard is empty");
        return Ok(());
    }
    eprintln!("Version:   {}", clip.version());
    eprintln!("Share:     {}", clip.share_option().as_str());
    eprintln!("---");
    let mut stdout = io::stdout().lock();
    stdout.write_all(clip.primary_text().as_bytes())?;
    stdout.flush()
}

/// Print every record as a table to stdout.
pub fn print_records(clip: &Clip) {
    if clip.is_empty() {
        println!("Pasteboard is empty");
        return;
    }

    println!(
        "version {}  share {}  tag {}",
        clip.version(),
        clip.share_option().as_str(),
        if clip.properties().tag.is_empty() {
            "-"
        } else {
            clip.properties().tag.as_str()
        },
    );
    println!("{:>5} {:<32} PREVIEW", "INDEX", "TYPE");
    println!("{}", "-".repeat(80));
    for (index, record) in clip.records().iter().enumerate() {
        for line in record_rows(index, record) {
            println!("{line}");
        }
    }
}

pub fn print_has(has: bool) {
    println!("{}", if has { "yes" } else { "no" });
}

pub fn print_count(change_count: u64) {
    println!("{change_count}");
}

pub fn print_update(change_count: u64) {
    println!("update {change_count}");
}

pub fn print_share(option: ShareOption, changed: bool) {
    if changed {
        println!("Share option set to {}", option.as_str());
    } else {
        println!("Pasteboard is empty; nothing to change");
    }
}

/// One row per entry. The index column is only filled on the first row.
fn record_rows(index: usize, record: &Record) -> Vec<String> {
    record
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let index = if i == 0 {
                index.to_string()
            } else {
                String::new()
            };
            format!("{index:>5} {:<32} {}", entry.tag, preview(entry))
        })
        .collect()
}

fn preview(entry: &Entry) -> String {
    match &entry.payload {
        Payload::Text(text) => {
            let mut out: String = text
                .chars()
                .take(PREVIEW_CHARS)
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect();
            if text.chars().count() > PREVIEW_CHARS {
                out.push_str("...");
            }
            out
        }
        Payload::Object(object) => format!("{{{} fields}}", object.len()),
        Payload::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        Payload::Image(image) => format!(
            "<{}x{} {}>",
            image.width, image.height, image.pixel_format
        ),
    }
}
