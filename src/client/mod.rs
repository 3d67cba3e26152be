//! CLI client for broker operations.
//!
//! Most commands connect, perform a single request, print the result and
//! exit. `copy-delayed` and `watch` stay connected: the former until its
//! placeholder has been rendered or replaced, the latter until the broker
//! goes away.

mod broker_client;
mod format;

use std::path::Path;

use tracing::{debug, info};

use crate::broker;
use crate::cli::ClientAction;
use crate::clip::{
    Clip, PasteboardError, Payload, Properties, Record, ShareOption, entry::TAG_HTML,
};

pub use broker_client::{BrokerClient, Event};

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("broker: {0}")]
    Broker(String),
    #[error(transparent)]
    Pasteboard(#[from] PasteboardError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command against the default broker socket.
///
/// Returns the process exit code. Only `has` uses a non-zero code for a
/// non-error outcome.
pub async fn run(app_id: &str, action: ClientAction) -> Result<i32, ClientError> {
    let path = broker::resolve_socket_path().map_err(|e| ClientError::Broker(e.to_string()))?;
    run_at(&path, app_id, action).await
}

/// Run the client command against the broker at `path`.
pub async fn run_at(path: &Path, app_id: &str, action: ClientAction) -> Result<i32, ClientError> {
    let mut broker = BrokerClient::connect(path, app_id).await?;

    match action {
        ClientAction::Copy {
            text,
            html,
            share,
            tag,
            local_only,
        } => {
            let clip = build_clip(text, html, share, tag, local_only)?;
            let version = broker.set(clip).await?;
            format::print_count(version);
        }
        ClientAction::CopyDelayed { text, share } => {
            let properties = Properties {
                share_option: share,
                ..Properties::default()
            };
            let version = broker.set_delayed(properties).await?;
            broker.subscribe().await?;
            format::print_count(version);
            serve_delayed(&mut broker, version, &text).await?;
        }
        ClientAction::Paste { records } => {
            let clip = broker.get().await?;
            if records {
                format::print_records(&clip);
            } else {
                format::print_text(&clip)?;
            }
        }
        ClientAction::Has { mime_type } => {
            let has = broker.has(mime_type.as_deref()).await?;
            format::print_has(has);
            return Ok(if has { 0 } else { 1 });
        }
        ClientAction::Count => {
            format::print_count(broker.change_count().await?);
        }
        ClientAction::Clear => {
            format::print_count(broker.clear().await?);
        }
        ClientAction::Share { option } => {
            let changed = broker.set_share_option(option).await?;
            format::print_share(option, changed);
        }
        ClientAction::Watch => {
            broker.subscribe().await?;
            while let Some(event) = broker.next_event().await? {
                if let Event::Update { change_count } = event {
                    format::print_update(change_count);
                }
            }
        }
    }

    Ok(0)
}

/// Build the clip for `copy`. With `--html`, the record carries the HTML
/// as its primary entry and the text as a fallback.
fn build_clip(
    text: String,
    html: Option<String>,
    share: ShareOption,
    tag: Option<String>,
    local_only: bool,
) -> Result<Clip, ClientError> {
    let mut record = Record::plain_text(text);
    if let Some(html) = html {
        record.add_entry(TAG_HTML, Payload::Text(html))?;
    }
    let mut clip = Clip::new();
    clip.insert_record(record)?;
    clip.set_share_option(share);
    clip.set_local_only(local_only);
    if let Some(tag) = tag {
        clip.set_tag(tag);
    }
    Ok(clip)
}

/// Answer render requests for the placeholder published at `version`.
///
/// Returns once a later write lands: either our own rendered clip or
/// someone else's replacement.
async fn serve_delayed(
    broker: &mut BrokerClient,
    version: u64,
    text: &str,
) -> Result<(), ClientError> {
    while let Some(event) = broker.next_event().await? {
        match event {
            Event::Render { id } => {
                debug!(id, "rendering delayed clip");
                broker.rendered(id, Ok(Clip::from_text(text))).await?;
            }
            Event::Update { change_count } if change_count > version => {
                info!(change_count, "placeholder resolved or replaced");
                return Ok(());
            }
            Event::Update { .. } => {}
        }
    }
    Ok(())
}
