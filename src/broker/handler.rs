//! Message dispatch and request handling.
//!
//! Translates wire requests into [`Pasteboard`] calls and results back
//! into responses. Error strings are the machine-readable codes from
//! [`PasteboardError::code`] plus the broker's own protocol reasons.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::clip::{Clip, PasteboardError, ProviderError};
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};
use crate::store::{Caller, IdentityOracle, Pasteboard};

use super::session::Session;

/// What the connection should do with a handled request.
pub enum Dispatch {
    /// Send this response now.
    Reply(Message),
    /// Run this future off the connection loop and send its result.
    Deferred(BoxFuture<'static, Message>),
    /// Nothing to send.
    Silent,
}

/// Validate a `hello` and resolve the caller.
///
/// Returns the `hello_ack` to send and, on success, the caller identity.
pub fn handle_hello(
    oracle: &dyn IdentityOracle,
    id: u32,
    version: u32,
    app_id: &str,
    device_id: Option<&str>,
) -> (Message, Option<Caller>) {
    let reject = |reason: &str| Message::HelloAck {
        id,
        status: Status::Error,
        error: Some(reason.to_string()),
    };
    if version != PROTOCOL_VERSION {
        return (reject("version_mismatch"), None);
    }
    if app_id.is_empty() {
        return (reject("invalid_app_id"), None);
    }
    let caller = oracle.resolve(app_id, device_id);
    let ack = Message::HelloAck {
        id,
        status: Status::Ok,
        error: None,
    };
    (ack, Some(caller))
}

/// Dispatch a post-handshake request.
///
/// `get_clip` is deferred because it may wait on a delay provider,
/// and that provider may be this very connection.
pub async fn handle_message(
    pasteboard: &Pasteboard,
    session: &mut Session,
    request: Message,
) -> Dispatch {
    let caller = &session.caller;
    let reply = match request {
        Message::Clear { id } => count_or_error(id, pasteboard.clear(caller).await),
        Message::SetClip { id, clip } => count_or_error(id, pasteboard.set(caller, clip).await),
        Message::SetDelayed { id, properties } => {
            let provider = session.provider();
            let result = pasteboard.set_delayed(caller, properties, provider).await;
            count_or_error(id, result.map(|token| token.version))
        }
        Message::SetShareOption { id, share_option } => {
            match pasteboard.set_share_option(caller, share_option).await {
                Ok(changed) => with_has(id, changed),
                Err(e) => error_response(id, &e),
            }
        }
        Message::Has { id, mime_type } => {
            let has = match mime_type {
                Some(tag) => pasteboard.has_data_type(caller, &tag).await,
                None => pasteboard.has(caller).await,
            };
            with_has(id, has)
        }
        Message::GetClip { id } => {
            let pasteboard = pasteboard.clone();
            let caller = caller.clone();
            return Dispatch::Deferred(Box::pin(async move {
                match pasteboard.get(&caller).await {
                    Ok(clip) => with_clip(id, clip),
                    Err(e) => error_response(id, &e),
                }
            }));
        }
        Message::GetChangeCount { id } => with_count(id, pasteboard.change_count()),
        Message::Subscribe { id } => {
            session.subscribe(pasteboard);
            Message::ok(id)
        }
        Message::Unsubscribe { id } => {
            session.unsubscribe(pasteboard);
            Message::ok(id)
        }
        Message::Rendered { id, clip, error } => {
            let result = match (clip, error) {
                (_, Some(reason)) => Err(ProviderError::Failed(reason)),
                (Some(clip), None) => Ok(clip),
                (None, None) => Ok(Clip::new()),
            };
            if !session.complete_render(id, result) {
                warn!(conn_id = ?session.conn_id, render_id = id, "rendered for unknown render id");
            }
            return Dispatch::Silent;
        }
        Message::Hello { id, .. } => Message::error(id, "already_connected", None),
        // Server-originated messages should never be sent by clients.
        Message::HelloAck { id, .. }
        | Message::Response { id, .. }
        | Message::Update { id, .. }
        | Message::Render { id } => Message::error(id, "unknown_type", None),
    };
    Dispatch::Reply(reply)
}

fn error_response(id: u32, err: &PasteboardError) -> Message {
    debug!(code = err.code(), error = %err, "request failed");
    Message::error(id, err.code(), Some(err.to_string()))
}

fn count_or_error(id: u32, result: Result<u64, PasteboardError>) -> Message {
    match result {
        Ok(count) => with_count(id, count),
        Err(e) => error_response(id, &e),
    }
}

fn with_count(id: u32, change_count: u64) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        detail: None,
        clip: None,
        has: None,
        change_count: Some(change_count),
    }
}

fn with_has(id: u32, has: bool) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        detail: None,
        clip: None,
        has: Some(has),
        change_count: None,
    }
}

fn with_clip(id: u32, clip: Clip) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        detail: None,
        change_count: Some(clip.version()),
        clip: Some(clip),
        has: None,
    }
}
