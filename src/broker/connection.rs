//! Per-connection task: framed I/O, handshake, request dispatch.
//!
//! Each client connection spawns a tokio task that:
//! 1. Wraps the socket in a length-prefixed MessagePack codec.
//! 2. Reads the first message (must be `Hello`) and resolves the caller.
//! 3. Enters a select loop: dispatch requests, and write out whatever the
//!    session's outbound queue carries (deferred responses, `update`
//!    events, `render` requests).
//! 4. On disconnect, releases the session's subscription and renders.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::Message;
use crate::store::{IdentityOracle, Pasteboard};

use super::handler::{self, Dispatch};
use super::session::{ConnectionId, Outbound, Session};

/// Connection-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be Hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Spawn a connection handler task.
pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    pasteboard: Pasteboard,
    oracle: Arc<dyn IdentityOracle>,
) {
    tokio::spawn(async move {
        match handle_connection(stream, conn_id, &pasteboard, oracle.as_ref()).await {
            Ok(()) => debug!(?conn_id, "connection closed"),
            Err(e) => debug!(?conn_id, error = %e, "connection closed"),
        }
    });
}

async fn handle_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    pasteboard: &Pasteboard,
    oracle: &dyn IdentityOracle,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // -- Handshake: first message must be Hello --
    let first_frame = framed.next().await.ok_or(ConnectionError::HandshakeEof)??;
    let (ack, caller) = match decode_frame(&first_frame) {
        DecodeResult::Ok(Message::Hello {
            id,
            version,
            app_id,
            device_id,
        }) => handler::handle_hello(oracle, id, version, &app_id, device_id.as_deref()),
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
    };
    framed.send(ack).await?;
    let Some(caller) = caller else {
        return Ok(());
    };

    info!(?conn_id, app_id = %caller.app_id, device_id = %caller.device_id, "client connected");
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(conn_id, caller, outbound_tx);

    let result = serve(&mut framed, pasteboard, &mut session, &mut outbound_rx).await;
    session.close(pasteboard);
    result
}

async fn serve(
    framed: &mut Framed<UnixStream, FrameCodec>,
    pasteboard: &Pasteboard,
    session: &mut Session,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
) -> Result<(), ConnectionError> {
    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(Ok(raw)) => raw,
                    Some(Err(e)) => return Err(ConnectionError::Codec(e)),
                    None => return Ok(()),
                };
                match decode_frame(&raw) {
                    DecodeResult::Ok(msg) => {
                        match handler::handle_message(pasteboard, session, msg).await {
                            Dispatch::Reply(response) => framed.send(response).await?,
                            Dispatch::Deferred(pending) => {
                                let tx = session.outbound();
                                tokio::spawn(async move {
                                    let _ = tx.send(Outbound::Message(pending.await));
                                });
                            }
                            Dispatch::Silent => {}
                        }
                    }
                    DecodeResult::UnknownType(envelope) => {
                        debug!(conn_id = ?session.conn_id, msg_type = %envelope.msg_type, "unknown message type");
                        framed.send(Message::error(envelope.id, "unknown_type", None)).await?;
                    }
                    DecodeResult::Malformed(e) => {
                        return Err(ConnectionError::MalformedFrame(e));
                    }
                }
            }
            Some(out) = outbound_rx.recv() => {
                let msg = match out {
                    Outbound::Message(msg) => msg,
                    Outbound::Render(reply) => session.begin_render(reply),
                };
                framed.send(msg).await?;
            }
        }
    }
}
