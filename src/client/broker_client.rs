//! Broker client.
//!
//! Connects to the broker, performs the handshake and exposes one method
//! per request. Unsolicited `update` and `render` frames that arrive while
//! a request is outstanding are queued and handed out by [`BrokerClient::next_event`].

use std::collections::VecDeque;
use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::clip::{Clip, PasteboardError, Properties, ShareOption};
use crate::ipc::codec::MessageCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};

use super::ClientError;

/// Broker-initiated traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A write committed.
    Update { change_count: u64 },
    /// The broker wants this client's delayed clip.
    Render { id: u32 },
}

pub struct BrokerClient {
    framed: Framed<UnixStream, MessageCodec>,
    next_id: u32,
    events: VecDeque<Event>,
}

impl BrokerClient {
    /// Connect to the broker socket at `path` and perform the handshake.
    pub async fn connect(path: &Path, app_id: &str) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| ClientError::Broker(format!("connect {}: {e}", path.display())))?;
        let mut framed = Framed::new(stream, MessageCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                app_id: app_id.to_string(),
                device_id: None,
            })
            .await
            .map_err(|e| ClientError::Broker(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Broker(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Broker(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self {
            framed,
            next_id: 1, // 0 = Hello
            events: VecDeque::new(),
        })
    }

    pub async fn clear(&mut self) -> Result<u64, ClientError> {
        let resp = self.call("clear", |id| Message::Clear { id }).await?;
        change_count(resp)
    }

    pub async fn set(&mut self, clip: Clip) -> Result<u64, ClientError> {
        let resp = self.call("set_clip", |id| Message::SetClip { id, clip }).await?;
        change_count(resp)
    }

    /// Publish a placeholder. The caller must answer the `render` event.
    pub async fn set_delayed(&mut self, properties: Properties) -> Result<u64, ClientError> {
        let resp = self
            .call("set_delayed", |id| Message::SetDelayed { id, properties })
            .await?;
        change_count(resp)
    }

    pub async fn has(&mut self, mime_type: Option<&str>) -> Result<bool, ClientError> {
        let mime_type = mime_type.map(str::to_string);
        match self.call("has", |id| Message::Has { id, mime_type }).await? {
            Message::Response { has: Some(has), .. } => Ok(has),
            other => Err(unexpected("has", &other)),
        }
    }

    pub async fn get(&mut self) -> Result<Clip, ClientError> {
        match self.call("get_clip", |id| Message::GetClip { id }).await? {
            Message::Response {
                clip: Some(clip), ..
            } => Ok(clip),
            other => Err(unexpected("get_clip", &other)),
        }
    }

    pub async fn change_count(&mut self) -> Result<u64, ClientError> {
        let resp = self
            .call("get_change_count", |id| Message::GetChangeCount { id })
            .await?;
        change_count(resp)
    }

    /// Returns `false` when the pasteboard was empty.
    pub async fn set_share_option(&mut self, option: ShareOption) -> Result<bool, ClientError> {
        let resp = self
            .call("set_share_option", |id| Message::SetShareOption {
                id,
                share_option: option,
            })
            .await?;
        match resp {
            Message::Response { has: Some(changed), .. } => Ok(changed),
            other => Err(unexpected("set_share_option", &other)),
        }
    }

    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        self.call("subscribe", |id| Message::Subscribe { id }).await?;
        Ok(())
    }

    pub async fn unsubscribe(&mut self) -> Result<(), ClientError> {
        self.call("unsubscribe", |id| Message::Unsubscribe { id })
            .await?;
        Ok(())
    }

    /// Answer a `render` event.
    pub async fn rendered(
        &mut self,
        id: u32,
        result: Result<Clip, String>,
    ) -> Result<(), ClientError> {
        let (clip, error) = match result {
            Ok(clip) => (Some(clip), None),
            Err(reason) => (None, Some(reason)),
        };
        self.framed
            .send(Message::Rendered { id, clip, error })
            .await
            .map_err(|e| ClientError::Broker(format!("send rendered: {e}")))
    }

    /// Next queued or incoming event. `None` once the broker hangs up.
    pub async fn next_event(&mut self) -> Result<Option<Event>, ClientError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.framed.next().await {
                Some(Ok(msg)) => match into_event(msg) {
                    Ok(event) => return Ok(Some(event)),
                    Err(other) => debug!(?other, "ignoring frame while waiting for events"),
                },
                Some(Err(e)) => return Err(ClientError::Broker(format!("receive: {e}"))),
                None => return Ok(None),
            }
        }
    }

    /// Send a request and wait for its response, queueing events that
    /// arrive in between. Error responses map onto [`PasteboardError`].
    async fn call(
        &mut self,
        op: &str,
        make: impl FnOnce(u32) -> Message,
    ) -> Result<Message, ClientError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.framed
            .send(make(id))
            .await
            .map_err(|e| ClientError::Broker(format!("send {op}: {e}")))?;

        loop {
            let msg = match self.framed.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(ClientError::Broker(format!("{op}: {e}"))),
                None => return Err(ClientError::Broker(format!("{op}: broker closed connection"))),
            };
            let msg = match into_event(msg) {
                Ok(event) => {
                    self.events.push_back(event);
                    continue;
                }
                Err(msg) => msg,
            };
            match msg {
                Message::Response {
                    id: resp_id,
                    status: Status::Error,
                    error,
                    detail,
                    ..
                } if resp_id == id => {
                    let code = error.unwrap_or_default();
                    return Err(ClientError::Pasteboard(PasteboardError::from_code(
                        &code,
                        &detail.unwrap_or(code.clone()),
                    )));
                }
                resp @ Message::Response { .. } if resp.id() == id => return Ok(resp),
                other => return Err(unexpected(op, &other)),
            }
        }
    }
}

fn into_event(msg: Message) -> Result<Event, Message> {
    match msg {
        Message::Update { change_count, .. } => Ok(Event::Update { change_count }),
        Message::Render { id } => Ok(Event::Render { id }),
        other => Err(other),
    }
}

fn change_count(resp: Message) -> Result<u64, ClientError> {
    match resp {
        Message::Response {
            change_count: Some(count),
            ..
        } => Ok(count),
        other => Err(unexpected("change_count", &other)),
    }
}

fn unexpected(op: &str, msg: &Message) -> ClientError {
    ClientError::Broker(format!("unexpected {op} response: {msg:?}"))
}
