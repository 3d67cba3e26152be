//! Per-connection session state.
//!
//! A session exists once the handshake succeeds. It owns the connection's
//! outbound queue, its event subscription and the render requests still
//! waiting for a `rendered` answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::clip::{Clip, ProviderError};
use crate::ipc::protocol::Message;
use crate::store::{
    Caller, DelayProvider, Pasteboard, ProviderFuture, SubscriptionId, Topic, UpdateEvent,
};

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub type RenderReply = oneshot::Sender<Result<Clip, ProviderError>>;

/// Frames queued for the connection's writer half.
pub enum Outbound {
    Message(Message),
    /// Ask the client to render its delayed clip.
    Render(RenderReply),
}

pub struct Session {
    pub conn_id: ConnectionId,
    pub caller: Caller,
    outbound: mpsc::UnboundedSender<Outbound>,
    subscription: Option<SubscriptionId>,
    pending_renders: HashMap<u32, RenderReply>,
    next_render_id: u32,
}

impl Session {
    pub fn new(
        conn_id: ConnectionId,
        caller: Caller,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            conn_id,
            caller,
            outbound,
            subscription: None,
            pending_renders: HashMap::new(),
            next_render_id: 1,
        }
    }

    pub fn outbound(&self) -> mpsc::UnboundedSender<Outbound> {
        self.outbound.clone()
    }

    /// Delay provider that asks this connection's client to render.
    pub fn provider(&self) -> Arc<dyn DelayProvider> {
        Arc::new(RemoteProvider {
            outbound: self.outbound.clone(),
        })
    }

    /// Register for update events. Idempotent per connection.
    pub fn subscribe(&mut self, pasteboard: &Pasteboard) {
        if self.subscription.is_some() {
            return;
        }
        let outbound = self.outbound.clone();
        let id = pasteboard.subscribe(
            Topic::Update,
            Arc::new(move |event: &UpdateEvent| {
                let _ = outbound.send(Outbound::Message(Message::Update {
                    id: 0,
                    change_count: event.change_count,
                }));
            }),
        );
        self.subscription = Some(id);
    }

    pub fn unsubscribe(&mut self, pasteboard: &Pasteboard) {
        if let Some(id) = self.subscription.take() {
            pasteboard.unsubscribe(Topic::Update, Some(id));
        }
    }

    /// Park `reply` and build the `render` frame that asks for it.
    ///
    /// Renders whose store side already gave up (timed out or superseded)
    /// are dropped here, so a client that never answers cannot pile them up.
    pub fn begin_render(&mut self, reply: RenderReply) -> Message {
        self.pending_renders.retain(|_, parked| !parked.is_closed());
        let id = self.next_render_id;
        self.next_render_id = self.next_render_id.wrapping_add(1).max(1);
        self.pending_renders.insert(id, reply);
        Message::Render { id }
    }

    /// Resolve a parked render. Returns `false` for an unknown id.
    pub fn complete_render(&mut self, id: u32, result: Result<Clip, ProviderError>) -> bool {
        match self.pending_renders.remove(&id) {
            Some(reply) => {
                let _ = reply.send(result);
                true
            }
            None => false,
        }
    }

    pub fn pending_render_count(&self) -> usize {
        self.pending_renders.len()
    }

    /// Release everything the session holds in the store.
    ///
    /// Parked renders are dropped, which their providers observe as a
    /// disconnect.
    pub fn close(mut self, pasteboard: &Pasteboard) {
        self.unsubscribe(pasteboard);
        self.pending_renders.clear();
    }
}

/// Provider backed by a client connection.
struct RemoteProvider {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl DelayProvider for RemoteProvider {
    fn provide(&self) -> ProviderFuture {
        let (tx, rx) = oneshot::channel();
        let sent = self.outbound.send(Outbound::Render(tx)).is_ok();
        Box::pin(async move {
            if !sent {
                return Err(ProviderError::Disconnected);
            }
            rx.await.unwrap_or(Err(ProviderError::Disconnected))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PasteboardConfig;

    fn session() -> (Session, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let caller = Caller::new("com.example.notes", "local");
        (Session::new(ConnectionId::new(), caller, tx), rx)
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[tokio::test]
    async fn remote_provider_round_trip() {
        let (mut session, mut rx) = session();
        let provider = session.provider();
        let pending = tokio::spawn(provider.provide());

        let Some(Outbound::Render(reply)) = rx.recv().await else {
            panic!("expected render request");
        };
        let msg = session.begin_render(reply);
        let Message::Render { id } = msg else {
            panic!("expected render frame");
        };
        assert_eq!(session.pending_render_count(), 1);
        assert!(session.complete_render(id, Ok(Clip::from_text("rendered"))));
        assert!(!session.complete_render(id, Ok(Clip::new())));

        let clip = pending.await.unwrap().unwrap();
        assert_eq!(clip.primary_text(), "rendered");
    }

    #[tokio::test]
    async fn abandoned_renders_are_swept() {
        let (mut session, _rx) = session();

        let (stale_tx, stale_rx) = oneshot::channel();
        session.begin_render(stale_tx);
        assert_eq!(session.pending_render_count(), 1);
        drop(stale_rx);

        let (live_tx, _live_rx) = oneshot::channel();
        let Message::Render { id } = session.begin_render(live_tx) else {
            panic!("expected render frame");
        };
        assert_eq!(session.pending_render_count(), 1);
        assert!(session.complete_render(id, Ok(Clip::new())));
        assert_eq!(session.pending_render_count(), 0);
    }

    #[tokio::test]
    async fn closed_connection_fails_provider() {
        let (session, rx) = session();
        let provider = session.provider();
        drop(rx);
        assert_eq!(provider.provide().await, Err(ProviderError::Disconnected));
    }

    #[tokio::test]
    async fn dropped_render_reads_as_disconnect() {
        let (mut session, mut rx) = session();
        let pasteboard = Pasteboard::spawn(PasteboardConfig::default());
        let pending = tokio::spawn(session.provider().provide());

        let Some(Outbound::Render(reply)) = rx.recv().await else {
            panic!("expected render request");
        };
        session.begin_render(reply);
        session.close(&pasteboard);

        assert_eq!(pending.await.unwrap(), Err(ProviderError::Disconnected));
    }

    #[tokio::test]
    async fn subscription_forwards_updates() {
        let (mut session, mut rx) = session();
        let pasteboard = Pasteboard::spawn(PasteboardConfig::default());
        session.subscribe(&pasteboard);
        session.subscribe(&pasteboard);

        pasteboard
            .set(&session.caller, Clip::from_text("x"))
            .await
            .unwrap();
        match rx.recv().await {
            Some(Outbound::Message(Message::Update { change_count, .. })) => {
                assert_eq!(change_count, 1)
            }
            _ => panic!("expected update"),
        }
        assert!(rx.try_recv().is_err(), "double subscribe must not duplicate");

        session.unsubscribe(&pasteboard);
        pasteboard.clear(&session.caller).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
