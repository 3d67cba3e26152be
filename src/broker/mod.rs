//! Broker daemon: serves the pasteboard over a Unix domain socket.
//!
//! Architecture: the [`Pasteboard`] store actor owns all clip state.
//! The broker loop only accepts connections and watches for shutdown
//! signals; each connection runs in its own task and talks to the store
//! through a cloned handle.

mod connection;
pub mod handler;
pub mod session;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::store::{ClaimedIdentity, IdentityOracle, Pasteboard, PasteboardConfig};

use session::ConnectionId;

/// Directory under `$XDG_RUNTIME_DIR` holding the broker socket.
pub const SOCKET_DIR: &str = "pasteboard";

/// Socket file name.
pub const SOCKET_NAME: &str = "broker.sock";

/// Broker startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("broker already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("socket path {0} has no parent directory")]
    InvalidSocketPath(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the broker daemon until SIGTERM or SIGINT.
///
/// - Socket at `$XDG_RUNTIME_DIR/pasteboard/broker.sock` (directory mode 0700)
/// - Stale socket detection and cleanup
/// - SIGTERM/SIGINT → graceful shutdown, socket file removed
/// - All state in memory only
pub async fn run(config: PasteboardConfig) -> Result<(), BrokerError> {
    let socket_path = resolve_socket_path()?;
    let listener = bind_socket(&socket_path).await?;
    info!(path = %socket_path.display(), device_id = %config.device_id, "broker listening");

    let oracle: Arc<dyn IdentityOracle> = Arc::new(ClaimedIdentity::new(config.device_id.clone()));
    let pasteboard = Pasteboard::spawn(config);

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    serve(listener, pasteboard, oracle, shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    info!("broker stopped");
    Ok(())
}

/// Accept connections on `listener` until `shutdown` completes.
pub async fn serve(
    listener: UnixListener,
    pasteboard: Pasteboard,
    oracle: Arc<dyn IdentityOracle>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    let conn_id = ConnectionId::new();
                    debug!(?conn_id, "accepted connection");
                    connection::spawn_connection(
                        stream,
                        conn_id,
                        pasteboard.clone(),
                        Arc::clone(&oracle),
                    );
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            () = &mut shutdown => break,
        }
    }
}

// -- Socket setup --

/// Resolve the broker socket path from `$XDG_RUNTIME_DIR`.
pub fn resolve_socket_path() -> Result<PathBuf, BrokerError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| BrokerError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir).join(SOCKET_DIR).join(SOCKET_NAME))
}

/// Create the socket directory and bind the Unix listener.
///
/// On EADDRINUSE, probes the existing socket: a live peer means another
/// broker is running, otherwise the file is stale and is replaced.
pub async fn bind_socket(path: &Path) -> Result<UnixListener, BrokerError> {
    let parent = path
        .parent()
        .ok_or_else(|| BrokerError::InvalidSocketPath(path.to_path_buf()))?;
    let mkdir_failed = |source| BrokerError::MkdirFailed {
        path: parent.to_path_buf(),
        source,
    };
    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(mkdir_failed)?;
    }
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
            .map_err(mkdir_failed)?;
    }

    let bind_failed = |source| BrokerError::BindFailed {
        path: path.to_path_buf(),
        source,
    };
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(BrokerError::AlreadyRunning(path.to_path_buf()));
            }
            info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use futures::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::codec::Framed;

    use crate::clip::{Clip, ShareOption};
    use crate::ipc::codec::MessageCodec;
    use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status};

    type Conn = Framed<UnixStream, MessageCodec>;

    /// Start a broker on `path`; it runs until the test runtime ends.
    async fn start_broker(path: &Path) {
        let listener = bind_socket(path).await.unwrap();
        let pasteboard = Pasteboard::spawn(PasteboardConfig::default());
        let oracle: Arc<dyn IdentityOracle> = Arc::new(ClaimedIdentity::new("local"));
        tokio::spawn(serve(
            listener,
            pasteboard,
            oracle,
            std::future::pending(),
        ));
    }

    async fn connect(path: &Path, app_id: &str) -> Conn {
        let stream = UnixStream::connect(path).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        let ack = send_recv(
            &mut conn,
            Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                app_id: app_id.into(),
                device_id: None,
            },
        )
        .await;
        assert!(matches!(
            ack,
            Message::HelloAck {
                status: Status::Ok,
                ..
            }
        ));
        conn
    }

    async fn send_recv(conn: &mut Conn, msg: Message) -> Message {
        conn.send(msg).await.unwrap();
        conn.next().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn copy_paste_between_apps() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let mut writer = connect(&sock, "com.example.notes").await;
        let resp = send_recv(
            &mut writer,
            Message::SetClip {
                id: 1,
                clip: Clip::from_text("Hello World!"),
            },
        )
        .await;
        assert!(matches!(
            resp,
            Message::Response {
                status: Status::Ok,
                change_count: Some(1),
                ..
            }
        ));

        let mut reader = connect(&sock, "com.example.mail").await;
        match send_recv(&mut reader, Message::GetClip { id: 1 }).await {
            Message::Response {
                id: 1,
                clip: Some(clip),
                ..
            } => {
                assert_eq!(clip.record_count(), 1);
                assert_eq!(clip.primary_mime_type(), Some("text/plain"));
                assert_eq!(clip.primary_text(), "Hello World!");
            }
            other => panic!("expected clip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_app_clip_is_empty_for_other_apps() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let mut writer = connect(&sock, "com.example.notes").await;
        let mut clip = Clip::from_text("private");
        clip.set_share_option(ShareOption::InApp);
        send_recv(&mut writer, Message::SetClip { id: 1, clip }).await;

        let mut reader = connect(&sock, "com.example.mail").await;
        match send_recv(&mut reader, Message::GetClip { id: 2 }).await {
            Message::Response {
                status: Status::Ok,
                clip: Some(clip),
                ..
            } => assert!(clip.is_empty()),
            other => panic!("expected empty clip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn writer_renders_its_own_delayed_clip() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let mut writer = connect(&sock, "com.example.notes").await;
        send_recv(
            &mut writer,
            Message::SetDelayed {
                id: 1,
                properties: Default::default(),
            },
        )
        .await;

        // Reading from the same connection must not deadlock: the broker
        // asks for a render while the get is outstanding.
        writer.send(Message::GetClip { id: 2 }).await.unwrap();
        let render_id = match writer.next().await.unwrap().unwrap() {
            Message::Render { id } => id,
            other => panic!("expected render, got {other:?}"),
        };
        writer
            .send(Message::Rendered {
                id: render_id,
                clip: Some(Clip::from_text("made on demand")),
                error: None,
            })
            .await
            .unwrap();

        match writer.next().await.unwrap().unwrap() {
            Message::Response {
                id: 2,
                clip: Some(clip),
                change_count: Some(2),
                ..
            } => assert_eq!(clip.primary_text(), "made on demand"),
            other => panic!("expected clip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn writer_disconnect_fails_pending_read() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let mut writer = connect(&sock, "com.example.notes").await;
        send_recv(
            &mut writer,
            Message::SetDelayed {
                id: 1,
                properties: Default::default(),
            },
        )
        .await;

        let mut reader = connect(&sock, "com.example.mail").await;
        reader.send(Message::GetClip { id: 1 }).await.unwrap();
        assert!(matches!(
            writer.next().await.unwrap().unwrap(),
            Message::Render { .. }
        ));
        drop(writer);

        match reader.next().await.unwrap().unwrap() {
            Message::Response { status, error, .. } => {
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("provider_error"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_updates() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let mut watcher = connect(&sock, "com.example.watch").await;
        let resp = send_recv(&mut watcher, Message::Subscribe { id: 1 }).await;
        assert!(matches!(
            resp,
            Message::Response {
                status: Status::Ok,
                ..
            }
        ));

        let mut writer = connect(&sock, "com.example.notes").await;
        send_recv(&mut writer, Message::Clear { id: 1 }).await;
        send_recv(
            &mut writer,
            Message::SetClip {
                id: 2,
                clip: Clip::from_text("x"),
            },
        )
        .await;

        for expected in [1, 2] {
            match watcher.next().await.unwrap().unwrap() {
                Message::Update { change_count, .. } => assert_eq!(change_count, expected),
                other => panic!("expected update, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn version_mismatch_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let stream = UnixStream::connect(&sock).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        let resp = send_recv(
            &mut conn,
            Message::Hello {
                id: 0,
                version: 999,
                app_id: "app".into(),
                device_id: None,
            },
        )
        .await;
        match resp {
            Message::HelloAck { status, error, .. } => {
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("version_mismatch"));
            }
            other => panic!("expected HelloAck error, got {other:?}"),
        }
        assert!(conn.next().await.is_none(), "expected connection closed");
    }

    #[tokio::test]
    async fn non_hello_first_message_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let stream = UnixStream::connect(&sock).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        conn.send(Message::GetClip { id: 1 }).await.unwrap();
        let next = conn.next().await;
        assert!(next.is_none(), "expected connection closed, got {next:?}");
    }

    #[tokio::test]
    async fn unknown_type_returns_error_keeps_connection() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;

        let conn = connect(&sock, "app").await;
        let (mut reader, mut writer) = conn.into_inner().into_split();

        #[derive(serde::Serialize)]
        struct FakeMsg {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        async fn write_raw(writer: &mut tokio::net::unix::OwnedWriteHalf, payload: &[u8]) {
            let mut frame = BytesMut::new();
            frame.put_u32(payload.len() as u32);
            frame.extend_from_slice(payload);
            writer.write_all(&frame).await.unwrap();
        }
        async fn read_raw(reader: &mut tokio::net::unix::OwnedReadHalf) -> Message {
            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf).await.unwrap();
            let mut buf = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            reader.read_exact(&mut buf).await.unwrap();
            rmp_serde::from_slice(&buf).unwrap()
        }

        let unknown = rmp_serde::to_vec_named(&FakeMsg {
            msg_type: "frobnicate",
            id: 42,
        })
        .unwrap();
        write_raw(&mut writer, &unknown).await;
        match read_raw(&mut reader).await {
            Message::Response {
                id, status, error, ..
            } => {
                assert_eq!(id, 42);
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("unknown_type"));
            }
            other => panic!("expected error Response, got {other:?}"),
        }

        let count = rmp_serde::to_vec_named(&Message::GetChangeCount { id: 7 }).unwrap();
        write_raw(&mut writer, &count).await;
        assert!(matches!(
            read_raw(&mut reader).await,
            Message::Response {
                id: 7,
                status: Status::Ok,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn live_socket_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        start_broker(&sock).await;
        assert!(matches!(
            bind_socket(&sock).await,
            Err(BrokerError::AlreadyRunning(_))
        ));
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("broker.sock");
        drop(std::os::unix::net::UnixListener::bind(&sock).unwrap());
        assert!(sock.exists());
        assert!(bind_socket(&sock).await.is_ok());
    }
}
