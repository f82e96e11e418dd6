//! TCP client for the real-time surface
//!
//! Used by tooling and the integration tests. One background task owns
//! the socket: it writes queued frames, completes pending invocations and
//! forwards pushed events.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use podium_core::{SessionGrant, Snowflake};
use serde_json::Value;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientFrame, ConnectionKind, Request, ServerFrame};

/// Named event pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub name: String,
    pub args: Vec<Value>,
}

type Pending = Arc<DashMap<u64, oneshot::Sender<Value>>>;

/// Connected client handle
pub struct Client {
    kind: ConnectionKind,
    identifier: Snowflake,
    cmd_tx: mpsc::Sender<ClientFrame>,
    event_rx: mpsc::Receiver<PushEvent>,
    pending: Pending,
    next_call: AtomicU64,
}

impl Client {
    /// Obtain a screen or spectator session
    pub async fn bootstrap(addr: SocketAddr, kind: ConnectionKind) -> Result<SessionGrant> {
        let stream = TcpStream::connect(addr).await?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        write_frame(&mut writer, &ClientFrame::Bootstrap { kind }).await?;
        match read_frame::<ServerFrame, _>(&mut reader).await? {
            ServerFrame::SessionGranted { grant } => Ok(grant),
            ServerFrame::Rejected { reason } => Err(Error::Rejected(reason)),
            _ => Err(Error::Protocol("Expected SessionGranted".into())),
        }
    }

    /// Connect as `kind`; `credential` is a presenter token or a session id
    pub async fn connect(addr: SocketAddr, kind: ConnectionKind, credential: &str) -> Result<Self> {
        info!(addr = %addr, kind = %kind, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        write_frame(
            &mut writer,
            &ClientFrame::Connect {
                kind,
                credential: credential.to_string(),
            },
        )
        .await?;

        let (event_tx, event_rx) = mpsc::channel(64);

        // Events may arrive ahead of the ack when connecting rejoins a room
        let identifier = loop {
            match read_frame::<ServerFrame, _>(&mut reader).await? {
                ServerFrame::Connected { identifier, .. } => break identifier,
                ServerFrame::SessionRequired => return Err(Error::SessionRequired),
                ServerFrame::Rejected { reason } => return Err(Error::Rejected(reason)),
                ServerFrame::Event { name, args } => {
                    let _ = event_tx.send(PushEvent { name, args }).await;
                }
                _ => return Err(Error::Protocol("Unexpected frame during connect".into())),
            }
        };

        let pending: Pending = Arc::new(DashMap::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(connection_task(
            reader,
            writer,
            pending.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            kind,
            identifier,
            cmd_tx,
            event_rx,
            pending,
            next_call: AtomicU64::new(1),
        })
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Entity identifier the server bound this connection to
    pub fn identifier(&self) -> Snowflake {
        self.identifier
    }

    /// Invoke `request` and wait for its completion value
    pub async fn invoke(&self, request: Request) -> Result<Value> {
        let request = serde_json::to_value(&request)
            .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(call_id, tx);

        if self
            .cmd_tx
            .send(ClientFrame::Invoke { call_id, request })
            .await
            .is_err()
        {
            self.pending.remove(&call_id);
            return Err(Error::NotConnected);
        }
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Get the next pushed event
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        self.event_rx.recv().await
    }

    /// Skip events until one named `name` arrives
    pub async fn next_event_named(&mut self, name: &str) -> Option<PushEvent> {
        while let Some(event) = self.event_rx.recv().await {
            if event.name == name {
                return Some(event);
            }
        }
        None
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.cmd_tx
            .send(ClientFrame::Ping)
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Main connection task
///
/// Reading runs in its own task: a frame read must never be cancelled
/// halfway by an outgoing command.
async fn connection_task(
    reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    pending: Pending,
    event_tx: mpsc::Sender<PushEvent>,
    mut cmd_rx: mpsc::Receiver<ClientFrame>,
) {
    let reader_handle = tokio::spawn(reader_task(reader, pending.clone(), event_tx));

    while let Some(frame) = cmd_rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!(error = %e, "Write error");
            break;
        }
    }

    debug!("Client dropped");
    reader_handle.abort();
    pending.clear();
}

/// Reader task - completes calls and forwards events
async fn reader_task(
    mut reader: ReadHalf<TcpStream>,
    pending: Pending,
    event_tx: mpsc::Sender<PushEvent>,
) {
    loop {
        match read_frame::<ServerFrame, _>(&mut reader).await {
            Ok(ServerFrame::Completion { call_id, result }) => match pending.remove(&call_id) {
                Some((_, tx)) => {
                    let _ = tx.send(result);
                }
                None => debug!(call_id, "Completion for unknown call"),
            },
            Ok(ServerFrame::Event { name, args }) => {
                let _ = event_tx.send(PushEvent { name, args }).await;
            }
            Ok(ServerFrame::Pong) => {
                debug!("Received pong");
            }
            Ok(_) => {
                debug!("Ignoring unexpected frame");
            }
            Err(Error::Decode(e)) => {
                debug!(error = %e, "Skipping malformed frame");
            }
            Err(Error::ConnectionClosed) => {
                debug!("Server closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Read error");
                break;
            }
        }
    }

    // Fail outstanding calls
    pending.clear();
}
