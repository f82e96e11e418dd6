//! TCP server for the real-time surface
//!
//! Each connection opens with one handshake frame. `Bootstrap` is answered
//! with a session grant and the connection is closed. `Connect` attaches
//! the connection to a participant; from then on the client invokes
//! operations and the server pushes room events through the connection's
//! writer task.

use std::net::SocketAddr;
use std::sync::Arc;

use podium_core::ConnectionId;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::hub::Hub;
use crate::protocol::{ClientFrame, ConnectionKind, ServerFrame};
use crate::rooms::Caller;

/// Outbound queue depth per connection
const OUTBOUND_QUEUE: usize = 64;

/// Real-time server handle
pub struct Server {
    addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind `addr` and start accepting connections
    pub async fn start(addr: SocketAddr, hub: Arc<Hub>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, hub.clone(), shutdown_rx));

        if let Some(interval) = hub.reaper().config().interval() {
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(reaper_task(hub.clone(), interval, shutdown_rx));
        }

        Ok(Server {
            addr: bound_addr,
            hub,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    hub: Arc<Hub>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(stream, addr, hub.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    let caller = match handshake(&mut reader, &mut writer, &hub, tx.clone()).await {
        Ok(Some(caller)) => caller,
        Ok(None) => return,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Handshake failed");
            return;
        }
    };

    let writer_handle = tokio::spawn(writer_task(writer, rx));

    if tx
        .send(ServerFrame::Connected {
            kind: caller.kind,
            identifier: caller.identifier,
        })
        .await
        .is_err()
    {
        debug!(connection = %caller.connection, "Writer gone before connect ack");
    }

    // Read loop
    loop {
        match read_frame::<ClientFrame, _>(&mut reader).await {
            Ok(ClientFrame::Invoke { call_id, request }) => {
                debug!(connection = %caller.connection, call_id, "Invoke");
                let result = hub.invoke(&caller, request).await;
                if tx.send(ServerFrame::Completion { call_id, result }).await.is_err() {
                    break;
                }
            }
            Ok(ClientFrame::Ping) => {
                let _ = tx.send(ServerFrame::Pong).await;
            }
            Ok(_) => {
                debug!(connection = %caller.connection, "Ignoring unexpected frame");
            }
            Err(Error::Decode(e)) => {
                debug!(connection = %caller.connection, error = %e, "Skipping malformed frame");
            }
            Err(Error::ConnectionClosed) => {
                debug!(connection = %caller.connection, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(connection = %caller.connection, error = %e, "Read error");
                break;
            }
        }
    }

    // Cleanup
    hub.disconnect(&caller);
    drop(tx);
    writer_handle.abort();
}

/// Read the opening frame.
///
/// Returns `Ok(None)` when the connection was answered and should close.
async fn handshake(
    reader: &mut ReadHalf<TcpStream>,
    writer: &mut WriteHalf<TcpStream>,
    hub: &Hub,
    tx: mpsc::Sender<ServerFrame>,
) -> Result<Option<Caller>> {
    match read_frame::<ClientFrame, _>(reader).await? {
        ClientFrame::Bootstrap { kind } => {
            let reply = match hub.bootstrap(kind) {
                Some(grant) => ServerFrame::SessionGranted { grant },
                None => ServerFrame::Rejected {
                    reason: format!("{} sessions cannot be bootstrapped", kind),
                },
            };
            write_frame(writer, &reply).await?;
            Ok(None)
        }
        ClientFrame::Connect { kind, credential } => {
            let connection = ConnectionId::new();
            if let Some(caller) = hub.connect(kind, connection, &credential, tx) {
                return Ok(Some(caller));
            }

            let reply = match kind {
                ConnectionKind::Presenter => ServerFrame::Rejected {
                    reason: "Unknown identity".into(),
                },
                ConnectionKind::Screen | ConnectionKind::Spectator => ServerFrame::SessionRequired,
            };
            info!(kind = %kind, "Connection rejected");
            write_frame(writer, &reply).await?;
            Ok(None)
        }
        _ => Err(Error::Protocol("Expected Bootstrap or Connect".into())),
    }
}

/// Writer task - sends frames to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<ServerFrame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Periodic sweep in addition to the sweep on every connect
async fn reaper_task(
    hub: Arc<Hub>,
    interval: std::time::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                hub.reaper().sweep();
            }
            _ = shutdown_rx.recv() => {
                debug!("Reaper task shutting down");
                break;
            }
        }
    }
}
