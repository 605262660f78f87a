//! TCP front end: one JSON message per line in each direction.
//!
//! ```text
//! client ──JOIN/EDIT──▶ connection task ──▶ Coordinator
//!        ◀─WELCOME/ACK/DELTA/REJECT/KICK── session outbox
//! ```

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ConnectionId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Bind a listener on the configured address.
pub async fn bind(coordinator: &Coordinator) -> Result<TcpListener> {
    let listener = TcpListener::bind(&coordinator.config().bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    Ok(listener)
}

/// Accept connections forever, one task per connection.
pub async fn serve(coordinator: Arc<Coordinator>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!(%addr, "accepted connection");

        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(coordinator, stream, addr).await {
                error!(%addr, error = %err, "connection error");
            }
        });
    }
}

async fn handle_connection(
    coordinator: Arc<Coordinator>,
    stream: TcpStream,
    addr: SocketAddr,
) -> Result<()> {
    let (connection, outbox) = coordinator.connect();
    let result = run_connection(&coordinator, connection, outbox, stream, addr).await;
    coordinator.disconnect(connection);
    result
}

async fn run_connection(
    coordinator: &Coordinator,
    connection: ConnectionId,
    mut outbox: mpsc::UnboundedReceiver<ServerMessage>,
    stream: TcpStream,
    addr: SocketAddr,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(%addr, %connection, "peer closed connection");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&line) {
                    Ok(message) => coordinator.handle_message(connection, message).await,
                    Err(err) => warn!(%addr, %connection, error = %err, "unreadable message"),
                }
            }
            message = outbox.recv() => {
                // The registry dropped the session (kick, reject or removal)
                // and every queued message has been written.
                let Some(message) = message else {
                    debug!(%addr, %connection, "session ended by server");
                    writer.shutdown().await?;
                    return Ok(());
                };
                let mut encoded = serde_json::to_vec(&message)?;
                encoded.push(b'\n');
                writer.write_all(&encoded).await?;
            }
        }
    }
}
