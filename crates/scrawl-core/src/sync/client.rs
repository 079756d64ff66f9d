//! Persistent sync session
//!
//! Maintains a long-lived WebSocket connection for one document channel.
//! Local edits are debounced, stamped with a sequence number and base
//! version, and queued until the server acknowledges them. Dropped
//! connections are re-established with exponential backoff, up to a
//! bounded number of attempts.

use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::message::{ClientMessage, ServerMessage};
use super::state::{DocumentChannel, SyncState, SyncStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands sent to the session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Submit the full local content after a change
    Submit(String),
    /// Shut down the session
    Shutdown,
}

/// Events emitted by the session task
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// External status changed
    StatusChanged(SyncStatus),
    /// Authoritative content must replace local content
    ContentApplied(String),
    /// Transport-level fault (connection drop, server error message)
    TransportError(String),
    /// All reconnect attempts failed; the session stops retrying
    RetriesExhausted,
}

/// Configuration for a sync session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket URL of the sync server
    pub url: String,
    /// Document channel to synchronize
    pub target: DocumentChannel,
    /// Suspension window for coalescing local edits
    pub debounce: Duration,
    /// Delay before the first reconnect attempt
    pub initial_reconnect_delay: Duration,
    /// Backoff cap
    pub max_reconnect_delay: Duration,
    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>, target: DocumentChannel) -> Self {
        Self {
            url: url.into(),
            target,
            debounce: Duration::from_millis(2000),
            initial_reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 5,
        }
    }
}

/// Handle to control and observe a running session
pub struct SessionHandle {
    /// Send commands to the session task
    pub command_tx: mpsc::Sender<SessionCommand>,
    /// Receive events from the session task
    pub event_rx: mpsc::Receiver<SyncEvent>,
    /// Watch the external status
    pub status_rx: watch::Receiver<SyncStatus>,
}

impl SessionHandle {
    /// Feed a local content change into the submission pipeline
    pub async fn submit(&self, content: impl Into<String>) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Submit(content.into()))
            .await
            .map_err(|_| anyhow!("Sync session has terminated"))
    }

    /// Tear the session down, closing the transport and cancelling timers
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
    }

    /// Current external status
    pub fn status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }
}

/// A local edit waiting out its debounce window.
///
/// Only the most recent submission survives; restarting the window
/// replaces the content outright.
#[derive(Debug)]
struct DebouncedEdit {
    content: String,
    deadline: Instant,
}

/// Spawn a sync session task
///
/// Returns a handle to control and monitor the session. The task owns
/// the transport exclusively and reconnects automatically until the
/// reconnect limit is reached.
pub fn spawn_session(config: SessionConfig) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(SyncStatus::Synced);

    tokio::spawn(session_loop(config, command_rx, event_tx, status_tx));

    SessionHandle {
        command_tx,
        event_rx,
        status_rx,
    }
}

/// Main session loop with bounded reconnection
async fn session_loop(
    config: SessionConfig,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::Sender<SyncEvent>,
    status_tx: watch::Sender<SyncStatus>,
) {
    let client_id = format!("scrawl-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let mut state = SyncState::new(config.target.clone());
    let mut debounce: Option<DebouncedEdit> = None;
    let mut attempts: u32 = 0;

    loop {
        match connect_async(&config.url).await {
            Ok((ws_stream, _)) => {
                info!(%client_id, url = %config.url, "Connected to sync server");
                attempts = 0;
                state.clear_transport_fault();

                match run_connection(
                    &config,
                    &mut state,
                    ws_stream,
                    &mut debounce,
                    &mut command_rx,
                    &event_tx,
                    &status_tx,
                )
                .await
                {
                    Ok(true) => {
                        debug!(%client_id, "Session shut down");
                        return;
                    }
                    Ok(false) => {
                        debug!(%client_id, "Connection closed, will reconnect");
                    }
                    Err(e) => {
                        warn!(%client_id, "Connection error: {}", e);
                        state.set_transport_fault();
                        let _ = event_tx.send(SyncEvent::TransportError(e.to_string())).await;
                    }
                }
            }
            Err(e) => {
                warn!(%client_id, url = %config.url, "Connect failed: {}", e);
                state.set_transport_fault();
                let _ = event_tx.send(SyncEvent::TransportError(e.to_string())).await;
            }
        }

        publish_status(&state, debounce.is_some(), &status_tx, &event_tx).await;

        if attempts >= config.max_reconnect_attempts {
            warn!(
                %client_id,
                attempts, "Giving up on reconnecting to sync server"
            );
            state.set_transport_fault();
            let _ = event_tx.send(SyncEvent::RetriesExhausted).await;
            publish_status(&state, debounce.is_some(), &status_tx, &event_tx).await;

            // Terminal: stay alive so teardown still works, but drop
            // every further submission.
            while let Some(cmd) = command_rx.recv().await {
                match cmd {
                    SessionCommand::Shutdown => return,
                    SessionCommand::Submit(_) => {
                        warn!(%client_id, "Dropping edit: sync session is offline");
                    }
                }
            }
            return;
        }

        let delay = backoff_delay(&config, attempts);
        attempts += 1;
        debug!(%client_id, attempt = attempts, ?delay, "Scheduling reconnect");

        // Wait out the backoff, still servicing commands and the
        // debounce timer so teardown is immediate and a mid-backoff
        // submission is either dropped with a warning (window elapsed)
        // or carried into the next connection.
        let deadline = Instant::now() + delay;
        loop {
            let debounce_deadline = debounce.as_ref().map(|d| d.deadline);
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = tokio::time::sleep_until(debounce_deadline.unwrap_or(deadline)),
                        if debounce_deadline.is_some() => {
                    warn!(%client_id, "No live transport, dropping edit");
                    debounce = None;
                    publish_status(&state, false, &status_tx, &event_tx).await;
                }
                cmd = command_rx.recv() => match cmd {
                    Some(SessionCommand::Submit(content)) => {
                        debounce = Some(DebouncedEdit {
                            content,
                            deadline: Instant::now() + config.debounce,
                        });
                        publish_status(&state, true, &status_tx, &event_tx).await;
                    }
                    Some(SessionCommand::Shutdown) | None => return,
                }
            }
        }
    }
}

/// Run one connection until it closes or the session shuts down.
///
/// Returns `Ok(true)` on shutdown, `Ok(false)` when the connection
/// closed and a reconnect should be scheduled.
async fn run_connection(
    config: &SessionConfig,
    state: &mut SyncState,
    ws_stream: WsStream,
    debounce: &mut Option<DebouncedEdit>,
    command_rx: &mut mpsc::Receiver<SessionCommand>,
    event_tx: &mpsc::Sender<SyncEvent>,
    status_tx: &watch::Sender<SyncStatus>,
) -> Result<bool> {
    let (mut write, mut read) = ws_stream.split();
    let target = state.target().clone();

    // Declare interest and ask for the authoritative state. If edits are
    // still pending from before the reconnect, the sync_response handler
    // rebases and resends them.
    send(&mut write, ClientMessage::join(&target.document_id, target.channel)).await?;
    send(
        &mut write,
        ClientMessage::sync_request(&target.document_id, target.channel),
    )
    .await?;

    publish_status(state, debounce.is_some(), status_tx, event_tx).await;

    loop {
        let debounce_deadline = debounce.as_ref().map(|d| d.deadline);
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(SessionCommand::Submit(content)) => {
                    // Restart the window; only the newest content survives
                    *debounce = Some(DebouncedEdit {
                        content,
                        deadline: Instant::now() + config.debounce,
                    });
                    publish_status(state, true, status_tx, event_tx).await;
                }
                Some(SessionCommand::Shutdown) | None => {
                    write.close().await.ok();
                    return Ok(true);
                }
            },

            _ = tokio::time::sleep_until(debounce_deadline.unwrap_or_else(Instant::now)),
                    if debounce_deadline.is_some() => {
                let edit = debounce.take().expect("debounce timer fired without content");
                let msg = state.enqueue_edit(edit.content);
                send(&mut write, msg).await?;
                publish_status(state, false, status_tx, event_tx).await;
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match ServerMessage::decode(&text) {
                        Ok(server_msg) => {
                            let effects = state.handle(&server_msg);
                            for resend in effects.resend {
                                send(&mut write, resend).await?;
                            }
                            if let Some(content) = effects.apply {
                                let _ = event_tx.send(SyncEvent::ContentApplied(content)).await;
                            }
                            if let Some(message) = effects.fault {
                                warn!("Server error: {}", message);
                                let _ = event_tx.send(SyncEvent::TransportError(message)).await;
                            }
                            publish_status(state, debounce.is_some(), status_tx, event_tx).await;
                        }
                        Err(e) => {
                            warn!("Dropping undecodable server message: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Ok(false);
                }
                Some(Err(e)) => {
                    return Err(e.into());
                }
                Some(Ok(_)) => {
                    // Binary/ping/pong frames are not part of the protocol
                }
            }
        }
    }
}

async fn send(
    write: &mut SplitSink<WsStream, Message>,
    msg: ClientMessage,
) -> Result<()> {
    write.send(Message::Text(msg.encode())).await?;
    Ok(())
}

/// Recompute the projection and publish it if it changed.
///
/// An armed debounce timer counts as syncing: the user has typed, even
/// though nothing is on the wire yet.
async fn publish_status(
    state: &SyncState,
    debounce_armed: bool,
    status_tx: &watch::Sender<SyncStatus>,
    event_tx: &mpsc::Sender<SyncEvent>,
) {
    let status = match state.status() {
        SyncStatus::Synced if debounce_armed => SyncStatus::Syncing,
        s => s,
    };

    if *status_tx.borrow() != status {
        let _ = status_tx.send(status);
        let _ = event_tx.send(SyncEvent::StatusChanged(status)).await;
    }
}

fn backoff_delay(config: &SessionConfig, attempts: u32) -> Duration {
    // Saturate to the cap rather than overflowing on extreme configs
    config
        .initial_reconnect_delay
        .checked_mul(2u32.saturating_pow(attempts.min(16)))
        .unwrap_or(config.max_reconnect_delay)
        .min(config.max_reconnect_delay)
}

// Late acks cannot corrupt state after teardown: the session task is the
// only dispatcher, and it stops consuming the socket the moment shutdown
// is observed.
