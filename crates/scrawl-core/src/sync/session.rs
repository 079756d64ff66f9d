//! Session registry
//!
//! Owns the set of live sync sessions for a process, keyed by document
//! and channel. The registry is an explicit value with its lifecycle
//! tied to its owner; dropping it (after `shutdown`) ends every session.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::client::{spawn_session, SessionCommand, SessionConfig, SessionHandle};
use super::message::Channel;
use super::state::{DocumentChannel, SyncStatus};
use crate::config::Config;

/// Errors from session registry operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A sync session is already open for document '{document_id}' channel '{channel}'")]
    AlreadyOpen {
        document_id: String,
        channel: Channel,
    },

    #[error("Sync server URL is not configured. Set it with:\n  scrawl config set server_url ws://your-server:3030")]
    NoServerUrl,
}

struct SessionEntry {
    command_tx: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<SyncStatus>,
}

/// Registry of live sync sessions.
///
/// Each `(document, channel)` pair has at most one session, and each
/// session owns its transport exclusively.
pub struct SessionManager {
    defaults: SessionDefaults,
    sessions: HashMap<DocumentChannel, SessionEntry>,
}

/// Per-process session settings derived from [`Config`]
#[derive(Debug, Clone)]
struct SessionDefaults {
    url: String,
    debounce: std::time::Duration,
    initial_reconnect_delay: std::time::Duration,
    max_reconnect_delay: std::time::Duration,
    max_reconnect_attempts: u32,
}

impl SessionManager {
    /// Create a registry from configuration
    pub fn new(config: &Config) -> Result<Self, SessionError> {
        let url = config.server_url.clone().ok_or(SessionError::NoServerUrl)?;

        Ok(Self {
            defaults: SessionDefaults {
                url,
                debounce: std::time::Duration::from_millis(config.debounce_ms),
                initial_reconnect_delay: std::time::Duration::from_millis(
                    config.initial_reconnect_delay_ms,
                ),
                max_reconnect_delay: std::time::Duration::from_millis(
                    config.max_reconnect_delay_ms,
                ),
                max_reconnect_attempts: config.max_reconnect_attempts,
            },
            sessions: HashMap::new(),
        })
    }

    /// Open a session for a document channel
    ///
    /// Returns the handle for submitting edits and consuming events. The
    /// registry keeps enough of the session to close it later.
    pub fn open(&mut self, target: DocumentChannel) -> Result<SessionHandle, SessionError> {
        if self.sessions.contains_key(&target) {
            return Err(SessionError::AlreadyOpen {
                document_id: target.document_id.clone(),
                channel: target.channel,
            });
        }

        let mut config = SessionConfig::new(&self.defaults.url, target.clone());
        config.debounce = self.defaults.debounce;
        config.initial_reconnect_delay = self.defaults.initial_reconnect_delay;
        config.max_reconnect_delay = self.defaults.max_reconnect_delay;
        config.max_reconnect_attempts = self.defaults.max_reconnect_attempts;

        let handle = spawn_session(config);
        self.sessions.insert(
            target.clone(),
            SessionEntry {
                command_tx: handle.command_tx.clone(),
                status_rx: handle.status_rx.clone(),
            },
        );
        debug!(document_id = %target.document_id, channel = %target.channel, "Opened sync session");

        Ok(handle)
    }

    /// Status of one session, if it is open
    pub fn status(&self, target: &DocumentChannel) -> Option<SyncStatus> {
        self.sessions.get(target).map(|entry| *entry.status_rx.borrow())
    }

    /// Close one session; returns whether it was open
    pub async fn close(&mut self, target: &DocumentChannel) -> bool {
        match self.sessions.remove(target) {
            Some(entry) => {
                let _ = entry.command_tx.send(SessionCommand::Shutdown).await;
                debug!(document_id = %target.document_id, channel = %target.channel, "Closed sync session");
                true
            }
            None => false,
        }
    }

    /// Close every session
    pub async fn shutdown(&mut self) {
        for (target, entry) in self.sessions.drain() {
            let _ = entry.command_tx.send(SessionCommand::Shutdown).await;
            debug!(document_id = %target.document_id, channel = %target.channel, "Closed sync session");
        }
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
