//! Scrawl Core Library
//!
//! Client-side document synchronization against a server of record.
//! Each document channel keeps its own version counter and pending-edit
//! queue; local edits are optimistic full-content snapshots that are
//! rebased and replayed when another writer wins a version race.
//!
//! # Architecture
//!
//! - **Wire messages**: JSON tagged unions over a WebSocket
//! - **Sync state**: pure protocol transitions, one state per channel
//! - **Session task**: owns the transport, debounces edits, reconnects
//!   with bounded backoff
//! - **Session registry**: explicit owner of all live sessions
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut manager = SessionManager::new(&config)?;
//! let mut session = manager.open(DocumentChannel::new("doc-1", Channel::Content))?;
//!
//! session.submit("Hello, world").await?;
//! while let Some(event) = session.event_rx.recv().await {
//!     // apply ContentApplied events to the editor
//! }
//! ```
//!
//! # Modules
//!
//! - `sync`: the synchronization protocol (main entry point)
//! - `config`: application configuration

pub mod config;
pub mod sync;

pub use config::Config;
pub use sync::{
    Channel, ClientMessage, DocumentChannel, ServerMessage, SessionConfig, SessionError,
    SessionHandle, SessionManager, SyncEvent, SyncState, SyncStatus,
};
