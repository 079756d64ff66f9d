//! Document synchronization client
//!
//! Keeps a local document channel converged with the server of record.
//!
//! ## Protocol
//!
//! 1. Connect via WebSocket, send `join` then `sync_request`
//! 2. Debounce local changes into full-snapshot `edit` messages carrying
//!    a sequence number and the base version
//! 3. The server answers with `ack` (applied) or `reject` (stale base);
//!    rejected edits are rebased onto the current version and resent in
//!    order
//! 4. `update` broadcasts from other writers are applied when no local
//!    edits are outstanding
//!
//! The server stores the last full snapshot per channel; convergence
//! relies on snapshot replay, not text merging.
//!
//! ## Usage
//!
//! ```ignore
//! let mut manager = SessionManager::new(&config)?;
//! let mut session = manager.open(DocumentChannel::new(doc_id, Channel::Content))?;
//! session.submit(new_content).await?;
//! ```

mod client;
mod message;
mod session;
mod state;

pub use client::{spawn_session, SessionCommand, SessionConfig, SessionHandle, SyncEvent};
pub use message::{Channel, ClientMessage, DecodeError, ServerMessage};
pub use session::{SessionError, SessionManager};
pub use state::{DocumentChannel, Effects, PendingEdit, SyncState, SyncStatus};
