//! Per-channel sync state and protocol transitions
//!
//! The dispatcher is written as pure methods on [`SyncState`] that return
//! an [`Effects`] value describing what the caller must do (retransmit
//! edits, hand authoritative content to the editor). Keeping IO out of
//! the transitions makes the whole protocol table unit-testable.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::message::{Channel, ClientMessage, ServerMessage};

/// A pending edit older than this is logged when a resend cycle touches it.
const STALE_PENDING_WARN_MS: i64 = 30_000;

/// Identifies a synchronization target.
///
/// One independent [`SyncState`] exists per channel per document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentChannel {
    pub document_id: String,
    pub channel: Channel,
}

impl DocumentChannel {
    pub fn new(document_id: impl Into<String>, channel: Channel) -> Self {
        Self {
            document_id: document_id.into(),
            channel,
        }
    }
}

/// Externally observable sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No unacknowledged edits, no transport fault
    Synced,
    /// Unacknowledged edits outstanding
    Syncing,
    /// Transport fault active or reconnects exhausted
    Error,
}

/// An edit sent to the server but not yet acknowledged or rejected.
///
/// Carries the full content snapshot, not a diff; a resend after a
/// rejection re-stamps `base_version` and transmits the snapshot as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    /// Matches server acks/rejects to this edit
    pub seq: u64,
    /// Full document content at submission time
    pub content: String,
    /// Version believed current when the edit was created
    pub base_version: u64,
    /// Wall-clock submission time in milliseconds, informational only
    pub timestamp_ms: i64,
    /// Channel the edit belongs to
    pub channel: Channel,
}

/// Effects produced by applying a server message to a [`SyncState`].
#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    /// Edit messages to retransmit, in queue order
    pub resend: Vec<ClientMessage>,
    /// Authoritative content to hand to the content callback
    pub apply: Option<String>,
    /// Server-reported error to surface
    pub fault: Option<String>,
}

impl Effects {
    fn none() -> Self {
        Self::default()
    }
}

/// Mutable sync state for one document channel.
///
/// Owned exclusively by one session task; created when the session starts
/// and dropped when it ends.
#[derive(Debug)]
pub struct SyncState {
    target: DocumentChannel,
    /// Last version acknowledged as applied by the server.
    /// Never decreases for the lifetime of the state.
    version: u64,
    /// Unacknowledged edits, FIFO by sequence number
    pending: VecDeque<PendingEdit>,
    /// Strictly increasing; never reused, even across reconnects
    next_seq: u64,
    /// Transport fault flag, owned by the connection manager
    transport_fault: bool,
}

impl SyncState {
    /// Create a fresh state for a document channel
    pub fn new(target: DocumentChannel) -> Self {
        Self {
            target,
            version: 0,
            pending: VecDeque::new(),
            next_seq: 1,
            transport_fault: false,
        }
    }

    /// The document channel this state synchronizes
    pub fn target(&self) -> &DocumentChannel {
        &self.target
    }

    /// Last server-acknowledged version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of unacknowledged edits
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Project the external status from internal state
    pub fn status(&self) -> SyncStatus {
        if self.transport_fault {
            SyncStatus::Error
        } else if self.pending.is_empty() {
            SyncStatus::Synced
        } else {
            SyncStatus::Syncing
        }
    }

    /// Record a transport-level fault (connection error, exhausted retries)
    pub fn set_transport_fault(&mut self) {
        self.transport_fault = true;
    }

    /// Clear the fault flag after a successful reconnect
    pub fn clear_transport_fault(&mut self) {
        self.transport_fault = false;
    }

    /// Allocate a sequence number, enqueue a pending edit for `content`,
    /// and return the edit message to transmit.
    pub fn enqueue_edit(&mut self, content: String) -> ClientMessage {
        let seq = self.next_seq;
        self.next_seq += 1;

        let edit = PendingEdit {
            seq,
            content,
            base_version: self.version,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            channel: self.target.channel,
        };
        let msg = self.edit_message(&edit);
        self.pending.push_back(edit);
        msg
    }

    /// Apply a server message, returning the effects the caller must run.
    ///
    /// Messages for other documents or other channels are ignored whole;
    /// they belong to a different state multiplexed over the same
    /// transport.
    pub fn handle(&mut self, msg: &ServerMessage) -> Effects {
        match msg {
            ServerMessage::SyncResponse {
                document_id,
                version,
                content,
            } => {
                if *document_id != self.target.document_id {
                    return self.ignore_foreign(document_id);
                }
                self.handle_sync_response(*version, content)
            }
            ServerMessage::Ack {
                document_id,
                seq,
                new_version,
            } => {
                if *document_id != self.target.document_id {
                    return self.ignore_foreign(document_id);
                }
                self.handle_ack(*seq, *new_version)
            }
            ServerMessage::Reject {
                document_id,
                reason,
                current_version,
            } => {
                if *document_id != self.target.document_id {
                    return self.ignore_foreign(document_id);
                }
                self.handle_reject(reason, *current_version)
            }
            ServerMessage::Update {
                document_id,
                version,
                content,
                channel,
            } => {
                if *document_id != self.target.document_id {
                    return self.ignore_foreign(document_id);
                }
                if let Some(ch) = channel {
                    if *ch != self.target.channel {
                        debug!(
                            channel = %ch,
                            "Ignoring update for a different channel"
                        );
                        return Effects::none();
                    }
                }
                self.handle_update(*version, content)
            }
            ServerMessage::Error { message } => {
                self.transport_fault = true;
                Effects {
                    fault: Some(message.clone()),
                    ..Effects::default()
                }
            }
        }
    }

    /// Authoritative version and content arrived (connect or reconnect).
    ///
    /// Pending edits take precedence over the server's content: if any
    /// are outstanding they are re-based onto the new version and resent,
    /// and the server content is not applied locally.
    fn handle_sync_response(&mut self, version: u64, content: &str) -> Effects {
        self.advance_version(version);

        if self.pending.is_empty() {
            Effects {
                apply: Some(content.to_string()),
                ..Effects::default()
            }
        } else {
            Effects {
                resend: self.restamp_pending(),
                ..Effects::default()
            }
        }
    }

    /// One of our edits was applied. Removes exactly the matching edit;
    /// earlier and later entries keep their base versions.
    fn handle_ack(&mut self, seq: u64, new_version: u64) -> Effects {
        let before = self.pending.len();
        self.pending.retain(|edit| edit.seq != seq);
        if self.pending.len() == before {
            debug!(seq, "Ack for unknown sequence number, ignoring");
            return Effects::none();
        }

        self.advance_version(new_version);
        Effects::none()
    }

    /// Another writer advanced the version past our base. Every remaining
    /// pending edit is re-based onto the server's current version and
    /// resent in original order; the last full snapshot wins server-side.
    fn handle_reject(&mut self, reason: &str, current_version: u64) -> Effects {
        warn!(
            reason,
            current_version,
            pending = self.pending.len(),
            "Edit rejected, rebasing pending edits"
        );
        self.advance_version(current_version);

        Effects {
            resend: self.restamp_pending(),
            ..Effects::default()
        }
    }

    /// Broadcast of another writer's change.
    fn handle_update(&mut self, version: u64, content: &str) -> Effects {
        if version <= self.version {
            debug!(
                version,
                current = self.version,
                "Discarding stale update"
            );
            return Effects::none();
        }

        if self.pending.is_empty() {
            self.advance_version(version);
        } else {
            // Local edits are still outstanding against the old base;
            // show the remote content but leave the version where the
            // pending edits expect it.
            debug!(
                version,
                pending = self.pending.len(),
                "Applying remote content without advancing version"
            );
        }

        Effects {
            apply: Some(content.to_string()),
            ..Effects::default()
        }
    }

    /// Re-stamp every pending edit's base version to the current version
    /// and return edit messages in queue order.
    fn restamp_pending(&mut self) -> Vec<ClientMessage> {
        let now = chrono::Utc::now().timestamp_millis();
        let version = self.version;
        let mut resend = Vec::with_capacity(self.pending.len());

        for edit in &mut self.pending {
            if now - edit.timestamp_ms > STALE_PENDING_WARN_MS {
                warn!(
                    seq = edit.seq,
                    age_ms = now - edit.timestamp_ms,
                    "Pending edit has not been acknowledged for a long time"
                );
            }
            edit.base_version = version;
        }
        for edit in &self.pending {
            resend.push(ClientMessage::Edit {
                document_id: self.target.document_id.clone(),
                content: edit.content.clone(),
                base_version: edit.base_version,
                seq: edit.seq,
                channel: edit.channel,
            });
        }
        resend
    }

    fn edit_message(&self, edit: &PendingEdit) -> ClientMessage {
        ClientMessage::Edit {
            document_id: self.target.document_id.clone(),
            content: edit.content.clone(),
            base_version: edit.base_version,
            seq: edit.seq,
            channel: edit.channel,
        }
    }

    /// Versions never move backwards, even if a stale message says so.
    fn advance_version(&mut self, version: u64) {
        if version < self.version {
            debug!(
                version,
                current = self.version,
                "Refusing to move version backwards"
            );
            return;
        }
        self.version = version;
    }

    fn ignore_foreign(&self, document_id: &str) -> Effects {
        debug!(
            document_id,
            own = %self.target.document_id,
            "Ignoring message for a different document"
        );
        Effects::none()
    }

    #[cfg(test)]
    pub(crate) fn pending_edits(&self) -> impl Iterator<Item = &PendingEdit> {
        self.pending.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SyncState {
        SyncState::new(DocumentChannel::new("doc-1", Channel::Content))
    }

    fn seq_of(msg: &ClientMessage) -> (u64, u64) {
        match msg {
            ClientMessage::Edit {
                seq, base_version, ..
            } => (*seq, *base_version),
            other => panic!("Expected Edit, got {:?}", other),
        }
    }

    #[test]
    fn test_fresh_state_is_synced() {
        let state = state();
        assert_eq!(state.version(), 0);
        assert_eq!(state.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_enqueue_edit_assigns_increasing_seqs() {
        let mut state = state();
        let (s1, _) = seq_of(&state.enqueue_edit("a".into()));
        let (s2, _) = seq_of(&state.enqueue_edit("ab".into()));

        assert!(s2 > s1);
        assert_eq!(state.pending_count(), 2);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_sync_response_without_pending_applies_content() {
        let mut state = state();
        let effects = state.handle(&ServerMessage::SyncResponse {
            document_id: "doc-1".into(),
            version: 3,
            content: "hello".into(),
        });

        assert_eq!(effects.apply.as_deref(), Some("hello"));
        assert!(effects.resend.is_empty());
        assert_eq!(state.version(), 3);
        assert_eq!(state.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_sync_response_with_pending_resends_instead_of_applying() {
        // Reconnect mid-edit: pending edits take precedence over the
        // server's content.
        let mut state = state();
        state.enqueue_edit("local".into());

        let effects = state.handle(&ServerMessage::SyncResponse {
            document_id: "doc-1".into(),
            version: 9,
            content: "X".into(),
        });

        assert!(effects.apply.is_none());
        assert_eq!(effects.resend.len(), 1);
        let (_, base) = seq_of(&effects.resend[0]);
        assert_eq!(base, 9);
        assert_eq!(state.version(), 9);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_ack_removes_exactly_one_edit() {
        let mut state = state();
        let (s1, _) = seq_of(&state.enqueue_edit("a".into()));
        let (s2, _) = seq_of(&state.enqueue_edit("ab".into()));
        let (s3, _) = seq_of(&state.enqueue_edit("abc".into()));

        let effects = state.handle(&ServerMessage::Ack {
            document_id: "doc-1".into(),
            seq: s2,
            new_version: 4,
        });

        assert_eq!(effects, Effects::default());
        assert_eq!(state.pending_count(), 2);
        let remaining: Vec<_> = state.pending_edits().collect();
        assert_eq!(remaining[0].seq, s1);
        assert_eq!(remaining[1].seq, s3);
        // Untouched neighbours keep their original base version
        assert_eq!(remaining[0].base_version, 0);
        assert_eq!(remaining[1].base_version, 0);
        assert_eq!(state.version(), 4);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_last_ack_returns_to_synced() {
        let mut state = state();
        let (s1, _) = seq_of(&state.enqueue_edit("a".into()));

        state.handle(&ServerMessage::Ack {
            document_id: "doc-1".into(),
            seq: s1,
            new_version: 1,
        });

        assert_eq!(state.pending_count(), 0);
        assert_eq!(state.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_reject_restamps_and_resends_in_fifo_order() {
        let mut state = state();
        let (s1, _) = seq_of(&state.enqueue_edit("a".into()));
        let (s2, _) = seq_of(&state.enqueue_edit("ab".into()));

        let effects = state.handle(&ServerMessage::Reject {
            document_id: "doc-1".into(),
            reason: "stale base version".into(),
            current_version: 7,
        });

        assert_eq!(effects.resend.len(), 2);
        assert_eq!(seq_of(&effects.resend[0]), (s1, 7));
        assert_eq!(seq_of(&effects.resend[1]), (s2, 7));
        assert_eq!(state.version(), 7);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_concurrent_writer_scenario() {
        // At version 5 with one pending edit based on 5; another writer
        // pushed the server to 7.
        let mut state = state();
        state.handle(&ServerMessage::SyncResponse {
            document_id: "doc-1".into(),
            version: 5,
            content: "base".into(),
        });
        let (s1, base) = seq_of(&state.enqueue_edit("mine".into()));
        assert_eq!(base, 5);

        let effects = state.handle(&ServerMessage::Reject {
            document_id: "doc-1".into(),
            reason: "stale base version".into(),
            current_version: 7,
        });

        assert_eq!(seq_of(&effects.resend[0]), (s1, 7));
        assert_eq!(state.version(), 7);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_update_with_pending_applies_but_holds_version() {
        let mut state = state();
        state.enqueue_edit("local".into());

        let effects = state.handle(&ServerMessage::Update {
            document_id: "doc-1".into(),
            version: 2,
            content: "remote".into(),
            channel: Some(Channel::Content),
        });

        assert_eq!(effects.apply.as_deref(), Some("remote"));
        assert_eq!(state.version(), 0);
        assert_eq!(state.status(), SyncStatus::Syncing);
    }

    #[test]
    fn test_update_without_pending_advances_version() {
        let mut state = state();

        let effects = state.handle(&ServerMessage::Update {
            document_id: "doc-1".into(),
            version: 2,
            content: "remote".into(),
            channel: None,
        });

        assert_eq!(effects.apply.as_deref(), Some("remote"));
        assert_eq!(state.version(), 2);
        assert_eq!(state.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_stale_update_is_discarded() {
        let mut state = state();
        state.handle(&ServerMessage::SyncResponse {
            document_id: "doc-1".into(),
            version: 5,
            content: "v5".into(),
        });

        let effects = state.handle(&ServerMessage::Update {
            document_id: "doc-1".into(),
            version: 5,
            content: "old".into(),
            channel: None,
        });

        assert!(effects.apply.is_none());
        assert_eq!(state.version(), 5);
    }

    #[test]
    fn test_cross_channel_isolation() {
        let mut state = SyncState::new(DocumentChannel::new("doc-1", Channel::Summary));
        state.enqueue_edit("summary text".into());
        let version_before = state.version();

        let effects = state.handle(&ServerMessage::Update {
            document_id: "doc-1".into(),
            version: 10,
            content: "body text".into(),
            channel: Some(Channel::Content),
        });

        assert_eq!(effects, Effects::default());
        assert_eq!(state.version(), version_before);
        assert_eq!(state.pending_count(), 1);
    }

    #[test]
    fn test_foreign_document_is_ignored() {
        let mut state = state();
        let effects = state.handle(&ServerMessage::Ack {
            document_id: "doc-2".into(),
            seq: 1,
            new_version: 99,
        });

        assert_eq!(effects, Effects::default());
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_version_is_monotonic() {
        let mut state = state();
        state.handle(&ServerMessage::SyncResponse {
            document_id: "doc-1".into(),
            version: 8,
            content: "v8".into(),
        });

        // A stale ack carrying a lower version must not move it back
        let (s1, _) = seq_of(&state.enqueue_edit("x".into()));
        state.handle(&ServerMessage::Ack {
            document_id: "doc-1".into(),
            seq: s1,
            new_version: 3,
        });
        assert_eq!(state.version(), 8);

        state.handle(&ServerMessage::Reject {
            document_id: "doc-1".into(),
            reason: "stale".into(),
            current_version: 2,
        });
        assert_eq!(state.version(), 8);
    }

    #[test]
    fn test_seqs_are_never_reused_after_ack() {
        let mut state = state();
        let (s1, _) = seq_of(&state.enqueue_edit("a".into()));
        state.handle(&ServerMessage::Ack {
            document_id: "doc-1".into(),
            seq: s1,
            new_version: 1,
        });

        let (s2, _) = seq_of(&state.enqueue_edit("b".into()));
        assert!(s2 > s1);
    }

    #[test]
    fn test_server_error_marks_fault() {
        let mut state = state();
        let effects = state.handle(&ServerMessage::Error {
            message: "internal".into(),
        });

        assert_eq!(effects.fault.as_deref(), Some("internal"));
        assert_eq!(state.status(), SyncStatus::Error);

        state.clear_transport_fault();
        assert_eq!(state.status(), SyncStatus::Synced);
    }
}
