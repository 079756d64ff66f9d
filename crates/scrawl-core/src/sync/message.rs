//! Sync protocol message types
//!
//! JSON messages exchanged with the document sync server. Every message
//! carries the document ID, and edit-bearing messages carry the channel,
//! because multiple channels may be multiplexed over one connection.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named sub-stream of a document's synchronized state.
///
/// Each channel is independently versioned; an update on one channel
/// never touches the other's version counter or pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The document body
    Content,
    /// The document summary
    Summary,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Content => write!(f, "content"),
            Channel::Summary => write!(f, "summary"),
        }
    }
}

/// Failed to decode a server message
#[derive(Error, Debug)]
#[error("Failed to decode server message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Messages sent to the sync server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Declare interest in a document channel
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "documentId")]
        document_id: String,
        channel: Channel,
    },

    /// Ask for the current authoritative version and content
    #[serde(rename = "sync_request")]
    SyncRequest {
        #[serde(rename = "documentId")]
        document_id: String,
        channel: Channel,
    },

    /// Submit a full-content edit against a base version
    #[serde(rename = "edit")]
    Edit {
        #[serde(rename = "documentId")]
        document_id: String,
        content: String,
        #[serde(rename = "baseVersion")]
        base_version: u64,
        seq: u64,
        channel: Channel,
    },
}

/// Messages received from the sync server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Authoritative version and content for a channel
    #[serde(rename = "sync_response")]
    SyncResponse {
        #[serde(rename = "documentId")]
        document_id: String,
        version: u64,
        content: String,
    },

    /// An edit of ours was applied
    #[serde(rename = "ack")]
    Ack {
        #[serde(rename = "documentId")]
        document_id: String,
        seq: u64,
        #[serde(rename = "newVersion")]
        new_version: u64,
    },

    /// An edit of ours was refused because its base version is stale
    #[serde(rename = "reject")]
    Reject {
        #[serde(rename = "documentId")]
        document_id: String,
        reason: String,
        #[serde(rename = "currentVersion")]
        current_version: u64,
    },

    /// Broadcast of another writer's change
    #[serde(rename = "update")]
    Update {
        #[serde(rename = "documentId")]
        document_id: String,
        version: u64,
        content: String,
        /// Absent on servers that predate channel multiplexing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<Channel>,
    },

    /// Error from server
    #[serde(rename = "error")]
    Error { message: String },
}

impl ClientMessage {
    /// Create a join message
    pub fn join(document_id: &str, channel: Channel) -> Self {
        ClientMessage::Join {
            document_id: document_id.to_string(),
            channel,
        }
    }

    /// Create a sync request message
    pub fn sync_request(document_id: &str, channel: Channel) -> Self {
        ClientMessage::SyncRequest {
            document_id: document_id.to_string(),
            channel,
        }
    }

    /// Create an edit message
    pub fn edit(
        document_id: &str,
        content: String,
        base_version: u64,
        seq: u64,
        channel: Channel,
    ) -> Self {
        ClientMessage::Edit {
            document_id: document_id.to_string(),
            content,
            base_version,
            seq,
            channel,
        }
    }

    /// Encode message to a JSON string
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("JSON encoding failed")
    }
}

impl ServerMessage {
    /// Decode a message from JSON text
    ///
    /// Unknown `type` values and malformed payloads are decode errors;
    /// callers log and drop them rather than guessing at intent.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}
