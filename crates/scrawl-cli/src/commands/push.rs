//! Push command handler
//!
//! One-shot edit: submit content to a document channel and wait for the
//! server to acknowledge it.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use scrawl_core::sync::{DocumentChannel, SessionManager, SyncEvent, SyncStatus};
use scrawl_core::Config;

use crate::output::Output;

/// How long to wait for the ack before giving up
const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Submit content (from the argument or stdin) and wait until it is
/// acknowledged.
pub async fn push(
    config: &Config,
    target: DocumentChannel,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    let content = match content {
        Some(c) => c,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read content from stdin")?;
            buf
        }
    };

    let mut manager = SessionManager::new(config)?;
    let mut session = manager.open(target.clone())?;

    session.submit(content).await?;

    // The session emits Syncing as soon as the edit is accepted and
    // Synced once the queue drains; transitions arrive as discrete
    // events, so none can be missed.
    let result = timeout(PUSH_TIMEOUT, async {
        loop {
            match session.event_rx.recv().await {
                Some(SyncEvent::StatusChanged(SyncStatus::Synced)) => return Ok(()),
                Some(SyncEvent::RetriesExhausted) => {
                    bail!("Sync failed; the server could not be reached")
                }
                Some(_) => {}
                None => bail!("Sync session terminated unexpectedly"),
            }
        }
    })
    .await;

    manager.shutdown().await;

    match result {
        Ok(inner) => inner?,
        Err(_) => bail!("Timed out waiting for the server to acknowledge the edit"),
    }

    output.success(&format!(
        "Pushed to document '{}' channel '{}'",
        target.document_id, target.channel
    ));
    Ok(())
}
