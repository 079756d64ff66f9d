//! Watch command handler
//!
//! Attaches to a document channel, prints authoritative content as it
//! arrives, and feeds lines read from stdin in as local edits.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use scrawl_core::sync::{DocumentChannel, SessionManager, SyncEvent};
use scrawl_core::Config;

use crate::output::{status_label, Output};

/// Run an interactive sync session until EOF on stdin or Ctrl-C
pub async fn watch(config: &Config, target: DocumentChannel, output: &Output) -> Result<()> {
    let mut manager = SessionManager::new(config)?;
    let mut session = manager
        .open(target.clone())
        .context("Failed to open sync session")?;

    output.message(&format!(
        "Watching document '{}' channel '{}'. Type to edit, Ctrl-C to quit.",
        target.document_id, target.channel
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(content) => {
                    session.submit(content).await?;
                }
                None => break, // stdin closed
            },

            event = session.event_rx.recv() => match event {
                Some(SyncEvent::ContentApplied(content)) => {
                    output.print_content(&content);
                }
                Some(SyncEvent::StatusChanged(status)) => {
                    output.print_status(status);
                }
                Some(SyncEvent::TransportError(message)) => {
                    // Transient; the session reconnects on its own
                    warn!("Transport error: {}", message);
                }
                Some(SyncEvent::RetriesExhausted) => {
                    warn!("Gave up reconnecting to the sync server");
                    if !output.is_quiet() {
                        eprintln!("⚠ Gave up reconnecting; edits are no longer synced");
                    }
                }
                None => break, // session terminated
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let final_status = session.status();
    manager.shutdown().await;
    output.message(&format!("Session closed ({})", status_label(final_status)));

    Ok(())
}
