//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use scrawl_core::SyncStatus;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print an informational message (suppressed in quiet/JSON modes)
    pub fn message(&self, msg: &str) {
        if matches!(self.format, OutputFormat::Human) {
            println!("{}", msg);
        }
    }

    /// Print a success message
    pub fn success(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "ok": true, "message": msg }));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a sync status change
    pub fn print_status(&self, status: SyncStatus) {
        match self.format {
            OutputFormat::Human => println!("[{}]", status_label(status)),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({ "event": "status", "status": status_label(status) })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print authoritative content received from the server
    pub fn print_content(&self, content: &str) {
        match self.format {
            OutputFormat::Human => {
                println!("── {} ──", chrono::Local::now().format("%H:%M:%S"));
                println!("{}", content);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({ "event": "content", "content": content })
                );
            }
            OutputFormat::Quiet => println!("{}", content),
        }
    }
}

/// Stable lowercase label for a sync status
pub fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "synced",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Error => "error",
    }
}
