//! Operator-facing progress stream.
//!
//! # Separation of Concerns
//!
//! - **Progress (this module)**: the status line, timestamped log lines and
//!   live row display that an operator watches during a run. Always emitted,
//!   unaffected by `RUST_LOG`.
//!
//! - **Tracing (`logging`)**: developer diagnostics on stderr.

use std::io::Write;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Short, replaceable status line.
    Status(String),
    /// Append-only activity log entry.
    Log {
        at: DateTime<Local>,
        level: LogLevel,
        message: String,
    },
    /// Live display values for the row about to be processed (1-based index).
    Row {
        operation: String,
        amount: String,
        index: usize,
        total: usize,
    },
}

/// Receives progress events; rendering is up to the implementor.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

/// Writes progress to stdout and mirrors log lines into `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: ProgressEvent) {
        let line = render(&event);
        match &event {
            ProgressEvent::Log { level, message, .. } => match level {
                LogLevel::Info => info!(target: "sical_rpa::progress", "{message}"),
                LogLevel::Warn => warn!(target: "sical_rpa::progress", "{message}"),
                LogLevel::Error => error!(target: "sical_rpa::progress", "{message}"),
            },
            ProgressEvent::Status(_) | ProgressEvent::Row { .. } => {}
        }
        let mut stdout = std::io::stdout().lock();
        // A closed stdout must not take the run down with it.
        let _ = writeln!(stdout, "{line}");
    }
}

/// Single-line rendering used by the console sink.
pub fn render(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Status(status) => format!("status: {status}"),
        ProgressEvent::Log { at, level, message } => {
            let tag = match level {
                LogLevel::Info => "",
                LogLevel::Warn => "WARNING: ",
                LogLevel::Error => "ERROR: ",
            };
            format!("[{}] {tag}{message}", at.format("%H:%M:%S"))
        }
        ProgressEvent::Row {
            operation,
            amount,
            index,
            total,
        } => format!("row {index}/{total}: operación={operation} importe={amount}"),
    }
}
