//! Run driver: every row, in order, until the first abort.

use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{error, info, instrument, warn};

use crate::cancel::OperatorAbort;
use crate::core::cell::normalize;
use crate::core::columns::guess_operation_column;
use crate::core::types::{AbortReason, Row, StepResult};
use crate::io::clock::Clock;
use crate::io::host::Host;
use crate::progress::ProgressEvent;
use crate::row::RowProcessor;
use crate::session::Session;

/// Rows to enter and the column that carries the amount.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Row],
    pub amount_column: &'a str,
}

/// Reason why `run_rows` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every row was processed.
    Completed,
    /// A row could not be completed (1-based row index).
    Aborted { row: usize, reason: AbortReason },
    /// The operator cancelled; `row` is `None` if no row had started yet.
    OperatorAbort { row: Option<usize>, failsafe: bool },
    /// A host capability failed unexpectedly.
    Failed { row: Option<usize>, message: String },
    /// Preflight rejected the run; nothing was sent to the host.
    Invalid { message: String },
}

/// Summary of a run invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub total_rows: usize,
    pub rows_completed: usize,
    pub stop: RunStop,
}

/// Raised when the run cannot start with the given inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub message: String,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigurationError {}

/// Check the amount column and reference images before anything happens.
pub fn preflight<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    request: &RunRequest<'_>,
) -> Result<()> {
    if request.amount_column.trim().is_empty() {
        return Err(configuration("no amount column selected"));
    }
    if !request
        .columns
        .iter()
        .any(|column| column == request.amount_column)
    {
        return Err(configuration(format!(
            "amount column '{}' does not exist in the spreadsheet",
            request.amount_column
        )));
    }
    session
        .assets
        .ensure_complete()
        .map_err(|err| configuration(err.to_string()))
}

fn configuration(message: impl Into<String>) -> anyhow::Error {
    anyhow!(ConfigurationError {
        message: message.into()
    })
}

/// Process all rows through the row processor.
///
/// Never returns an error: every failure is converted into a [`RunStop`] and
/// leaves a final status and log line behind.
#[instrument(skip_all, fields(rows = request.rows.len(), amount_column = request.amount_column))]
pub fn run_rows<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    request: &RunRequest<'_>,
) -> RunOutcome {
    let total_rows = request.rows.len();
    let mut progress = Progress::default();

    let stop = match preflight(session, request) {
        Err(err) => RunStop::Invalid {
            message: err.to_string(),
        },
        Ok(()) => match drive(session, request, &mut progress) {
            Ok(stop) => stop,
            Err(err) => {
                if let Some(abort) = err.downcast_ref::<OperatorAbort>() {
                    RunStop::OperatorAbort {
                        row: progress.current,
                        failsafe: abort.failsafe,
                    }
                } else {
                    RunStop::Failed {
                        row: progress.current,
                        message: format!("{err:#}"),
                    }
                }
            }
        },
    };

    report_stop(session, &stop, total_rows);
    RunOutcome {
        total_rows,
        rows_completed: progress.completed,
        stop,
    }
}

#[derive(Debug, Default)]
struct Progress {
    current: Option<usize>,
    completed: usize,
}

fn drive<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    request: &RunRequest<'_>,
    progress: &mut Progress,
) -> Result<RunStop> {
    let operation_column = guess_operation_column(request.columns);
    let total = request.rows.len();

    session.status("RPA started. Preparing...");
    session.log("RPA started.");
    session.pause(Duration::from_secs(session.config.prepare_delay_secs))?;

    session.status(format!(
        "You have {} seconds to bring SICAL to the front, on the 'Operación' field...",
        session.config.handoff_delay_secs
    ));
    session.log("Bring SICAL to the front with focus on the 'Operación' field.");
    session.pause(Duration::from_secs(session.config.handoff_delay_secs))?;

    for (offset, row) in request.rows.iter().enumerate() {
        let index = offset + 1;
        progress.current = Some(index);

        let operation = operation_column
            .and_then(|column| row.get(column))
            .map(normalize)
            .unwrap_or_default();
        let amount = row
            .get(request.amount_column)
            .map(normalize)
            .unwrap_or_default();
        session.sink.emit(ProgressEvent::Row {
            operation,
            amount,
            index,
            total,
        });
        session.status(format!("Processing row {index} of {total}"));
        session.log(format!("Processing row {index} of {total}"));
        info!(row = index, total, "processing row");

        let mut processor = RowProcessor::new(row, request.amount_column, index);
        loop {
            // Yield point between states: an abort requested meanwhile lands here.
            session.check_abort()?;
            match processor.step(session)? {
                StepResult::Continue => {}
                StepResult::RowDone => break,
                StepResult::Abort(reason) => {
                    return Ok(RunStop::Aborted { row: index, reason });
                }
            }
        }
        progress.completed += 1;
    }

    Ok(RunStop::Completed)
}

fn report_stop<H: Host, C: Clock>(session: &Session<'_, H, C>, stop: &RunStop, total: usize) {
    match stop {
        RunStop::Completed => {
            info!(total, "run completed");
            session.status("RPA finished. All rows processed.");
            session.log("RPA finished successfully.");
        }
        RunStop::Aborted { row, reason } => {
            warn!(row, %reason, "run aborted");
            session.status(format!("RPA stopped at row {row}: {reason}."));
            session.error(format!("RPA stopped at row {row} of {total}: {reason}."));
        }
        RunStop::OperatorAbort { row, failsafe } => {
            warn!(row = ?row, failsafe, "run cancelled");
            let cause = OperatorAbort {
                failsafe: *failsafe,
            };
            session.status(format!("RPA {cause}."));
            session.log(match row {
                Some(row) => format!("RPA {cause} during row {row}."),
                None => format!("RPA {cause} before the first row."),
            });
        }
        RunStop::Failed { row, message } => {
            error!(row = ?row, %message, "run failed");
            session.status(format!("Unexpected error: {message}"));
            session.error(format!("Unexpected error in the RPA: {message}"));
        }
        RunStop::Invalid { message } => {
            warn!(%message, "run rejected");
            session.status(format!("Cannot start: {message}"));
            session.error(format!("Cannot start the RPA: {message}"));
        }
    }
}
