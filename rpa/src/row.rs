//! Row processor: the per-row state machine.
//!
//! ```text
//! AcquireField -> InjectColumns -> ValidateAmount -> ConfirmAmount -> Resynchronize -> Done
//! ```
//!
//! Any state can end the row with [`StepResult::Abort`]. Every simulated input
//! is followed by a settle delay and a dialog check, and a critical dialog
//! aborts before anything else is sent to the host.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::cell::{format_amount, is_skip, normalize};
use crate::core::types::{AbortReason, DialogStatus, Row, ScreenReference, StepResult};
use crate::dialogs;
use crate::injector::inject;
use crate::io::clock::Clock;
use crate::io::host::{Host, Key};
use crate::locator::locate;
use crate::session::Session;
use crate::waiter::{Resync, wait_for_primary_field};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    AcquireField,
    /// Next column to visit, by position.
    InjectColumns { next: usize },
    ValidateAmount,
    ConfirmAmount,
    Resynchronize,
    Done,
}

/// Drives one row through [`RowState`], one state per [`RowProcessor::step`].
pub struct RowProcessor<'r> {
    row: &'r Row,
    amount_column: &'r str,
    /// 1-based, for reporting.
    index: usize,
    state: RowState,
}

impl<'r> RowProcessor<'r> {
    pub fn new(row: &'r Row, amount_column: &'r str, index: usize) -> Self {
        Self {
            row,
            amount_column,
            index,
            state: RowState::AcquireField,
        }
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    /// Advance the row by one state.
    #[instrument(skip_all, fields(row = self.index, state = ?self.state))]
    pub fn step<H: Host, C: Clock>(&mut self, session: &Session<'_, H, C>) -> Result<StepResult> {
        match self.state {
            RowState::AcquireField => self.acquire_field(session),
            RowState::InjectColumns { next } => self.inject_column(session, next),
            RowState::ValidateAmount => {
                self.click_control(session, ScreenReference::Validate, RowState::ConfirmAmount)
            }
            RowState::ConfirmAmount => {
                self.click_control(session, ScreenReference::Confirm, RowState::Resynchronize)
            }
            RowState::Resynchronize => self.resynchronize(session),
            RowState::Done => Ok(StepResult::RowDone),
        }
    }

    fn acquire_field<H: Host, C: Clock>(
        &mut self,
        session: &Session<'_, H, C>,
    ) -> Result<StepResult> {
        session.log("Looking for the 'Operación' field on screen...");
        let Some(field) = locate(session, ScreenReference::PrimaryField)? else {
            return Ok(not_found(session, ScreenReference::PrimaryField));
        };
        session.host.click(field)?;
        if let Some(reason) = settle(session, session.config.click_delay())? {
            return Ok(StepResult::Abort(reason));
        }
        self.state = RowState::InjectColumns { next: 0 };
        Ok(StepResult::Continue)
    }

    fn inject_column<H: Host, C: Clock>(
        &mut self,
        session: &Session<'_, H, C>,
        next: usize,
    ) -> Result<StepResult> {
        let Some((column, value)) = self.row.cells().get(next) else {
            debug!("no columns left");
            self.state = RowState::Done;
            return Ok(StepResult::RowDone);
        };
        let is_amount = column == self.amount_column;
        let text = normalize(value);

        if is_skip(&text) {
            debug!(column = %column, "skip sentinel, tab only");
            session.host.press(Key::Tab)?;
            if let Some(reason) = settle(session, session.config.tab_delay())? {
                return Ok(StepResult::Abort(reason));
            }
            if is_amount {
                session.warn("The amount column holds 'T'; no amount was entered.");
            }
            self.state = RowState::InjectColumns { next: next + 1 };
            return Ok(StepResult::Continue);
        }

        let text = if is_amount {
            format_amount(&text)
        } else {
            text
        };
        debug!(column = %column, chars = text.chars().count(), "entering value");
        inject(session, &text)?;
        session.host.press(Key::Tab)?;
        if let Some(reason) = settle(session, session.config.tab_delay())? {
            return Ok(StepResult::Abort(reason));
        }

        self.state = if is_amount {
            RowState::ValidateAmount
        } else {
            RowState::InjectColumns { next: next + 1 }
        };
        Ok(StepResult::Continue)
    }

    fn click_control<H: Host, C: Clock>(
        &mut self,
        session: &Session<'_, H, C>,
        control: ScreenReference,
        then: RowState,
    ) -> Result<StepResult> {
        session.log(format!("Looking for the '{}' button...", control.label()));
        let Some(button) = locate(session, control)? else {
            return Ok(not_found(session, control));
        };
        session.host.click(button)?;
        if let Some(reason) = settle(session, session.config.click_delay())? {
            return Ok(StepResult::Abort(reason));
        }
        self.state = then;
        Ok(StepResult::Continue)
    }

    fn resynchronize<H: Host, C: Clock>(
        &mut self,
        session: &Session<'_, H, C>,
    ) -> Result<StepResult> {
        let deadline = session.config.resync_timeout();
        match wait_for_primary_field(session, deadline)? {
            Resync::Ready => {
                info!(row = self.index, "row confirmed");
                session.log(format!("Row {} confirmed.", self.index));
                self.state = RowState::Done;
                Ok(StepResult::RowDone)
            }
            Resync::Critical => Ok(StepResult::Abort(AbortReason::CriticalDialog)),
            Resync::TimedOut => Ok(StepResult::Abort(AbortReason::ResyncTimeout {
                deadline_secs: deadline.as_secs(),
            })),
        }
    }
}

/// Settle after an input event, then look for dialogs.
fn settle<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    delay: Duration,
) -> Result<Option<AbortReason>> {
    session.pause(delay)?;
    match dialogs::check(session)? {
        DialogStatus::Critical => Ok(Some(AbortReason::CriticalDialog)),
        DialogStatus::None | DialogStatus::Dismissed => Ok(None),
    }
}

fn not_found<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    reference: ScreenReference,
) -> StepResult {
    session.error(format!(
        "Could not locate '{}' on screen ({}).",
        reference.label(),
        session.assets.path(reference).display()
    ));
    session.status(format!("'{}' not found. Stopping.", reference.label()));
    StepResult::Abort(AbortReason::NotFound(reference))
}
