//! Field-ready waiter: resynchronize on the primary field after a row.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::types::{DialogStatus, ScreenReference};
use crate::dialogs;
use crate::io::clock::Clock;
use crate::io::host::Host;
use crate::locator::locate;
use crate::session::Session;

/// How a resynchronization wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    Ready,
    Critical,
    TimedOut,
}

/// Poll for the primary field until it shows up or `deadline` elapses.
///
/// Each cycle also runs the dialog monitor; a critical dialog ends the wait
/// immediately with `false`.
pub fn await_primary_field<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    deadline: Duration,
) -> Result<bool> {
    Ok(wait_for_primary_field(session, deadline)? == Resync::Ready)
}

/// Same as [`await_primary_field`], keeping the reason a wait failed.
pub fn wait_for_primary_field<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    deadline: Duration,
) -> Result<Resync> {
    let start = session.now();
    let interval = session.config.poll_interval();
    while session.now().duration_since(start) < deadline {
        if locate(session, ScreenReference::PrimaryField)?.is_some() {
            debug!(waited = ?session.now().duration_since(start), "primary field is back");
            return Ok(Resync::Ready);
        }
        if dialogs::check(session)? == DialogStatus::Critical {
            return Ok(Resync::Critical);
        }
        session.pause(interval)?;
    }

    warn!(deadline = ?deadline, "primary field did not reappear");
    session.error(
        "The 'Operación' field did not reappear after validating. \
         Probably an unexpected message or state in SICAL.",
    );
    session.status("Could not return to the 'Operación' field. Check SICAL.");
    Ok(Resync::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CRITICAL_AT, Harness, PRIMARY_AT};

    #[test]
    fn succeeds_when_field_appears_before_deadline() {
        let harness = Harness::new().expect("harness");
        harness
            .host
            .show_from(ScreenReference::PrimaryField, PRIMARY_AT, Duration::from_secs(4));

        let ready =
            await_primary_field(&harness.session(), Duration::from_secs(5)).expect("wait");
        assert!(ready);
        assert!(harness.clock.elapsed() >= Duration::from_secs(4));
        assert!(harness.clock.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn fails_when_deadline_is_shorter_than_load_time() {
        let harness = Harness::new().expect("harness");
        harness
            .host
            .show_from(ScreenReference::PrimaryField, PRIMARY_AT, Duration::from_secs(4));

        let ready =
            await_primary_field(&harness.session(), Duration::from_secs(3)).expect("wait");
        assert!(!ready);
        assert_eq!(harness.clock.elapsed(), Duration::from_secs(3));
        assert!(
            harness
                .sink
                .statuses()
                .iter()
                .any(|status| status.contains("Operación"))
        );
    }

    #[test]
    fn returns_immediately_when_already_visible() {
        let harness = Harness::new().expect("harness");
        harness.host.show(ScreenReference::PrimaryField, PRIMARY_AT);

        assert!(await_primary_field(&harness.session(), Duration::from_secs(5)).expect("wait"));
        assert_eq!(harness.clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn critical_dialog_cuts_the_wait_short() {
        let harness = Harness::new().expect("harness");
        harness
            .host
            .show_from(ScreenReference::CriticalDialog, CRITICAL_AT, Duration::from_secs(1));

        let ready =
            await_primary_field(&harness.session(), Duration::from_secs(5)).expect("wait");
        assert!(!ready);
        assert!(harness.clock.elapsed() < Duration::from_millis(1500));
        assert_eq!(
            wait_for_primary_field(&harness.session(), Duration::from_secs(5)).expect("wait"),
            Resync::Critical
        );
        assert!(harness.host.events().is_empty());
    }
}
