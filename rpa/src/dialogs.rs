//! Dialog monitor for modal windows the target application raises.

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::types::{DialogStatus, ScreenReference};
use crate::io::clock::Clock;
use crate::io::host::Host;
use crate::locator::locate;
use crate::session::Session;

/// Look for known dialogs once.
///
/// The critical dialog is checked first and is never acted upon. An
/// informational dialog is dismissed only when its acknowledge control is
/// also visible; otherwise the check reports `None`.
pub fn check<H: Host, C: Clock>(session: &Session<'_, H, C>) -> Result<DialogStatus> {
    if locate(session, ScreenReference::CriticalDialog)?.is_some() {
        warn!("critical dialog on screen");
        session.error("Critical message detected in SICAL.");
        session.status("Critical message detected. Stopping.");
        return Ok(DialogStatus::Critical);
    }

    if locate(session, ScreenReference::InfoDialog)?.is_none() {
        return Ok(DialogStatus::None);
    }
    let Some(button) = locate(session, ScreenReference::InfoAcknowledge)? else {
        debug!("informational dialog without visible acknowledge control");
        return Ok(DialogStatus::None);
    };
    session.host.click(button)?;
    session.pause(session.config.click_delay())?;
    session.log("SICAL notice detected and closed automatically.");
    Ok(DialogStatus::Dismissed)
}
