//! Screen locator: reference image to on-screen point.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{Point, ScreenReference};
use crate::io::clock::Clock;
use crate::io::host::Host;
use crate::session::Session;

/// Find `reference` on screen at the configured confidence.
///
/// A missing backing file yields `Ok(None)`; missing assets are reported by
/// the preflight check, not per call. When the host cannot score matches the
/// confidence is dropped and an exact match is requested. No retries.
#[instrument(skip(session), level = "debug")]
pub fn locate<H: Host, C: Clock>(
    session: &Session<'_, H, C>,
    reference: ScreenReference,
) -> Result<Option<Point>> {
    let path = session.assets.path(reference);
    if !path.is_file() {
        debug!(path = %path.display(), "reference image missing, treating as absent");
        return Ok(None);
    }
    let confidence = session
        .host
        .supports_confidence()
        .then_some(session.config.confidence);
    let found = session
        .host
        .locate(path, confidence)
        .with_context(|| format!("locate {}", path.display()))?;
    debug!(found = ?found, "lookup finished");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, PRIMARY_AT};
    use std::fs;

    #[test]
    fn returns_point_when_visible() {
        let harness = Harness::new().expect("harness");
        harness.host.show(ScreenReference::PrimaryField, PRIMARY_AT);

        let found = locate(&harness.session(), ScreenReference::PrimaryField).expect("locate");
        assert_eq!(found, Some(PRIMARY_AT));
        let lookups = harness.host.lookups();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].confidence, Some(0.80));
    }

    #[test]
    fn returns_none_when_absent() {
        let harness = Harness::new().expect("harness");
        let found = locate(&harness.session(), ScreenReference::Validate).expect("locate");
        assert_eq!(found, None);
    }

    #[test]
    fn missing_asset_is_absent_without_querying_host() {
        let harness = Harness::new().expect("harness");
        harness.host.show(ScreenReference::Confirm, PRIMARY_AT);
        fs::remove_file(harness.assets.set().path(ScreenReference::Confirm)).expect("remove");

        let found = locate(&harness.session(), ScreenReference::Confirm).expect("locate");
        assert_eq!(found, None);
        assert!(harness.host.lookups().is_empty());
    }

    #[test]
    fn exact_match_fallback_drops_confidence() {
        let harness = Harness::new().expect("harness");
        harness.host.set_confidence_matching(false);
        harness.host.show(ScreenReference::PrimaryField, PRIMARY_AT);

        locate(&harness.session(), ScreenReference::PrimaryField).expect("locate");
        assert_eq!(harness.host.lookups()[0].confidence, None);
    }

    #[test]
    fn host_failure_propagates() {
        let harness = Harness::new().expect("harness");
        harness.host.fail_lookup(ScreenReference::Validate);

        let err = locate(&harness.session(), ScreenReference::Validate).unwrap_err();
        assert!(format!("{err:#}").contains("screen capture failed"));
    }
}
