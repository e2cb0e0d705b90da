//! Per-run context shared by every automation component.
//!
//! A [`Session`] bundles the host seams, the run parameters and the progress
//! sink. All waiting goes through [`Session::pause`], which is also where an
//! operator abort is noticed.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use tracing::warn;

use crate::cancel::{CancelToken, OperatorAbort};
use crate::core::types::Point;
use crate::io::assets::AssetSet;
use crate::io::clock::Clock;
use crate::io::config::RpaConfig;
use crate::io::host::Host;
use crate::progress::{LogLevel, ProgressEvent, ProgressSink};

/// Pointer position that trips the failsafe.
pub const FAILSAFE_CORNER: Point = Point::new(0, 0);

pub struct Session<'a, H: Host, C: Clock> {
    pub host: &'a H,
    pub clock: &'a C,
    pub config: &'a RpaConfig,
    pub assets: &'a AssetSet,
    pub cancel: &'a CancelToken,
    pub sink: &'a dyn ProgressSink,
}

impl<H: Host, C: Clock> Session<'_, H, C> {
    /// Fail with [`OperatorAbort`] if the run has been cancelled.
    pub fn check_abort(&self) -> Result<()> {
        if self.config.failsafe && self.host.pointer()? == FAILSAFE_CORNER {
            warn!("pointer parked at failsafe corner");
            self.cancel.cancel();
            return Err(OperatorAbort { failsafe: true }.into());
        }
        if self.cancel.is_cancelled() {
            return Err(OperatorAbort { failsafe: false }.into());
        }
        Ok(())
    }

    /// Bounded sleep, checking for an abort at least once per poll interval.
    pub fn pause(&self, duration: Duration) -> Result<()> {
        self.check_abort()?;
        let chunk = self.config.poll_interval();
        let mut remaining = duration;
        while !remaining.is_zero() {
            let step = remaining.min(chunk);
            self.clock.sleep(step);
            remaining -= step;
            self.check_abort()?;
        }
        Ok(())
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn status(&self, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::Status(message.into()));
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit_log(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit_log(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit_log(LogLevel::Error, message.into());
    }

    fn emit_log(&self, level: LogLevel, message: String) {
        self.sink.emit(ProgressEvent::Log {
            at: Local::now(),
            level,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeClock, Harness};

    /// Trips the token once virtual time reaches `at`.
    struct CancelAt {
        clock: FakeClock,
        cancel: CancelToken,
        at: Duration,
    }

    impl Clock for CancelAt {
        fn now(&self) -> Instant {
            self.clock.now()
        }

        fn sleep(&self, duration: Duration) {
            self.clock.sleep(duration);
            if self.clock.elapsed() >= self.at {
                self.cancel.cancel();
            }
        }
    }

    #[test]
    fn pause_advances_clock_when_not_cancelled() {
        let harness = Harness::new().expect("harness");
        harness
            .session()
            .pause(Duration::from_millis(300))
            .expect("pause");
        assert_eq!(harness.clock.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn pause_fails_once_cancelled() {
        let harness = Harness::new().expect("harness");
        harness.cancel.cancel();

        let err = harness.session().pause(Duration::from_secs(1)).unwrap_err();
        let abort = err.downcast_ref::<OperatorAbort>().expect("operator abort");
        assert!(!abort.failsafe);
        assert_eq!(harness.clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn long_pause_is_cut_short_by_cancellation() {
        let harness = Harness::new().expect("harness");
        let clock = CancelAt {
            clock: harness.clock.clone(),
            cancel: harness.cancel.clone(),
            at: Duration::from_secs(1),
        };
        let session = Session {
            host: &harness.host,
            clock: &clock,
            config: &harness.config,
            assets: harness.assets.set(),
            cancel: &harness.cancel,
            sink: &harness.sink,
        };

        let err = session.pause(Duration::from_secs(5)).unwrap_err();
        assert!(err.downcast_ref::<OperatorAbort>().is_some());
        // Four 300ms chunks: the first check after the 1s mark stops the wait.
        assert_eq!(harness.clock.elapsed(), Duration::from_millis(1200));
    }

    #[test]
    fn pause_ends_on_a_partial_chunk() {
        let harness = Harness::new().expect("harness");
        harness
            .session()
            .pause(Duration::from_millis(1000))
            .expect("pause");
        assert_eq!(harness.clock.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn failsafe_corner_cancels_the_token() {
        let harness = Harness::new().expect("harness");
        harness.host.move_pointer(FAILSAFE_CORNER);

        let err = harness.session().check_abort().unwrap_err();
        assert!(err.downcast_ref::<OperatorAbort>().expect("abort").failsafe);
        assert!(harness.cancel.is_cancelled());
    }

    #[test]
    fn failsafe_disabled_ignores_corner() {
        let mut harness = Harness::new().expect("harness");
        harness.config.failsafe = false;
        harness.host.move_pointer(FAILSAFE_CORNER);

        harness.session().check_abort().expect("no abort");
    }
}
