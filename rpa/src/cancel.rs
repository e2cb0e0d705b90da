//! Cooperative cancellation for operator aborts.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag checked at every suspension point of a run.
///
/// Clones observe the same flag, so the presentation layer can keep one and
/// trip it while the run holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Raised at a suspension point once the run has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorAbort {
    /// The pointer was parked at the failsafe corner.
    pub failsafe: bool,
}

impl fmt::Display for OperatorAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failsafe {
            write!(f, "aborted by failsafe (pointer at top-left corner)")
        } else {
            write!(f, "aborted by operator")
        }
    }
}

impl std::error::Error for OperatorAbort {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
