// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared cancellation signal, checked by migrators between steps.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a run stopped dispatching early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller cancelled the run.
    Cancelled,
    /// The run's deadline passed.
    TimedOut,
    /// A fatal error halted the batch.
    Halted,
}

/// Everything a migrator must observe before starting its next step.
#[derive(Debug, Clone)]
pub struct RunSignal {
    external: CancellationToken,
    halt: CancellationToken,
    deadline: Option<Instant>,
}

impl RunSignal {
    pub(crate) fn new(external: CancellationToken, deadline: Option<Instant>) -> Self {
        Self {
            external,
            halt: CancellationToken::new(),
            deadline,
        }
    }

    /// A signal that never fires, for driving a migrator directly.
    pub fn never() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    /// Stops the run from the inside after a fatal error.
    pub(crate) fn halt(&self) {
        self.halt.cancel();
    }

    /// Returns why the run should stop, if it should.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.halt.is_cancelled() {
            Some(StopReason::Halted)
        } else if self.external.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StopReason::TimedOut)
        } else {
            None
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop_reason().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_halt_takes_precedence() {
        let external = CancellationToken::new();
        let signal = RunSignal::new(external.clone(), None);
        assert_eq!(signal.stop_reason(), None);

        external.cancel();
        assert_eq!(signal.stop_reason(), Some(StopReason::Cancelled));

        signal.halt();
        assert_eq!(signal.stop_reason(), Some(StopReason::Halted));
    }

    #[test]
    fn test_deadline() {
        let past = Instant::now() - Duration::from_millis(1);
        let signal = RunSignal::new(CancellationToken::new(), Some(past));
        assert_eq!(signal.stop_reason(), Some(StopReason::TimedOut));
        assert!(!RunSignal::never().should_stop());
    }
}
