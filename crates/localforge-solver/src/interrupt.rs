//! Cooperative cancellation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// The reason an interrupt was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// Raised by an external caller.
    Cancelled,
    /// Raised because a deadline elapsed.
    TimedOut,
}

/// A cooperative cancellation flag shared between a runner and whoever may
/// stop it.
///
/// Runners observe the flag at every iteration boundary only; a raised
/// interrupt therefore never cuts a move application in half. Cloning the
/// handle shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    state: Arc<AtomicU8>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        // Keep the first reason raised.
        let _ = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Marks the deadline as elapsed.
    pub fn time_out(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, TIMED_OUT, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// The reason the interrupt was raised, if it was.
    pub fn reason(&self) -> Option<InterruptReason> {
        match self.state.load(Ordering::SeqCst) {
            CANCELLED => Some(InterruptReason::Cancelled),
            TIMED_OUT => Some(InterruptReason::TimedOut),
            _ => None,
        }
    }

    /// Whether the interrupt was raised at all.
    pub fn is_raised(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    /// Clears the flag so the handle can drive another run.
    pub fn reset(&self) {
        self.state.store(RUNNING, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.is_raised());
        assert_eq!(interrupt.reason(), None);
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let interrupt = Interrupt::new();
        let shared = interrupt.clone();
        interrupt.cancel();
        assert_eq!(shared.reason(), Some(InterruptReason::Cancelled));
    }

    #[test]
    fn first_reason_wins() {
        let interrupt = Interrupt::new();
        interrupt.time_out();
        interrupt.cancel();
        assert_eq!(interrupt.reason(), Some(InterruptReason::TimedOut));
    }

    #[test]
    fn reset_allows_reuse() {
        let interrupt = Interrupt::new();
        interrupt.cancel();
        interrupt.reset();
        assert!(!interrupt.is_raised());
    }
}
