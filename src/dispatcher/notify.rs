//! TX-done notification
//!
//! The TX-done interrupt handler only raises this flag; the decoder polls and
//! consumes it from the main loop, so the handler never reenters the decoder.

use core::sync::atomic::{AtomicBool, Ordering};

/// Flag raised by the TX-done interrupt
pub struct TxDoneFlag {
    raised: AtomicBool,
}

impl TxDoneFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Raise the flag. Safe to call from interrupt context.
    pub fn notify(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consume the flag, returning whether it was raised
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Drop a stale notification before starting a new transmission
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

impl Default for TxDoneFlag {
    fn default() -> Self {
        Self::new()
    }
}
