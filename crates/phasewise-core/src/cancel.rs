use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Phase, ResolveError};

/// Cooperative cancellation flag shared between a resolver and its callers.
///
/// Cloning shares the flag. Checks happen before each phase, between
/// supertype rounds and while waiting for a unit lock.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation so the owner can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled { phase })` once cancellation was requested.
    #[inline]
    pub fn check(&self, phase: Phase) -> Result<(), ResolveError> {
        if self.is_cancelled() {
            Err(ResolveError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}
