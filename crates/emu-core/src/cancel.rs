//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};

/// A cancellation signal polled by the engine between instructions.
///
/// The engine never checks the token mid-instruction, so an in-flight
/// instruction always retires before a run returns `Cancelled`.
pub trait CancellationToken {
    fn is_cancellation_requested(&self) -> bool;
}

/// A token that is never signalled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancellation_requested(&self) -> bool {
        false
    }
}

impl CancellationToken for AtomicBool {
    fn is_cancellation_requested(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl CancellationToken for bool {
    fn is_cancellation_requested(&self) -> bool {
        *self
    }
}

impl<T: CancellationToken + ?Sized> CancellationToken for &T {
    fn is_cancellation_requested(&self) -> bool {
        (**self).is_cancellation_requested()
    }
}

impl<T: CancellationToken + ?Sized> CancellationToken for std::sync::Arc<T> {
    fn is_cancellation_requested(&self) -> bool {
        (**self).is_cancellation_requested()
    }
}
