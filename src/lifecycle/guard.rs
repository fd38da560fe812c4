//! Makes sure the key indirection is cleared on every way out
//!
//! The guard owns the [`KeyIndirector`] and publishes it in a
//! process-wide write-once slot, so the signal path and the panic hook
//! can reach it without going through `main`. Whoever reverts first
//! wins; every later attempt is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::remap::{KeyIndirector, RemapError};

/// The one guard of this process, set once in [`LifecycleGuard::install`]
static ACTIVE: OnceLock<Arc<GuardSlot>> = OnceLock::new();

struct GuardSlot {
    indirector: KeyIndirector,
    applied: AtomicBool,
    reverted: AtomicBool,
}

impl GuardSlot {
    fn new(indirector: KeyIndirector) -> Self {
        Self {
            indirector,
            applied: AtomicBool::new(false),
            reverted: AtomicBool::new(false),
        }
    }

    /// Returns `Ok(false)` when the indirection was already applied
    fn apply(&self) -> Result<bool, RemapError> {
        if self.applied.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.indirector.apply()?;
        Ok(true)
    }

    /// Returns `false` when someone else already reverted
    fn revert_once(&self) -> bool {
        if self.reverted.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.indirector.revert() {
            warn!(error = %e, "failed to revert key indirection");
        }
        true
    }
}

/// Errors from installing the guard
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("a lifecycle guard is already installed in this process")]
    AlreadyInstalled,
}

/// Owner of the key indirection for the lifetime of the process
///
/// Dropping the guard reverts the indirection.
pub struct LifecycleGuard {
    slot: Arc<GuardSlot>,
}

impl LifecycleGuard {
    /// Publish `indirector` as the process-wide active indirection
    pub fn install(indirector: KeyIndirector) -> Result<Self, GuardError> {
        let slot = Arc::new(GuardSlot::new(indirector));
        ACTIVE
            .set(Arc::clone(&slot))
            .map_err(|_| GuardError::AlreadyInstalled)?;
        Ok(Self { slot })
    }

    /// Apply the indirection; only the first call reaches the OS
    pub fn apply(&self) -> Result<bool, RemapError> {
        self.slot.apply()
    }

    /// Revert the indirection unless it already was
    pub fn revert(&self) -> bool {
        self.slot.revert_once()
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.slot.revert_once();
    }
}

/// Revert the active indirection, if any.
///
/// This is the whole signal-path contract: no state machine access,
/// just the revert.
pub fn revert_active() -> bool {
    ACTIVE.get().is_some_and(|slot| slot.revert_once())
}

/// Chain a panic hook that reverts before the default hook reports
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        revert_active();
        default_hook(info);
    }));
}
