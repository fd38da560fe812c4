//! Process lifecycle: signal handling and the revert guard

mod guard;
mod shutdown;

pub use guard::{install_panic_hook, revert_active, LifecycleGuard};
pub use shutdown::ShutdownSignal;
