//! One-shot check of the privacy permissions the tap depends on

use tracing::{info, warn};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightListenEventAccess() -> bool;
    fn CGRequestListenEventAccess() -> bool;
    fn CGPreflightPostEventAccess() -> bool;
    fn CGRequestPostEventAccess() -> bool;
}

/// Log the permission state and ask macOS to prompt for anything missing.
///
/// Does not wait for the user; tap registration reports the outcome.
pub(super) fn preflight() {
    // SAFETY: plain queries with no arguments
    let (listen, post) = unsafe { (CGPreflightListenEventAccess(), CGPreflightPostEventAccess()) };
    info!(input_monitoring = listen, accessibility = post, "permission preflight");

    if !listen {
        unsafe { CGRequestListenEventAccess() };
        warn!("Input Monitoring not granted: System Settings → Privacy & Security → Input Monitoring");
    }
    if !post {
        unsafe { CGRequestPostEventAccess() };
        warn!("Accessibility not granted: System Settings → Privacy & Security → Accessibility");
    }
}
