//! Quick-press actions
//!
//! A trigger press that is released without any other key in between
//! runs exactly one configured action: toggle Caps Lock or emit a
//! replacement key.

mod dispatcher;
#[cfg(target_os = "macos")]
mod system;

#[cfg(test)]
pub(crate) use dispatcher::testing;
pub use dispatcher::ActionDispatcher;
#[cfg(target_os = "macos")]
pub use system::SystemBackend;

use crate::hotkey::KeyCode;

/// Value stored in the source user-data field of every key event we post,
/// so the interceptor can recognise its own output
pub const SYNTHETIC_MARKER: i64 = 0x4859_5045_524B;

/// The action bound to a quick press, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionConfig {
    /// Flip the system Caps Lock state
    ToggleExclusiveLock,
    /// Post a single key down + key up for the given code
    EmitKey(KeyCode),
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self::ToggleExclusiveLock
    }
}

impl std::fmt::Display for ActionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionConfig::ToggleExclusiveLock => write!(f, "toggle-caps-lock"),
            ActionConfig::EmitKey(code) => write!(f, "emit-key({})", code),
        }
    }
}

/// OS operations the dispatcher needs
///
/// Implemented by [`SystemBackend`] on macOS and by recording fakes in tests.
pub trait ActionBackend {
    /// Read the current Caps Lock state
    fn lock_state(&mut self) -> Result<bool, ActionError>;

    /// Write the Caps Lock state
    fn set_lock_state(&mut self, on: bool) -> Result<(), ActionError>;

    /// Post a synthesized key-down and key-up at the HID level.
    ///
    /// Both events are built before either is posted: on error nothing
    /// has reached the system.
    fn post_key_press(&mut self, code: KeyCode) -> Result<(), ActionError>;
}

/// Errors raised while running a quick-press action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to create an event source")]
    EventSource,

    #[error("failed to create key event for code {code}")]
    Synthesis { code: KeyCode },

    #[error("IOHIDSystem service not found")]
    HidServiceMissing,

    #[error("IOKit call {call} failed with kern_return {code:#x}")]
    IoKit { call: &'static str, code: i32 },
}
