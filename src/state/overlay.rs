//! Hyper modifier overlay applied while the trigger is held

use crate::hotkey::ModifierFlags;

/// Replaces the modifiers of every event that arrives while the trigger is down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierOverlay {
    /// Always applied (Command + Control + Option)
    base: ModifierFlags,
    /// Fold Shift into every overlaid event
    include_shift: bool,
}

impl ModifierOverlay {
    /// The classic hyper combination, optionally with Shift
    pub fn hyper(include_shift: bool) -> Self {
        Self {
            base: ModifierFlags::COMMAND | ModifierFlags::CONTROL | ModifierFlags::OPTION,
            include_shift,
        }
    }

    /// Compute the outgoing flags for an event carrying `incoming`.
    ///
    /// Shift survives when the user is already holding it, and flags
    /// outside the managed set (fn layer, Caps Lock state) pass through.
    pub fn apply(&self, incoming: ModifierFlags) -> ModifierFlags {
        let mut flags = self.base;
        if self.include_shift || incoming.contains(ModifierFlags::SHIFT) {
            flags |= ModifierFlags::SHIFT;
        }
        flags | incoming.unmanaged()
    }
}
