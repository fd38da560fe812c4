//! Runs the configured action when a trigger press ends as a quick press

use tracing::{debug, warn};

use super::{ActionBackend, ActionConfig, ActionError};

/// Executes the quick-press action on an unconsumed trigger release
pub struct ActionDispatcher<B> {
    action: ActionConfig,
    /// `false` with `--no-quick-press`
    enabled: bool,
    backend: B,
}

impl<B: ActionBackend> ActionDispatcher<B> {
    pub fn new(action: ActionConfig, enabled: bool, backend: B) -> Self {
        Self {
            action,
            enabled,
            backend,
        }
    }

    /// Release hook, called once per trigger key-up.
    ///
    /// Returns `true` when the action ran to completion. Failures are
    /// logged and the action is skipped.
    pub fn on_release(&mut self, consumed: bool) -> bool {
        if !self.enabled {
            return false;
        }
        if consumed {
            debug!("trigger used as modifier, quick press suppressed");
            return false;
        }

        match self.run() {
            Ok(()) => {
                debug!(action = %self.action, "quick press dispatched");
                true
            }
            Err(e) => {
                warn!(action = %self.action, error = %e, "quick press action failed");
                false
            }
        }
    }

    fn run(&mut self) -> Result<(), ActionError> {
        match self.action {
            ActionConfig::ToggleExclusiveLock => {
                let current = self.backend.lock_state()?;
                self.backend.set_lock_state(!current)
            }
            ActionConfig::EmitKey(code) => self.backend.post_key_press(code),
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingBackend};
    use super::*;
    use crate::hotkey::codes;

    #[test]
    fn test_toggle_reads_then_writes_negation() {
        let mut dispatcher = ActionDispatcher::new(
            ActionConfig::ToggleExclusiveLock,
            true,
            RecordingBackend::default(),
        );

        assert!(dispatcher.on_release(false));
        assert!(dispatcher.on_release(false));
        assert_eq!(
            dispatcher.backend().calls,
            vec![
                Call::ReadLock,
                Call::WriteLock(true),
                Call::ReadLock,
                Call::WriteLock(false),
            ]
        );
    }

    #[test]
    fn test_emit_key_posts_down_then_up() {
        let mut dispatcher = ActionDispatcher::new(
            ActionConfig::EmitKey(codes::ESCAPE),
            true,
            RecordingBackend::default(),
        );

        assert!(dispatcher.on_release(false));
        assert_eq!(
            dispatcher.backend().key_events(),
            vec![(codes::ESCAPE, true), (codes::ESCAPE, false)]
        );
    }

    #[test]
    fn test_consumed_press_does_nothing() {
        let mut dispatcher = ActionDispatcher::new(
            ActionConfig::EmitKey(codes::ESCAPE),
            true,
            RecordingBackend::default(),
        );

        assert!(!dispatcher.on_release(true));
        assert!(dispatcher.backend().calls.is_empty());
    }

    #[test]
    fn test_disabled_dispatcher_does_nothing() {
        let mut dispatcher = ActionDispatcher::new(
            ActionConfig::ToggleExclusiveLock,
            false,
            RecordingBackend::default(),
        );

        assert!(!dispatcher.on_release(false));
        assert!(dispatcher.backend().calls.is_empty());
    }

    #[test]
    fn test_synthesis_failure_is_skipped() {
        let backend = RecordingBackend {
            fail_synthesis: true,
            ..Default::default()
        };
        let mut dispatcher =
            ActionDispatcher::new(ActionConfig::EmitKey(codes::TAB), true, backend);

        assert!(!dispatcher.on_release(false));
        assert!(dispatcher.backend().key_events().is_empty());
    }

    #[test]
    fn test_failed_key_up_posts_nothing() {
        let backend = RecordingBackend {
            fail_key_up: true,
            ..Default::default()
        };
        let mut dispatcher =
            ActionDispatcher::new(ActionConfig::EmitKey(codes::ESCAPE), true, backend);

        assert!(!dispatcher.on_release(false));
        // A lone key-down would leave the key stuck
        assert!(dispatcher.backend().key_events().is_empty());
    }
}
