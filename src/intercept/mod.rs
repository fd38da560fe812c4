//! System-wide keyboard interception
//!
//! On macOS a CGEventTap runs on a dedicated thread with its own
//! CFRunLoop and feeds every key event through the trigger state
//! machine. Elsewhere the interceptor refuses to start and the process
//! stays inert.

#[cfg(target_os = "macos")]
mod permissions;
#[cfg(target_os = "macos")]
mod tap;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::action::{ActionBackend, ActionConfig, ActionDispatcher};
use crate::config::Config;
use crate::hotkey::KeyCode;
use crate::state::{ModifierOverlay, TriggerStateMachine};

/// Everything the tap thread needs to build its state machine
#[derive(Debug, Clone, Copy)]
pub struct InterceptorSettings {
    /// Neutral key code the trigger arrives as
    pub trigger: KeyCode,
    pub overlay: ModifierOverlay,
    pub action: ActionConfig,
    pub quick_press: bool,
}

impl InterceptorSettings {
    pub fn new(config: &Config, trigger: KeyCode) -> Self {
        Self {
            trigger,
            overlay: ModifierOverlay::hyper(config.include_shift),
            action: config.action,
            quick_press: config.normal_quick_press,
        }
    }

    /// Build the state machine the callback owns
    pub fn state_machine<B: ActionBackend>(&self, backend: B) -> TriggerStateMachine<B> {
        TriggerStateMachine::new(
            self.trigger,
            self.overlay,
            ActionDispatcher::new(self.action, self.quick_press, backend),
        )
    }
}

/// Errors that can occur while registering the interceptor
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("event interceptor is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility and Input Monitoring permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for the event tap")]
    RunLoopSource,

    #[error("failed to spawn interceptor thread: {0}")]
    ThreadSpawn(String),

    #[error("interceptor thread exited before the tap was ready")]
    ThreadExited,

    #[error("keyboard interception is only supported on macOS")]
    Unsupported,
}

/// Owns the interceptor thread
pub struct Interceptor {
    settings: InterceptorSettings,
    running: Arc<AtomicBool>,
    finished_rx: Option<oneshot::Receiver<()>>,
}

impl Interceptor {
    pub fn new(settings: InterceptorSettings) -> Self {
        Self {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            finished_rx: None,
        }
    }

    /// Register the event tap.
    ///
    /// Returns once the tap is live or has failed to register; the
    /// caller decides what a failure means for the rest of the process.
    pub fn start(&mut self) -> Result<(), InterceptError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(InterceptError::AlreadyRunning);
        }

        match self.spawn() {
            Ok(finished_rx) => {
                self.finished_rx = Some(finished_rx);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn spawn(&self) -> Result<oneshot::Receiver<()>, InterceptError> {
        permissions::preflight();
        tap::spawn(self.settings, Arc::clone(&self.running))
    }

    #[cfg(not(target_os = "macos"))]
    fn spawn(&self) -> Result<oneshot::Receiver<()>, InterceptError> {
        tracing::debug!(trigger = self.settings.trigger, "no event tap on this platform");
        Err(InterceptError::Unsupported)
    }

    /// Check if the interceptor is currently running
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolves when the tap thread exits; never resolves if it was not started
    pub async fn finished(&mut self) {
        match self.finished_rx.as_mut() {
            Some(rx) => {
                let _ = rx.await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::RecordingBackend;
    use crate::hotkey::{codes, ModifierFlags};
    use crate::state::{KeyEvent, KeyEventKind, Verdict};

    fn config(include_shift: bool) -> Config {
        Config {
            normal_quick_press: true,
            include_shift,
            action: ActionConfig::EmitKey(codes::ESCAPE),
        }
    }

    #[test]
    fn test_interceptor_creation() {
        let interceptor = Interceptor::new(InterceptorSettings::new(&config(false), codes::F18));
        assert!(!interceptor.is_running());
    }

    #[test]
    fn test_settings_build_machine() {
        let settings = InterceptorSettings::new(&config(true), codes::F18);
        let mut sm = settings.state_machine(RecordingBackend::default());

        let trigger = KeyEvent {
            kind: KeyEventKind::KeyDown,
            code: codes::F18,
            flags: ModifierFlags::NONE,
            synthetic: false,
        };
        let key = KeyEvent {
            kind: KeyEventKind::KeyDown,
            code: codes::SPACE,
            flags: ModifierFlags::NONE,
            synthetic: false,
        };
        assert_eq!(sm.handle(&trigger), Verdict::Swallow);
        assert_eq!(
            sm.handle(&key),
            Verdict::Rewrite(
                ModifierFlags::COMMAND
                    | ModifierFlags::CONTROL
                    | ModifierFlags::OPTION
                    | ModifierFlags::SHIFT
            )
        );
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_unsupported_leaves_interceptor_stopped() {
        let mut interceptor =
            Interceptor::new(InterceptorSettings::new(&config(false), codes::F18));
        assert!(matches!(interceptor.start(), Err(InterceptError::Unsupported)));
        assert!(!interceptor.is_running());
    }
}
