//! Trigger state machine
//!
//! Decides, event by event, whether a trigger press is a quick press or
//! a hold. Any other key or modifier event that arrives while the
//! trigger is down turns the press into a hold; there is no timing
//! threshold.

use std::time::Instant;

use tracing::debug;

use super::overlay::ModifierOverlay;
use crate::action::{ActionBackend, ActionDispatcher};
use crate::hotkey::{KeyCode, ModifierFlags};

/// Kind of keyboard event delivered by the interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
    FlagsChanged,
}

/// Platform-neutral view of an intercepted keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub code: KeyCode,
    pub flags: ModifierFlags,
    /// Posted by this process; never seen by the state machine
    pub synthetic: bool,
}

/// What the interceptor should do with the event it just handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Drop the event; no application sees it
    Swallow,
    /// Deliver unchanged
    Pass,
    /// Deliver with its modifier flags replaced
    Rewrite(ModifierFlags),
}

/// The three observable states of a trigger press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Trigger is up
    #[default]
    Idle,
    /// Trigger is down, nothing else pressed yet
    Held,
    /// Trigger is down and has modified at least one other event
    HeldConsumed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Held => write!(f, "Held"),
            State::HeldConsumed => write!(f, "HeldConsumed"),
        }
    }
}

/// Session record of the single trigger key
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerSession {
    is_down: bool,
    down_at: Option<Instant>,
    /// Only ever true while `is_down`
    consumed_by_overlay: bool,
}

impl TriggerSession {
    pub fn state(&self) -> State {
        match (self.is_down, self.consumed_by_overlay) {
            (false, _) => State::Idle,
            (true, false) => State::Held,
            (true, true) => State::HeldConsumed,
        }
    }
}

/// Owns the trigger session and routes every intercepted event
pub struct TriggerStateMachine<B> {
    /// Neutral key code the trigger is aliased to
    trigger: KeyCode,
    session: TriggerSession,
    overlay: ModifierOverlay,
    dispatcher: ActionDispatcher<B>,
}

impl<B: ActionBackend> TriggerStateMachine<B> {
    pub fn new(trigger: KeyCode, overlay: ModifierOverlay, dispatcher: ActionDispatcher<B>) -> Self {
        Self {
            trigger,
            session: TriggerSession::default(),
            overlay,
            dispatcher,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.session.state()
    }

    /// Handle one intercepted event and decide its fate.
    ///
    /// Runs inside the event tap callback: no blocking, no I/O beyond
    /// posting synthesized events.
    pub fn handle(&mut self, event: &KeyEvent) -> Verdict {
        if event.synthetic {
            return Verdict::Pass;
        }

        if event.code == self.trigger {
            match event.kind {
                KeyEventKind::KeyDown => {
                    self.press();
                    return Verdict::Swallow;
                }
                KeyEventKind::KeyUp => {
                    self.release();
                    return Verdict::Swallow;
                }
                KeyEventKind::FlagsChanged => return Verdict::Pass,
            }
        }

        if !self.session.is_down {
            return Verdict::Pass;
        }

        let flags = self.overlay.apply(event.flags);
        if !self.session.consumed_by_overlay {
            self.session.consumed_by_overlay = true;
            self.log_transition(State::Held, State::HeldConsumed);
        }
        debug!(code = event.code, from = ?event.flags, to = ?flags, "hyper overlay applied");
        Verdict::Rewrite(flags)
    }

    /// Trigger key-down
    fn press(&mut self) {
        if self.session.is_down {
            // Autorepeat keeps the current press and its consumed mark
            return;
        }
        self.session = TriggerSession {
            is_down: true,
            down_at: Some(Instant::now()),
            consumed_by_overlay: false,
        };
        self.log_transition(State::Idle, State::Held);
    }

    /// Trigger key-up
    fn release(&mut self) {
        if !self.session.is_down {
            debug!("trigger released without a matching press");
            return;
        }

        let old_state = self.session.state();
        let held_ms = self
            .session
            .down_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let consumed = self.session.consumed_by_overlay;
        self.session = TriggerSession::default();

        debug!(from = %old_state, held_ms, "trigger released");
        self.dispatcher.on_release(consumed);
    }

    fn log_transition(&self, from: State, to: State) {
        debug!(%from, %to, "trigger state transition");
    }

    #[cfg(test)]
    fn dispatcher(&self) -> &ActionDispatcher<B> {
        &self.dispatcher
    }
}
