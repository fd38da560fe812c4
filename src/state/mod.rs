//! Trigger state machine and hyper overlay
//!
//! The trigger key moves through three states:
//! - Idle: key is up, events pass through
//! - Held: key is down, no other key seen yet
//! - HeldConsumed: key is down and has acted as a modifier

mod machine;
mod overlay;

pub use machine::{KeyEvent, KeyEventKind, TriggerStateMachine, Verdict};
pub use overlay::ModifierOverlay;
