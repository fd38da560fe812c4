//! CGEventTap glue
//!
//! The tap callback is the hot path for every keystroke on the system:
//! it converts the CGEvent, asks the state machine for a verdict and
//! applies it in place. Nothing in here may block.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPortRef;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{InterceptError, InterceptorSettings};
use crate::action::{SystemBackend, SYNTHETIC_MARKER};
use crate::hotkey::KeyCode;
use crate::state::{KeyEvent, KeyEventKind, TriggerStateMachine, Verdict};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// Spawn the tap thread and wait until the tap is registered.
///
/// The returned receiver fires when the thread leaves its run loop.
pub(super) fn spawn(
    settings: InterceptorSettings,
    running: Arc<AtomicBool>,
) -> Result<oneshot::Receiver<()>, InterceptError> {
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), InterceptError>>();
    let (finished_tx, finished_rx) = oneshot::channel();

    thread::Builder::new()
        .name("event-tap".to_string())
        .spawn(move || {
            info!("event tap thread started");

            let ready = ready_tx.clone();
            if let Err(e) = run_event_loop(settings, &running, move || {
                let _ = ready.send(Ok(()));
            }) {
                error!(error = %e, "event tap error");
                let _ = ready_tx.send(Err(e));
            }

            running.store(false, Ordering::SeqCst);
            let _ = finished_tx.send(());
            info!("event tap thread stopped");
        })
        .map_err(|e| InterceptError::ThreadSpawn(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(finished_rx),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(InterceptError::ThreadExited),
    }
}

/// Convert a tap event into the state machine's view of it
fn key_event(event_type: CGEventType, event: &CGEvent) -> Option<KeyEvent> {
    let kind = match event_type {
        CGEventType::KeyDown => KeyEventKind::KeyDown,
        CGEventType::KeyUp => KeyEventKind::KeyUp,
        CGEventType::FlagsChanged => KeyEventKind::FlagsChanged,
        _ => return None,
    };
    Some(KeyEvent {
        kind,
        code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as KeyCode,
        flags: event.get_flags().into(),
        synthetic: event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA)
            == SYNTHETIC_MARKER,
    })
}

/// Run the state machine on one event and apply the verdict in place
fn intercept(
    machine: &RefCell<TriggerStateMachine<SystemBackend>>,
    event_type: CGEventType,
    event: &CGEvent,
) -> Option<CGEvent> {
    let key_event = key_event(event_type, event)?;

    match machine.borrow_mut().handle(&key_event) {
        Verdict::Pass => None,
        Verdict::Swallow => {
            // A null event is delivered to nobody
            event.set_type(CGEventType::Null);
            Some(event.clone())
        }
        Verdict::Rewrite(flags) => {
            event.set_flags(flags.into());
            Some(event.clone())
        }
    }
}

/// Run the CFRunLoop with the event tap
fn run_event_loop(
    settings: InterceptorSettings,
    running: &AtomicBool,
    ready: impl FnOnce(),
) -> Result<(), InterceptError> {
    // Both must outlive the tap, which borrows them through the callback
    let machine = RefCell::new(settings.state_machine(SystemBackend));
    let tap_port: Cell<Option<CFMachPortRef>> = Cell::new(None);

    let callback = |_proxy: CGEventTapProxy,
                    event_type: CGEventType,
                    event: &CGEvent|
     -> Option<CGEvent> {
        match event_type {
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled by the system, re-enabling");
                if let Some(port) = tap_port.get() {
                    // SAFETY: port belongs to the tap that is delivering this event
                    unsafe { CGEventTapEnable(port, true) };
                }
                None
            }
            _ => intercept(&machine, event_type, event),
        }
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        InterceptError::EventTapCreation
    })?;
    tap_port.set(Some(tap.mach_port.as_concrete_TypeRef()));

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| InterceptError::RunLoopSource)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!(trigger = settings.trigger, "event tap created and enabled");
    ready();

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
        }
    }

    debug!("leaving event tap run loop");
    unsafe {
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    Ok(())
}
