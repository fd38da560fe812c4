//! macOS action backend: IOKit for Caps Lock, CGEvent for key synthesis

use std::ffi::{c_char, c_int, c_void};

use core_graphics::event::{CGEvent, CGEventTapLocation, CGKeyCode, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use super::{ActionBackend, ActionError, SYNTHETIC_MARKER};
use crate::hotkey::KeyCode;

type IoObject = u32;
type MachPort = u32;
type KernReturn = i32;

const KERN_SUCCESS: KernReturn = 0;
/// `kIOMainPortDefault`
const MAIN_PORT_DEFAULT: MachPort = 0;
/// `kIOHIDParamConnectType`
const HID_PARAM_CONNECT_TYPE: u32 = 1;
/// `kIOHIDCapsLockState`
const HID_CAPS_LOCK_STATE: c_int = 1;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    static mach_task_self_: MachPort;

    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingService(main_port: MachPort, matching: *mut c_void) -> IoObject;
    fn IOServiceOpen(
        service: IoObject,
        owning_task: MachPort,
        kind: u32,
        connect: *mut IoObject,
    ) -> KernReturn;
    fn IOServiceClose(connect: IoObject) -> KernReturn;
    fn IOObjectRelease(object: IoObject) -> KernReturn;
    fn IOHIDGetModifierLockState(handle: IoObject, selector: c_int, state: *mut bool) -> KernReturn;
    fn IOHIDSetModifierLockState(handle: IoObject, selector: c_int, state: bool) -> KernReturn;
}

/// An open connection to the IOHIDSystem service, closed on drop
struct HidConnection(IoObject);

impl HidConnection {
    fn open() -> Result<Self, ActionError> {
        let mut connect: IoObject = 0;
        // SAFETY: the class name is a NUL-terminated literal; the matching
        // dictionary is consumed by IOServiceGetMatchingService.
        unsafe {
            let matching = IOServiceMatching(c"IOHIDSystem".as_ptr());
            let service = IOServiceGetMatchingService(MAIN_PORT_DEFAULT, matching);
            if service == 0 {
                return Err(ActionError::HidServiceMissing);
            }
            let kr = IOServiceOpen(service, mach_task_self_, HID_PARAM_CONNECT_TYPE, &mut connect);
            IOObjectRelease(service);
            if kr != KERN_SUCCESS {
                return Err(ActionError::IoKit {
                    call: "IOServiceOpen",
                    code: kr,
                });
            }
        }
        Ok(Self(connect))
    }
}

impl Drop for HidConnection {
    fn drop(&mut self) {
        // SAFETY: self.0 came from a successful IOServiceOpen
        unsafe {
            IOServiceClose(self.0);
        }
    }
}

/// Posts synthesized keys and reads/writes Caps Lock through the OS
#[derive(Debug, Default)]
pub struct SystemBackend;

impl ActionBackend for SystemBackend {
    fn lock_state(&mut self) -> Result<bool, ActionError> {
        let conn = HidConnection::open()?;
        let mut state = false;
        // SAFETY: conn is an open IOHIDSystem connection
        let kr = unsafe { IOHIDGetModifierLockState(conn.0, HID_CAPS_LOCK_STATE, &mut state) };
        if kr != KERN_SUCCESS {
            return Err(ActionError::IoKit {
                call: "IOHIDGetModifierLockState",
                code: kr,
            });
        }
        Ok(state)
    }

    fn set_lock_state(&mut self, on: bool) -> Result<(), ActionError> {
        let conn = HidConnection::open()?;
        // SAFETY: conn is an open IOHIDSystem connection
        let kr = unsafe { IOHIDSetModifierLockState(conn.0, HID_CAPS_LOCK_STATE, on) };
        if kr != KERN_SUCCESS {
            return Err(ActionError::IoKit {
                call: "IOHIDSetModifierLockState",
                code: kr,
            });
        }
        Ok(())
    }

    fn post_key_press(&mut self, code: KeyCode) -> Result<(), ActionError> {
        let down = synthesize(code, true)?;
        let up = synthesize(code, false)?;
        down.post(CGEventTapLocation::HID);
        up.post(CGEventTapLocation::HID);
        Ok(())
    }
}

/// Build one marked key event without posting it
fn synthesize(code: KeyCode, down: bool) -> Result<CGEvent, ActionError> {
    let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| ActionError::EventSource)?;
    let event = CGEvent::new_keyboard_event(source, code as CGKeyCode, down)
        .map_err(|_| ActionError::Synthesis { code })?;
    event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, SYNTHETIC_MARKER);
    Ok(event)
}
