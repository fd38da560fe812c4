//! Key code and modifier flag definitions
//!
//! Provides the macOS virtual key codes used by the remapper, the
//! name table accepted by `--custom-key`, and a platform-neutral view
//! of the CGEventFlags bit set.

/// A macOS virtual key code (`kVK_*`)
pub type KeyCode = u16;

/// Virtual key codes from `HIToolbox/Events.h`
pub mod codes {
    use super::KeyCode;

    pub const RETURN: KeyCode = 0x24;
    pub const TAB: KeyCode = 0x30;
    pub const SPACE: KeyCode = 0x31;
    pub const DELETE: KeyCode = 0x33;
    pub const ESCAPE: KeyCode = 0x35;
    pub const F5: KeyCode = 0x60;
    pub const F6: KeyCode = 0x61;
    pub const F7: KeyCode = 0x62;
    pub const F3: KeyCode = 0x63;
    pub const F8: KeyCode = 0x64;
    pub const F9: KeyCode = 0x65;
    pub const F11: KeyCode = 0x67;
    pub const F10: KeyCode = 0x6D;
    pub const F12: KeyCode = 0x6F;
    pub const HOME: KeyCode = 0x73;
    pub const PAGE_UP: KeyCode = 0x74;
    pub const FORWARD_DELETE: KeyCode = 0x75;
    pub const F4: KeyCode = 0x76;
    pub const END: KeyCode = 0x77;
    pub const F2: KeyCode = 0x78;
    pub const PAGE_DOWN: KeyCode = 0x79;
    pub const F1: KeyCode = 0x7A;
    pub const LEFT_ARROW: KeyCode = 0x7B;
    pub const RIGHT_ARROW: KeyCode = 0x7C;
    pub const DOWN_ARROW: KeyCode = 0x7D;
    pub const UP_ARROW: KeyCode = 0x7E;

    /// F18: no physical key on Apple keyboards, used as the neutral trigger
    pub const F18: KeyCode = 0x4F;
}

/// Highest numeric code accepted by `--custom-key`
pub const MAX_CUSTOM_CODE: KeyCode = 127;

/// Resolve a `--custom-key` argument into a virtual key code.
///
/// Names are matched case-insensitively; anything else must be a
/// decimal number in `0..=127`.
pub fn parse_key_name(input: &str) -> Option<KeyCode> {
    let code = match input.to_ascii_lowercase().as_str() {
        "space" => codes::SPACE,
        "return" | "enter" => codes::RETURN,
        "tab" => codes::TAB,
        "delete" => codes::DELETE,
        "backspace" => codes::FORWARD_DELETE,
        "escape" | "esc" => codes::ESCAPE,
        "f1" => codes::F1,
        "f2" => codes::F2,
        "f3" => codes::F3,
        "f4" => codes::F4,
        "f5" => codes::F5,
        "f6" => codes::F6,
        "f7" => codes::F7,
        "f8" => codes::F8,
        "f9" => codes::F9,
        "f10" => codes::F10,
        "f11" => codes::F11,
        "f12" => codes::F12,
        "up" => codes::UP_ARROW,
        "down" => codes::DOWN_ARROW,
        "left" => codes::LEFT_ARROW,
        "right" => codes::RIGHT_ARROW,
        "home" => codes::HOME,
        "end" => codes::END,
        "pageup" | "page-up" => codes::PAGE_UP,
        "pagedown" | "page-down" => codes::PAGE_DOWN,
        _ => {
            let numeric: KeyCode = input.parse().ok()?;
            if numeric > MAX_CUSTOM_CODE {
                return None;
            }
            numeric
        }
    };
    Some(code)
}

/// Help text listing everything `parse_key_name` understands
pub const KEY_NAME_HELP: &str = "\
Supported key names for --custom-key:
  space, return, enter, tab, delete, backspace, escape, esc
  f1, f2, f3, f4, f5, f6, f7, f8, f9, f10, f11, f12
  up, down, left, right
  home, end, pageup, pagedown
  Or use numeric key codes (0-127)";

bitflags::bitflags! {
    /// Modifier flag set with the same bit layout as `CGEventFlags`.
    ///
    /// Unnamed bits (device-dependent side flags, numeric pad) are kept
    /// as they are so they can be handed back to the event untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierFlags: u64 {
        const NONE = 0;

        /// Caps Lock state bit
        const ALPHA_SHIFT = 0x0001_0000;
        const SHIFT = 0x0002_0000;
        const CONTROL = 0x0004_0000;
        const OPTION = 0x0008_0000;
        const COMMAND = 0x0010_0000;

        /// The `fn` layer
        const FUNCTION = 0x0080_0000;
    }
}

impl ModifierFlags {
    /// Flags the hyper overlay owns; everything else passes through
    pub const MANAGED: Self = Self::SHIFT
        .union(Self::CONTROL)
        .union(Self::OPTION)
        .union(Self::COMMAND);

    /// Bits outside the managed modifier set
    pub const fn unmanaged(self) -> Self {
        self.difference(Self::MANAGED)
    }
}

#[cfg(target_os = "macos")]
mod cg {
    use core_graphics::event::CGEventFlags;

    use super::ModifierFlags;

    impl From<CGEventFlags> for ModifierFlags {
        fn from(flags: CGEventFlags) -> Self {
            ModifierFlags::from_bits_retain(flags.bits())
        }
    }

    impl From<ModifierFlags> for CGEventFlags {
        fn from(flags: ModifierFlags) -> Self {
            CGEventFlags::from_bits_truncate(flags.bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys() {
        assert_eq!(parse_key_name("escape"), Some(codes::ESCAPE));
        assert_eq!(parse_key_name("ESC"), Some(codes::ESCAPE));
        assert_eq!(parse_key_name("Enter"), Some(codes::RETURN));
        assert_eq!(parse_key_name("backspace"), Some(codes::FORWARD_DELETE));
        assert_eq!(parse_key_name("delete"), Some(codes::DELETE));
        assert_eq!(parse_key_name("f12"), Some(codes::F12));
        assert_eq!(parse_key_name("page-down"), Some(codes::PAGE_DOWN));
        assert_eq!(parse_key_name("pageup"), Some(codes::PAGE_UP));
    }

    #[test]
    fn test_numeric_keys() {
        assert_eq!(parse_key_name("0"), Some(0));
        assert_eq!(parse_key_name("53"), Some(codes::ESCAPE));
        assert_eq!(parse_key_name("127"), Some(127));
        assert_eq!(parse_key_name("128"), None);
        assert_eq!(parse_key_name("-1"), None);
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(parse_key_name("zz"), None);
        assert_eq!(parse_key_name(""), None);
    }

    #[test]
    fn test_unmanaged_keeps_function_layer() {
        let flags = ModifierFlags::FUNCTION | ModifierFlags::SHIFT | ModifierFlags::COMMAND;
        assert_eq!(flags.unmanaged(), ModifierFlags::FUNCTION);
        assert_eq!(ModifierFlags::NONE.unmanaged(), ModifierFlags::NONE);
    }

    #[test]
    fn test_unmanaged_keeps_unnamed_bits() {
        // NX_DEVICELCMDKEYMASK, the left-command side bit
        let side = ModifierFlags::from_bits_retain(0x0000_0008);
        let flags = side | ModifierFlags::COMMAND;
        assert_eq!(flags.unmanaged(), side);
        assert_eq!(flags.unmanaged().bits(), 0x0000_0008);
    }
}
