//! Key codes and modifier flags shared by the interceptor, the
//! trigger state machine and the CLI.

pub mod keys;

pub use keys::{codes, parse_key_name, KeyCode, ModifierFlags};
