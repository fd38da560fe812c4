//! OS-level key indirection installed for the lifetime of the process

mod indirector;

#[cfg(test)]
pub(crate) use indirector::testing;
pub use indirector::{KeyIndirector, RemapError, RemapSpec};
