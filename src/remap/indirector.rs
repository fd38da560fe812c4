//! Caps Lock → F18 indirection through `hidutil`
//!
//! macOS delays and latches Caps Lock in the HID driver. Aliasing its
//! usage to F18 with a `UserKeyMapping` property hands us a plain key
//! with none of that behaviour. The property outlives the process, so
//! it has to be cleared again on exit.

use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::info;

const HIDUTIL: &str = "/usr/bin/hidutil";

/// HID usage page 0x07 (keyboard), usage 0x39 (Caps Lock)
pub const CAPS_LOCK_USAGE: u64 = 0x7_0000_0039;
/// HID usage page 0x07 (keyboard), usage 0x6D (F18)
pub const F18_USAGE: u64 = 0x7_0000_006D;

/// One hardware usage aliased to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemapSpec {
    #[serde(rename = "HIDKeyboardModifierMappingSrc")]
    pub source: u64,
    #[serde(rename = "HIDKeyboardModifierMappingDst")]
    pub target: u64,
}

impl RemapSpec {
    /// Caps Lock delivered as F18
    pub const fn caps_lock_to_f18() -> Self {
        Self {
            source: CAPS_LOCK_USAGE,
            target: F18_USAGE,
        }
    }
}

#[derive(Serialize)]
struct UserKeyMapping<'a> {
    #[serde(rename = "UserKeyMapping")]
    mapping: &'a [RemapSpec],
}

/// Errors from setting the HID property
#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("failed to encode property payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to run /usr/bin/hidutil: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("/usr/bin/hidutil exited with {0}")]
    CommandFailed(std::process::ExitStatus),
}

/// Sink for `hidutil property --set` payloads
pub trait HidProperty: Send + Sync {
    fn set(&self, payload: &str) -> Result<(), RemapError>;
}

/// Runs `/usr/bin/hidutil` and waits for it to finish
#[derive(Debug, Default)]
pub struct Hidutil;

impl HidProperty for Hidutil {
    fn set(&self, payload: &str) -> Result<(), RemapError> {
        let status = Command::new(HIDUTIL)
            .args(["property", "--set", payload])
            .stdout(Stdio::null())
            .status()
            .map_err(RemapError::Spawn)?;

        if !status.success() {
            return Err(RemapError::CommandFailed(status));
        }
        Ok(())
    }
}

/// Installs and clears the key indirection
///
/// Never call from inside the event tap callback: both operations block
/// on an external process.
pub struct KeyIndirector {
    spec: RemapSpec,
    property: Box<dyn HidProperty>,
}

impl KeyIndirector {
    pub fn new(spec: RemapSpec, property: Box<dyn HidProperty>) -> Self {
        Self { spec, property }
    }

    /// Indirector backed by the system `hidutil`
    pub fn hidutil(spec: RemapSpec) -> Self {
        Self::new(spec, Box::new(Hidutil))
    }

    /// Alias the source usage to the target usage
    pub fn apply(&self) -> Result<(), RemapError> {
        let payload = Self::payload(&[self.spec])?;
        self.property.set(&payload)?;
        info!(
            source = %format!("{:#x}", self.spec.source),
            target = %format!("{:#x}", self.spec.target),
            "key indirection applied"
        );
        Ok(())
    }

    /// Clear all user key mappings.
    ///
    /// Safe to call any number of times, with or without a prior `apply`.
    pub fn revert(&self) -> Result<(), RemapError> {
        let payload = Self::payload(&[])?;
        self.property.set(&payload)?;
        info!("key indirection reverted");
        Ok(())
    }

    fn payload(mapping: &[RemapSpec]) -> Result<String, RemapError> {
        Ok(serde_json::to_string(&UserKeyMapping { mapping })?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProperty;
    use super::*;

    const CLEARED: &str = r#"{"UserKeyMapping":[]}"#;

    fn create_indirector() -> (KeyIndirector, RecordingProperty) {
        let property = RecordingProperty::default();
        let indirector =
            KeyIndirector::new(RemapSpec::caps_lock_to_f18(), Box::new(property.clone()));
        (indirector, property)
    }

    #[test]
    fn test_apply_payload() {
        let (indirector, property) = create_indirector();
        indirector.apply().unwrap();

        let payloads = property.payloads();
        assert_eq!(payloads.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        let entry = &value["UserKeyMapping"][0];
        assert_eq!(entry["HIDKeyboardModifierMappingSrc"], 0x7_0000_0039u64);
        assert_eq!(entry["HIDKeyboardModifierMappingDst"], 0x7_0000_006Du64);
    }

    #[test]
    fn test_revert_is_idempotent() {
        let (indirector, property) = create_indirector();
        indirector.apply().unwrap();
        for _ in 0..3 {
            indirector.revert().unwrap();
        }

        let payloads = property.payloads();
        assert_eq!(payloads.len(), 4);
        assert!(payloads[1..].iter().all(|p| p == CLEARED));
    }

    #[test]
    fn test_revert_without_apply() {
        let (indirector, property) = create_indirector();
        indirector.revert().unwrap();
        assert_eq!(property.payloads(), vec![CLEARED.to_string()]);
    }

    #[test]
    fn test_failure_is_reported() {
        let property = RecordingProperty {
            fail: true,
            ..Default::default()
        };
        let indirector = KeyIndirector::new(RemapSpec::caps_lock_to_f18(), Box::new(property));
        assert!(matches!(indirector.apply(), Err(RemapError::Spawn(_))));
        assert!(indirector.revert().is_err());
    }
}
