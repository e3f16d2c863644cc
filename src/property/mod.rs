use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the property carrying skin textures on a player profile.
pub const TEXTURES_NAME: &str = "textures";

/// PropertyRecord is a versionless name/value/signature triple.
///
/// Records are immutable once built; an update produces a new record.
/// The value is an opaque, already-encoded payload (base64 for textures).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    name: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl PropertyRecord {
    /// Create a signed record (as served by the session service).
    pub fn new(name: impl Into<String>, value: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            signature: Some(signature.into()),
        }
    }

    /// Create a record without signature. Only valid for locally synthesized values.
    pub fn unsigned(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            signature: None,
        }
    }

    /// Textures record, signed when a signature is known.
    pub fn textures(value: impl Into<String>, signature: Option<String>) -> Self {
        Self {
            name: TEXTURES_NAME.to_string(),
            value: value.into(),
            signature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

// Values are large base64 blobs; keep log output readable.
impl fmt::Debug for PropertyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRecord")
            .field("name", &self.name)
            .field("value_len", &self.value.len())
            .field("signed", &self.signature.is_some())
            .finish()
    }
}
