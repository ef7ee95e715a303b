//! Pass descriptor input.
//!
//! The descriptor is the `pass.json` document. It can be supplied as a
//! key-value document, as already-encoded bytes, or as a file on disk.

use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Source of the `pass.json` content.
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// A key-value document, encoded with sorted keys.
    Document(serde_json::Value),
    /// Encoded JSON bytes, stored verbatim.
    Raw(Vec<u8>),
    /// A JSON file, stored verbatim.
    File(PathBuf),
}

impl Descriptor {
    /// Build a [`Descriptor::Document`] from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Descriptor`] if the value cannot be represented as JSON.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Descriptor::Document)
            .map_err(|e| Error::Descriptor(format!("Failed to encode descriptor: {}", e)))
    }

    /// Produce the bytes written as `pass.json`.
    ///
    /// Documents must be JSON objects. Raw and file content must parse as JSON
    /// but is kept byte-for-byte.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Descriptor::Document(value) => {
                if !value.is_object() {
                    return Err(Error::Descriptor(
                        "pass.json must be a JSON object".into(),
                    ));
                }
                serde_json::to_vec(value)
                    .map_err(|e| Error::Descriptor(format!("Failed to encode descriptor: {}", e)))
            }
            Descriptor::Raw(bytes) => {
                Self::check_json(bytes)?;
                Ok(bytes.clone())
            }
            Descriptor::File(path) => {
                let bytes = fs::read(path)?;
                Self::check_json(&bytes)?;
                Ok(bytes)
            }
        }
    }

    fn check_json(bytes: &[u8]) -> Result<()> {
        serde_json::from_slice::<serde_json::Value>(bytes)
            .map(|_| ())
            .map_err(|e| Error::Descriptor(format!("pass.json is not valid JSON: {}", e)))
    }
}

impl From<serde_json::Value> for Descriptor {
    fn from(value: serde_json::Value) -> Self {
        Descriptor::Document(value)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Descriptor {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Descriptor::Document(serde_json::Value::Object(map))
    }
}

impl From<Vec<u8>> for Descriptor {
    fn from(bytes: Vec<u8>) -> Self {
        Descriptor::Raw(bytes)
    }
}

impl From<PathBuf> for Descriptor {
    fn from(path: PathBuf) -> Self {
        Descriptor::File(path)
    }
}
