//! Digest table for `manifest.json`
//!
//! Keys are lower-cased entry paths; values are hex SHA-1 digests of the
//! exact bytes written for that entry.

use crate::Result;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Hash data with SHA-1 and return the lowercase hex digest.
///
/// SHA-1 is what the pass manifest format requires. Changing the algorithm
/// produces manifests that wallet applications reject.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Table of entry digests that becomes `manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestTable {
    /// Lower-cased entry name -> hex SHA-1
    digests: BTreeMap<String, String>,
}

impl DigestTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `data` and record it under the lower-cased `name`.
    ///
    /// A later insert for the same lower-cased name replaces the earlier digest.
    pub fn insert(&mut self, name: &str, data: &[u8]) -> &str {
        self.insert_digest(name, sha1_hex(data))
    }

    /// Record a precomputed digest under the lower-cased `name`
    pub fn insert_digest(&mut self, name: &str, digest: String) -> &str {
        let key = name.to_lowercase();
        self.digests.insert(key.clone(), digest);
        &self.digests[&key]
    }

    /// Look up the digest for `name`, ignoring case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.digests.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Check whether `name` has a recorded digest, ignoring case
    pub fn contains(&self, name: &str) -> bool {
        self.digests.contains_key(&name.to_lowercase())
    }

    /// Iterate over `(key, digest)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.digests.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether no digests are recorded
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Render the table as a flat JSON object
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = serde_json::to_vec_pretty(&self.digests)?;
        buf.push(b'\n');
        Ok(buf)
    }
}
