//! Pass manifest generation.
//!
//! This module provides functionality to:
//! - Hash entry content with the format's fixed digest
//! - Track the digest of every hashed archive entry
//! - Serialize the table as `manifest.json`
//!
//! # Overview
//!
//! A pass archive must contain a `manifest.json` listing the SHA-1 of every
//! payload entry. The manifest never lists itself or the `signature` entry.
//! [`DigestTable`] accumulates the digests and renders the manifest.
//!
//! # manifest.json Structure
//!
//! | Key | Value |
//! |-----|-------|
//! | lower-cased entry path, e.g. `en.lproj/pass.strings` | lowercase hex SHA-1 of the entry bytes |
//!
//! # Examples
//!
//! ```
//! use pkpass::manifest::DigestTable;
//!
//! let mut table = DigestTable::new();
//! table.insert("Icon.png", b"PNG_DATA");
//! let manifest = table.build()?;
//! assert!(String::from_utf8(manifest).unwrap().contains("\"icon.png\""));
//! # Ok::<(), pkpass::Error>(())
//! ```

pub mod digest_table;

pub use digest_table::{sha1_hex, DigestTable};
