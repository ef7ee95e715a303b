//! Archive handling module.
//!
//! Provides the zip container a pass is written into and the staging area
//! payloads pass through on the way there.

pub mod staging;
pub mod writer;

pub use staging::{StagedEntry, Staging};
pub use writer::{validate_entry_name, CompressionLevel, PassArchive};
