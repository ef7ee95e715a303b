//! Error types for pass building.
//!
//! This module defines the [`enum@Error`] enum covering every recoverable
//! failure while assembling a pass archive: I/O on the staging area, zip
//! writing, descriptor encoding, entry-name validation and the external
//! signer.
//!
//! Calling [`crate::PassBuilder::create_manifest`] twice is not represented
//! here. That is caller misuse and panics instead.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for pass building operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// A failed add means the entry is not reliably present; retry it or abandon the build.
///
/// # Examples
///
/// ```no_run
/// use pkpass::{Descriptor, Error, PassBuilder};
///
/// let mut builder = PassBuilder::new(Descriptor::File("pass.json".into()))?;
/// match builder.add_file("icon.png", None) {
///     Ok(()) => {}
///     Err(Error::Io(e)) => eprintln!("Cannot read asset: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok::<(), pkpass::Error>(())
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when creating the staging directory, staging an entry,
    /// reading a byte source or reading the archive back.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The pass descriptor could not be encoded or is not valid JSON.
    #[error("Invalid pass descriptor: {0}")]
    Descriptor(String),

    /// The entry name is not a safe archive-relative path.
    #[error("Invalid entry name {0:?}")]
    InvalidEntryName(String),

    /// The entry name is reserved for the manifest or signature and cannot be hashed.
    #[error("Entry name {0:?} is reserved")]
    ReservedEntryName(String),

    /// A hashed entry was added after the manifest was written.
    #[error("Manifest already created; cannot add hashed entry {0:?}")]
    Finalized(String),

    /// The external signer failed or produced no signature.
    #[error("Signing failed: {0}")]
    Signing(String),
}
