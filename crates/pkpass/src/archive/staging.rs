//! Staging area for entry payloads.
//!
//! Each builder owns one private temporary directory. Entry bytes are written
//! there before being copied into the archive, and the archive file itself
//! lives alongside them. The directory is removed when the [`Staging`] value
//! is dropped or [`Staging::close`]d.

use crate::Result;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STAGING_PREFIX: &str = "pkpass-";

/// Private temporary directory holding staged entries and the archive file.
pub struct Staging {
    dir: TempDir,
    /// Counter for unique staged file names
    next_id: usize,
}

/// A staged payload on disk, removed when dropped.
pub struct StagedEntry {
    path: PathBuf,
}

impl Staging {
    /// Create a staging directory inside `parent`, or the system temp directory.
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        log::debug!("Created staging directory {}", dir.path().display());

        Ok(Self { dir, next_id: 0 })
    }

    /// Root of the staging directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `data` to a fresh staged file.
    pub fn stage(&mut self, data: &[u8]) -> Result<StagedEntry> {
        self.next_id += 1;
        let path = self.dir.path().join(format!("entry-{:05}", self.next_id));

        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()?;

        Ok(StagedEntry { path })
    }

    /// Remove the staging directory now.
    ///
    /// A directory that is already gone is not an error.
    pub fn close(self) -> Result<()> {
        match self.dir.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl StagedEntry {
    /// Open the staged file for reading.
    pub fn open(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedEntry {
    fn drop(&mut self) {
        // Missing files are fine; the whole directory may already be gone.
        let _ = fs::remove_file(&self.path);
    }
}
