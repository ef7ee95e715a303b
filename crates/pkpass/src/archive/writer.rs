//! Pass archive writing.
//!
//! Wraps a [`ZipWriter`] over a file so entries can be appended one at a time
//! and the archive read back between appends.
//!
//! # Features
//!
//! - Configurable compression via [`CompressionLevel`]
//! - Entry-name validation against absolute and traversing paths
//! - Rewriting an entry under an existing name replaces it
//! - Read-back of a complete archive without closing it for further appends
//!
//! # Examples
//!
//! ```no_run
//! use pkpass::archive::{CompressionLevel, PassArchive};
//!
//! let mut archive = PassArchive::create("out.pkpass", CompressionLevel::DEFAULT)?;
//! archive.write_entry("pass.json", b"{}")?;
//! let bytes = archive.to_bytes()?;
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Deflate level applied to every pass entry, 0 (stored) to 9.
///
/// Pass assets are mostly PNGs that barely shrink, so callers packing large
/// image sets may prefer [`CompressionLevel::NONE`].
///
/// ```
/// use pkpass::archive::CompressionLevel;
///
/// assert_eq!(CompressionLevel::new(12).level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Entries are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Level 6.
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Level 9.
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Values above 9 are clamped.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// The level, 0-9.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.0 as i64))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Check that `name` is a safe archive-relative entry path.
///
/// Rejects empty names, absolute paths, backslashes, NUL bytes, empty
/// segments and `.`/`..` segments.
pub fn validate_entry_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.contains('\0')
        || name
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(Error::InvalidEntryName(name.to_string()));
    }
    Ok(())
}

/// Append-only zip archive backed by a file.
pub struct PassArchive {
    path: PathBuf,
    /// `None` only if a read-back failed after the writer was finished
    writer: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    /// Entry names in write order
    entries: Vec<String>,
}

impl PassArchive {
    /// Create a new, empty archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file already exists or cannot be created.
    pub fn create(path: impl AsRef<Path>, compression_level: CompressionLevel) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self {
            path,
            writer: Some(ZipWriter::new(file)),
            options: compression_level.file_options(),
            entries: Vec::new(),
        })
    }

    /// Location of the archive file.
    ///
    /// The file holds a complete zip after [`PassArchive::to_bytes`] until the next write.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all entries written so far, in order.
    pub fn entry_names(&self) -> &[String] {
        &self.entries
    }

    /// Check whether an entry with exactly this name was written.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }

    /// Write `data` as a new entry named `name`.
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut reader = data;
        self.write_entry_from(name, &mut reader)?;
        Ok(())
    }

    /// Stream the contents of `reader` into an entry named `name`.
    ///
    /// An existing entry with exactly this name is replaced: the archive is
    /// rebuilt without it and the new entry appended. Returns the number of
    /// bytes copied.
    ///
    /// A failed write leaves the archive as it was, so the same name can be
    /// written again.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEntryName`] if `name` fails [`validate_entry_name`]
    /// - [`Error::Zip`] / [`Error::Io`] if the entry cannot be written
    pub fn write_entry_from(&mut self, name: &str, reader: &mut impl Read) -> Result<u64> {
        validate_entry_name(name)?;

        let written = if self.contains(name) {
            let written = self.replace_entry_from(name, reader)?;
            self.entries.retain(|entry| entry != name);
            log::debug!("Replaced archive entry {}", name);
            written
        } else {
            let options = self.options;
            let zip = self.writer_mut()?;
            zip.start_file(name, options)?;
            match io::copy(reader, zip) {
                Ok(written) => written,
                Err(e) => {
                    zip.abort_file()?;
                    return Err(e.into());
                }
            }
        };

        self.entries.push(name.to_string());
        log::debug!("Wrote archive entry {} ({} bytes)", name, written);
        Ok(written)
    }

    /// Read back the complete archive as it stands.
    ///
    /// Writes the central directory, reads the whole file and reopens it so
    /// further entries can be appended.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let zip = self.writer.take().ok_or_else(closed_error)?;
        let mut file = zip.finish()?;

        file.flush()?;
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        self.writer = Some(ZipWriter::new_append(file)?);
        Ok(buf)
    }

    fn writer_mut(&mut self) -> Result<&mut ZipWriter<File>> {
        self.writer.as_mut().ok_or_else(closed_error)
    }

    /// Rebuild the archive beside the current file without `name`, then
    /// append the new content and swap the rebuilt file in.
    fn replace_entry_from(&mut self, name: &str, reader: &mut impl Read) -> Result<u64> {
        let zip = self.writer.take().ok_or_else(closed_error)?;
        let mut file = zip.finish()?;
        file.seek(SeekFrom::Start(0))?;
        let mut source = ZipArchive::new(file)?;

        let rebuilt_path = self.path.with_extension("rebuild");
        let rebuilt = rebuild_without(&mut source, name, &rebuilt_path, self.options, reader);
        let original = source.into_inner();

        match rebuilt {
            Ok((file, written)) => {
                drop(original);
                fs::rename(&rebuilt_path, &self.path)?;
                self.writer = Some(ZipWriter::new_append(file)?);
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&rebuilt_path);
                self.writer = Some(ZipWriter::new_append(original)?);
                Err(e)
            }
        }
    }
}

fn rebuild_without(
    source: &mut ZipArchive<File>,
    name: &str,
    path: &Path,
    options: SimpleFileOptions,
    reader: &mut impl Read,
) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut zip = ZipWriter::new(file);

    for index in 0..source.len() {
        let entry = source.by_index_raw(index)?;
        if entry.name() != name {
            zip.raw_copy_file(entry)?;
        }
    }

    zip.start_file(name, options)?;
    let written = io::copy(reader, &mut zip)?;
    Ok((zip.finish()?, written))
}

fn closed_error() -> Error {
    Error::Io(io::Error::other("archive writer was closed by an earlier failure"))
}
