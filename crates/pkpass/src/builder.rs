//! Pass builder API
//!
//! Accumulates pass entries, writes `manifest.json` once, and hands back the
//! archive bytes before and after the signature is attached.
//!
//! # Lifecycle
//!
//! 1. [`PassBuilder::new`] writes `pass.json` (hashed)
//! 2. `add_*` calls write assets and localizations
//! 3. [`PassBuilder::create_manifest`] writes `manifest.json` and returns the unsigned archive
//! 4. [`PassBuilder::add_unhashed`] attaches the externally produced `signature`
//! 5. [`PassBuilder::archived_data`] returns the finished pass
//!
//! [`PassBuilder::seal`] runs steps 3 to 5 with a [`ManifestSigner`].
//!
//! A builder is not synchronized. Share one across threads only behind a
//! caller-owned lock.

use crate::archive::{validate_entry_name, CompressionLevel, PassArchive, Staging};
use crate::descriptor::Descriptor;
use crate::manifest::DigestTable;
use crate::signer::ManifestSigner;
use crate::{Error, Result, MANIFEST_JSON, PASS_JSON, SIGNATURE};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of the archive inside the staging directory.
const ARCHIVE_FILE_NAME: &str = "pass.pkpass";

/// Options applied when a [`PassBuilder`] is created.
///
/// # Example
///
/// ```no_run
/// use pkpass::{Descriptor, PassBuilder, PassOptions};
///
/// let options = PassOptions::new()
///     .compression_level(9)
///     .temp_dir("/var/tmp");
/// let builder = PassBuilder::with_options(Descriptor::File("pass.json".into()), &options)?;
/// # Ok::<(), pkpass::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    compression_level: CompressionLevel,
    temp_dir: Option<PathBuf>,
}

impl PassOptions {
    /// Create options with default compression and the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ZIP compression level for the archive (0-9).
    ///
    /// 0 = stored, 9 = maximum compression. Default is 6.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Create the staging directory inside `path` instead of the system temp directory.
    pub fn temp_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.temp_dir = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Whether the manifest has been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Entries may be added and the manifest created.
    Open,
    /// `manifest.json` is written. Only unhashed entries may follow.
    Finalized,
}

/// Builds a pass archive.
///
/// # Example
///
/// ```no_run
/// use pkpass::{Descriptor, PassBuilder};
/// use serde_json::json;
///
/// let mut builder = PassBuilder::new(Descriptor::from(json!({
///     "formatVersion": 1,
///     "passTypeIdentifier": "pass.com.example.ticket",
///     "serialNumber": "E5982H-I2",
/// })))?;
/// builder.add_file("icon.png", None)?;
/// builder.add_data_direct("en.lproj/pass.strings", b"\"EVENT\" = \"Event\";")?;
///
/// let unsigned = builder.create_manifest()?;
/// let signature = std::fs::read("signature.der")?;
/// builder.add_unhashed("signature", &signature)?;
/// let pkpass = builder.archived_data()?;
/// # Ok::<(), pkpass::Error>(())
/// ```
pub struct PassBuilder {
    /// Declared before `staging` so the zip writer drops before its directory does
    archive: PassArchive,
    digests: DigestTable,
    state: BuilderState,
    manifest: Option<Vec<u8>>,
    staging: Staging,
}

impl PassBuilder {
    /// Create a builder with default options.
    ///
    /// See [`PassBuilder::with_options`].
    pub fn new(descriptor: impl Into<Descriptor>) -> Result<Self> {
        Self::with_options(descriptor, &PassOptions::default())
    }

    /// Create a builder and write `pass.json` from `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The descriptor cannot be encoded or is not valid JSON
    /// - The staging directory cannot be created
    /// - The archive cannot be opened or `pass.json` cannot be written
    ///
    /// Nothing is left on disk when construction fails.
    pub fn with_options(
        descriptor: impl Into<Descriptor>,
        options: &PassOptions,
    ) -> Result<Self> {
        let pass_json = descriptor.into().to_bytes()?;

        let staging = Staging::new(options.temp_dir.as_deref())?;
        Self::in_staging(staging, &pass_json, options)
    }

    /// Open the archive inside `staging` and write `pass.json`.
    ///
    /// `staging` is dropped, and its directory removed, on every error path.
    fn in_staging(staging: Staging, pass_json: &[u8], options: &PassOptions) -> Result<Self> {
        let archive = PassArchive::create(
            staging.path().join(ARCHIVE_FILE_NAME),
            options.compression_level,
        )?;

        let mut builder = Self {
            archive,
            digests: DigestTable::new(),
            state: BuilderState::Open,
            manifest: None,
            staging,
        };
        builder.add_data(PASS_JSON, pass_json)?;

        Ok(builder)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Digests recorded so far.
    pub fn digests(&self) -> &DigestTable {
        &self.digests
    }

    /// The `manifest.json` bytes, once [`PassBuilder::create_manifest`] has succeeded.
    pub fn manifest(&self) -> Option<&[u8]> {
        self.manifest.as_deref()
    }

    /// Names of all archive entries in write order.
    pub fn entry_names(&self) -> &[String] {
        self.archive.entry_names()
    }

    /// Location of the archive file.
    ///
    /// The file is a complete zip after [`PassBuilder::create_manifest`] or
    /// [`PassBuilder::archived_data`], until the next add. It is deleted with the builder.
    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    /// Read a file and add it as a hashed entry.
    ///
    /// The entry is named `name`, or the file's own name when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, plus any error from
    /// [`PassBuilder::add_data`].
    pub fn add_file(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<()> {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidEntryName(path.display().to_string()))?,
        };

        let data = fs::read(path)?;
        self.add_data(&name, &data)
    }

    /// Add `data` as a hashed entry, staged through the staging directory.
    ///
    /// Records `name.to_lowercase() -> sha1_hex(data)`. Re-adding an exact
    /// name replaces both the archive entry and its digest, and a later add
    /// of a name differing only in case replaces the digest. The digest table
    /// is untouched if the write fails.
    ///
    /// # Errors
    ///
    /// - [`Error::Finalized`] after the manifest was created
    /// - [`Error::InvalidEntryName`] / [`Error::ReservedEntryName`] for unusable names
    /// - [`Error::Io`] / [`Error::Zip`] if staging or the archive write fails
    pub fn add_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.check_hashable(name)?;
        self.write_staged(name, data)?;
        self.digests.insert(name, data);
        Ok(())
    }

    /// Add `data` as an entry that is kept out of the manifest.
    ///
    /// This is how the `signature` entry is attached, and it remains allowed
    /// after [`PassBuilder::create_manifest`].
    pub fn add_unhashed(&mut self, name: &str, data: &[u8]) -> Result<()> {
        validate_entry_name(name)?;
        if name.eq_ignore_ascii_case(MANIFEST_JSON) {
            return Err(Error::ReservedEntryName(name.to_string()));
        }
        self.write_staged(name, data)
    }

    /// Add `data` as a hashed entry written straight into the archive without staging.
    ///
    /// Intended for nested names such as `en.lproj/pass.strings`. Digest
    /// handling and errors match [`PassBuilder::add_data`].
    pub fn add_data_direct(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.check_hashable(name)?;
        self.archive.write_entry(name, data)?;
        self.digests.insert(name, data);
        Ok(())
    }

    /// Add every regular file under `dir` as a hashed entry.
    ///
    /// Entries are named by their `/`-joined path relative to `dir`. Top-level
    /// files go through [`PassBuilder::add_data`] and nested ones through
    /// [`PassBuilder::add_data_direct`]. Skipped:
    /// - `pass.json`, `manifest.json` and `signature` at the top level, in any case
    /// - hidden files and directories (including `.DS_Store`)
    /// - symlinks and non-UTF-8 paths
    ///
    /// Returns the number of entries added.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        if self.state == BuilderState::Finalized {
            return Err(Error::Finalized(dir.display().to_string()));
        }

        let mut added = 0;
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(io::Error::other(format!("Failed to walk directory: {}", e)))
            })?;
            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }
            if file_type.is_symlink() {
                log::warn!("Skipping symlink {}", path.display());
                continue;
            }

            let Some(name) = relative_entry_name(dir, path) else {
                log::warn!("Skipping non UTF-8 path {}", path.display());
                continue;
            };
            if [PASS_JSON, MANIFEST_JSON, SIGNATURE]
                .iter()
                .any(|reserved| name.eq_ignore_ascii_case(reserved))
            {
                log::debug!("Skipping reserved file {}", path.display());
                continue;
            }

            let data = fs::read(path)?;
            if name.contains('/') {
                self.add_data_direct(&name, &data)?;
            } else {
                self.add_data(&name, &data)?;
            }
            added += 1;
        }

        Ok(added)
    }

    /// Write `manifest.json` and return the unsigned archive.
    ///
    /// Moves the builder to [`BuilderState::Finalized`]. The manifest maps
    /// every hashed entry's lower-cased name to its digest and never lists
    /// itself or unhashed entries.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same builder, including after a
    /// failed first call. Rebuild the pass instead.
    pub fn create_manifest(&mut self) -> Result<Vec<u8>> {
        self.finalize()?;
        self.archive.to_bytes()
    }

    /// Return the complete archive as currently written.
    pub fn archived_data(&mut self) -> Result<Vec<u8>> {
        self.archive.to_bytes()
    }

    /// Create the manifest, sign it with `signer`, attach the signature and
    /// return the finished pass.
    ///
    /// # Panics
    ///
    /// Panics if the manifest was already created.
    pub fn seal<S: ManifestSigner + ?Sized>(&mut self, signer: &S) -> Result<Vec<u8>> {
        let manifest = self.finalize()?;
        let signature = signer.sign(&manifest)?;
        self.add_unhashed(SIGNATURE, &signature)?;
        log::info!("Attached {} byte signature", signature.len());
        self.archived_data()
    }

    /// Write the current archive to `dest`, creating parent directories.
    pub fn write_to(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        let bytes = self.archived_data()?;

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(dest, bytes)?;
        Ok(())
    }

    /// Release the archive and remove the staging directory now.
    ///
    /// Dropping the builder does the same but ignores cleanup errors.
    pub fn close(self) -> Result<()> {
        let PassBuilder { archive, staging, .. } = self;
        drop(archive);
        staging.close()
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.state == BuilderState::Finalized {
            panic!("create_manifest called more than once on the same PassBuilder");
        }
        self.state = BuilderState::Finalized;

        let manifest = self.digests.build()?;
        self.write_staged(MANIFEST_JSON, &manifest)?;
        log::info!("Created manifest with {} entries", self.digests.len());

        self.manifest = Some(manifest.clone());
        Ok(manifest)
    }

    fn check_hashable(&self, name: &str) -> Result<()> {
        if self.state == BuilderState::Finalized {
            return Err(Error::Finalized(name.to_string()));
        }
        validate_entry_name(name)?;
        if name.eq_ignore_ascii_case(MANIFEST_JSON) || name.eq_ignore_ascii_case(SIGNATURE) {
            return Err(Error::ReservedEntryName(name.to_string()));
        }
        Ok(())
    }

    fn write_staged(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let staged = self.staging.stage(data)?;
        let mut file = staged.open()?;
        self.archive.write_entry_from(name, &mut file)?;
        Ok(())
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

/// `/`-joined path of `path` relative to `root`, or `None` if not valid UTF-8.
fn relative_entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}
