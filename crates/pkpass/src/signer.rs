//! Manifest signing seam.
//!
//! The pass format requires a detached PKCS#7 signature of `manifest.json`
//! stored as the `signature` entry. This crate does no cryptography itself:
//! a [`ManifestSigner`] receives the manifest bytes and hands back the raw
//! signature, which is embedded verbatim.
//!
//! # Examples
//!
//! ```no_run
//! use pkpass::{CommandSigner, Descriptor, PassBuilder};
//! use serde_json::json;
//!
//! let signer = CommandSigner::new("openssl").args([
//!     "smime", "-sign", "-binary", "-outform", "DER",
//!     "-signer", "cert.pem", "-inkey", "key.pem", "-certfile", "wwdr.pem",
//! ]);
//!
//! let mut builder = PassBuilder::new(Descriptor::from(json!({"formatVersion": 1})))?;
//! let pkpass = builder.seal(&signer)?;
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::{Error, Result};
use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Produces the detached signature of a pass manifest.
pub trait ManifestSigner {
    /// Sign `manifest` and return the raw signature bytes.
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>>;
}

impl<F> ManifestSigner for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>>,
{
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>> {
        self(manifest)
    }
}

/// Signs by running an external program.
///
/// The manifest is written to the program's stdin and its stdout is taken as
/// the signature.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandSigner {
    /// Create a signer that runs `program` with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl ManifestSigner for CommandSigner {
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>> {
        let program = self.program.to_string_lossy().into_owned();
        log::debug!("Signing manifest with {}", program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Signing(format!("Failed to run {}: {}", program, e)))?;

        let stdin = child.stdin.take();
        // Feed stdin on a separate thread so a signer that writes before
        // reading everything cannot deadlock on a full pipe.
        let output = std::thread::scope(|scope| -> Result<_> {
            let feeder = scope.spawn(move || -> std::io::Result<()> {
                match stdin {
                    Some(mut stdin) => stdin.write_all(manifest),
                    None => Ok(()),
                }
            });
            let output = child.wait_with_output()?;
            match feeder.join() {
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                Err(_) => return Err(Error::Signing("stdin writer panicked".into())),
                _ => {}
            }
            Ok(output)
        })?;

        if !output.status.success() {
            return Err(Error::Signing(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Signing(format!("{} produced no signature", program)));
        }

        Ok(output.stdout)
    }
}
