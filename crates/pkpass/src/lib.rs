pub mod archive;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod signer;

pub use archive::{CompressionLevel, PassArchive};
pub use builder::{BuilderState, PassBuilder, PassOptions};
pub use descriptor::Descriptor;
pub use error::Error;
pub use manifest::{sha1_hex, DigestTable};
pub use signer::{CommandSigner, ManifestSigner};

pub type Result<T> = std::result::Result<T, Error>;

/// Entry name of the pass descriptor.
pub const PASS_JSON: &str = "pass.json";

/// Entry name of the digest manifest.
pub const MANIFEST_JSON: &str = "manifest.json";

/// Entry name of the detached manifest signature.
pub const SIGNATURE: &str = "signature";
