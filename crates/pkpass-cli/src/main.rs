//! Command-line interface for packaging Apple Wallet passes.
//!
//! Packs a pass directory (`pass.json` plus images and `*.lproj`
//! localizations) into a `.pkpass` archive, optionally signing the manifest
//! with an external program such as `openssl smime`.

use clap::Parser;
use pkpass::{CommandSigner, Descriptor, PassBuilder, PassOptions, PASS_JSON};
use pretty_env_logger::formatted_builder;
use std::path::PathBuf;

#[macro_use]
extern crate log;

const DEFAULT_LOG_LEVEL: &str = "pkpass=info,pkpass_cli=info";

#[derive(Parser)]
#[command(name = "pkpass")]
#[command(about = "Apple Wallet pass packaging tool")]
struct Cli {
    /// Pass directory containing pass.json and assets
    input: PathBuf,

    /// Output file (default: <input>.pkpass)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// ZIP compression level (0-9, default: 6)
    /// 0 = stored, 9 = maximum compression
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// Program that reads manifest.json on stdin and writes the signature to stdout
    #[arg(long)]
    signer: Option<PathBuf>,

    /// Argument passed to the signer program (repeatable)
    #[arg(long = "signer-arg", allow_hyphen_values = true, requires = "signer")]
    signer_args: Vec<String>,

    /// Directory for temporary staging files
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut log_builder = formatted_builder();
    log_builder.parse_filters(
        &std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
    );
    log_builder.try_init()?;

    let mut options = PassOptions::new().compression_level(cli.zip_level);
    if let Some(ref temp_dir) = cli.temp_dir {
        options = options.temp_dir(temp_dir);
    }

    let descriptor = Descriptor::File(cli.input.join(PASS_JSON));
    let mut builder = PassBuilder::with_options(descriptor, &options)?;

    let added = builder.add_directory(&cli.input)?;
    info!("Added {} assets from {}", added, cli.input.display());

    match cli.signer {
        Some(ref program) => {
            let signer = CommandSigner::new(program).args(&cli.signer_args);
            builder.seal(&signer)?;
        }
        None => {
            warn!("No signer given; writing an unsigned pass");
            builder.create_manifest()?;
        }
    }

    let output = cli.output.unwrap_or_else(|| cli.input.with_extension("pkpass"));
    builder.write_to(&output)?;
    builder.close()?;

    println!("Packed: {}", output.display());
    Ok(())
}
