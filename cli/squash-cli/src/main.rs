//! `squash-rs`: a small command-line front end over the splice engine in
//! `squash-core`, used to exercise `splice` end to end against real files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use squash_core::{CompressionLevel, Direction, Result};

/// Compress or decompress a file through a named codec.
#[derive(Debug, Parser)]
#[command(name = "squash-rs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compress `input` into `output` using the named codec.
    Compress {
        /// Codec name: gzip, lz4, brotli, snappy, or zstd.
        #[arg(short, long)]
        codec: String,
        /// Compression level, 0 (fastest) through 9 (best). Codec-specific
        /// backends interpret this on their own scale.
        #[arg(short, long, default_value_t = 6)]
        level: u8,
        /// Caps the number of uncompressed bytes read from `input`; 0 means
        /// "until end of file".
        #[arg(short, long, default_value_t = 0)]
        budget: u64,
        input: PathBuf,
        output: PathBuf,
    },
    /// Decompress `input` into `output` using the named codec.
    Decompress {
        #[arg(short, long)]
        codec: String,
        /// Caps the number of decompressed bytes written to `output`; 0 means
        /// "until the codec signals end of stream".
        #[arg(short, long, default_value_t = 0)]
        budget: u64,
        input: PathBuf,
        output: PathBuf,
    },
    /// List every codec registered at start-up.
    List,
}

fn register_codecs() {
    squash_codec_gzip::register();
    squash_codec_brotli::register();
    squash_codec_lz4::register();
    squash_codec_snappy::register();
    squash_codec_zstd::register();
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    register_codecs();

    let cli = Cli::parse();
    match cli.command {
        Command::Compress {
            codec,
            level,
            budget,
            input,
            output,
        } => {
            let options = CompressionLevel::new(level);
            squash_core::splice_with_options(
                &codec,
                Direction::Compress,
                &output,
                &input,
                budget,
                Some(&options as &dyn squash_core::CodecOptions),
            )?;
        }
        Command::Decompress {
            codec,
            budget,
            input,
            output,
        } => {
            squash_core::splice(&codec, Direction::Decompress, &output, &input, budget)?;
        }
        Command::List => {
            for name in squash_core::registered_names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
