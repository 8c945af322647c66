//! Core dispatch engine for byte-oriented compression codecs.
//!
//! This crate owns the "splice engine": given a codec, a direction, and a
//! pair of endpoints (files or arbitrary `Read`/`Write` callbacks), it picks
//! the cheapest capability tier the codec supports — native splice,
//! memory-mapped one-shot, incremental stream, or one-shot buffer — and moves
//! bytes through it. Concrete codec backends live in sibling crates
//! (`squash-codec-gzip`, `squash-codec-lz4`, ...) and register themselves
//! into [`registry`] at start-up.

mod accumulator;
mod codec;
mod dispatch;
mod env;
mod error;
mod file;
mod limiter;
mod options;
mod registry;
mod stream;

mod api;

pub use codec::{Capabilities, Codec, CodecDescriptor, Direction};
pub use env::{mmap_preference, MmapPreference};
pub use error::{Result, SquashError};
pub use options::{downcast_or_default, CodecOptions, CompressionLevel};
pub use registry::{register, registered_names};
pub use stream::{ProcessResult, StreamAdaptor};

pub use api::{
    splice, splice_codec, splice_codec_with_options, splice_custom_codec_with_options,
    splice_with_options,
};

/// Looks up a codec by name in the process-wide registry. Thin re-export so
/// downstream crates don't need `squash_core::registry` as a separate import
/// path for the one function they typically need.
pub fn lookup(name: &str) -> Result<CodecDescriptor> {
    registry::lookup(name)
}
