use std::io::{Read, Write};
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::{Result, SquashError};
use crate::options::CodecOptions;
use crate::stream::StreamAdaptor;

/// Which way bytes flow through a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

bitflags! {
    /// Which of the four capability tiers a codec implements, plus whether it
    /// can report the decompressed size of a buffer without decompressing it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const BUFFER        = 0b0000_0001;
        const STREAM        = 0b0000_0010;
        const NATIVE_SPLICE = 0b0000_0100;
        const KNOWS_UNCOMPRESSED_SIZE = 0b0000_1000;
    }
}

/// The capability-tiered vtable every codec backend implements.
///
/// Each tier is independently optional. A codec only overrides the methods
/// for the tiers it actually supports and reports them via [`Codec::capabilities`];
/// the dispatcher in [`crate::dispatch`] never calls a tier a codec didn't advertise.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Upper bound on compressed output size for `uncompressed_len` input bytes.
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        // Conservative default for codecs that don't override it: assume the
        // worst case is input size plus a small fixed overhead.
        uncompressed_len + (uncompressed_len / 2) + 64
    }

    /// Exact decompressed length of `compressed`, if this codec knows it
    /// without fully decompressing. Only meaningful when
    /// `capabilities().contains(Capabilities::KNOWS_UNCOMPRESSED_SIZE)`.
    fn uncompressed_size(&self, _compressed: &[u8]) -> Option<usize> {
        None
    }

    fn compress_buffer(&self, _input: &[u8], _options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        Err(SquashError::failed(format!("{} does not support one-shot compress", self.name())))
    }

    /// Decompresses `input` into a buffer of capacity `size_hint`.
    ///
    /// `size_hint` is exact when `capabilities()` includes
    /// `KNOWS_UNCOMPRESSED_SIZE` (the dispatcher queried it via
    /// `uncompressed_size` first); otherwise it's a guess the dispatcher
    /// grows by doubling. Implementations should return
    /// `Err(SquashError::InvalidBuffer)` when `size_hint` is too small so the
    /// caller knows to retry with a bigger one, rather than panicking or
    /// silently truncating.
    fn decompress_buffer(
        &self,
        _input: &[u8],
        _size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        Err(SquashError::failed(format!("{} does not support one-shot decompress", self.name())))
    }

    fn create_stream(
        &self,
        _direction: Direction,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Box<dyn StreamAdaptor>> {
        Err(SquashError::failed(format!("{} does not support incremental streaming", self.name())))
    }

    /// Native splice fast path. Most codecs don't implement this; the default
    /// tells the dispatcher to fall through to the mmap/stream/accumulator tiers.
    fn splice(
        &self,
        _direction: Direction,
        _source: &mut dyn Read,
        _sink: &mut dyn Write,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<()> {
        Err(SquashError::failed(format!("{} does not support native splice", self.name())))
    }
}

/// Immutable, registry-owned handle to a codec implementation.
pub type CodecDescriptor = Arc<dyn Codec>;
