//! LZ4 frame codec backend, built on `lz4_flex`.
//!
//! LZ4 has no native streaming API that maps onto this crate's incremental
//! `StreamAdaptor` cursor shape: the frame encoder wants the whole payload
//! up front to get good block boundaries, and `lz4_flex`'s own streaming
//! writer doesn't allow flushing a self-contained frame prefix mid-stream.
//! This backend therefore accumulates and only exposes the one-shot buffer
//! tier; the splice engine falls back to its accumulator path (§4.5)
//! automatically once it sees `Capabilities` lacks `STREAM`.

use std::io::Write;
use std::sync::Arc;

use squash_core::{Capabilities, Codec, CodecOptions, Direction, Result, SquashError, StreamAdaptor};

/// Registers the lz4 codec under the name `"lz4"`.
pub fn register() {
    squash_core::register(Arc::new(Lz4Codec));
}

pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BUFFER
    }

    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(uncompressed_len) + 64
    }

    fn compress_buffer(&self, input: &[u8], _options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
        encoder
            .write_all(input)
            .map_err(|e| SquashError::failed(e.to_string()))?;
        encoder.finish().map_err(|e| SquashError::failed(e.to_string()))
    }

    fn decompress_buffer(
        &self,
        input: &[u8],
        size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        use std::io::Read;
        let mut out = Vec::with_capacity(size_hint);
        lz4_flex::frame::FrameDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(|e| SquashError::failed(e.to_string()))?;
        Ok(out)
    }

    fn create_stream(
        &self,
        _direction: Direction,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Box<dyn StreamAdaptor>> {
        Err(SquashError::failed("lz4 has no incremental streaming tier, use the buffer tier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let codec = Lz4Codec;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(30);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(!compressed.is_empty());
        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn empty_input_round_trips() {
        let codec = Lz4Codec;
        let compressed = codec.compress_buffer(&[], None).unwrap();
        let decompressed = codec.decompress_buffer(&compressed, 0, None).unwrap();
        assert!(decompressed.is_empty());
    }
}
