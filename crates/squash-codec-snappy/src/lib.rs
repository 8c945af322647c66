//! Snappy codec backend, built on the `snap` crate.
//!
//! Snappy's raw block format begins with a varint holding the exact
//! decompressed length, so this is the one backend in the workspace that can
//! answer [`Codec::uncompressed_size`] without decompressing — the dispatcher
//! uses that to skip the doubling-guess loop entirely (§4.5, §4.6).

use std::sync::Arc;

use squash_core::{Capabilities, Codec, CodecOptions, Result, SquashError};

/// Registers the snappy codec under the name `"snappy"`.
pub fn register() {
    squash_core::register(Arc::new(SnappyCodec));
}

pub struct SnappyCodec;

impl Codec for SnappyCodec {
    fn name(&self) -> &'static str {
        "snappy"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BUFFER | Capabilities::KNOWS_UNCOMPRESSED_SIZE
    }

    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        snap::raw::max_compress_len(uncompressed_len)
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<usize> {
        snap::raw::decompress_len(compressed).ok()
    }

    fn compress_buffer(&self, input: &[u8], _options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(input)
            .map_err(|e| SquashError::failed(e.to_string()))
    }

    fn decompress_buffer(
        &self,
        input: &[u8],
        _size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| SquashError::failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let codec = SnappyCodec;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(30);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(!compressed.is_empty());
        let decompressed = codec.decompress_buffer(&compressed, 0, None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn uncompressed_size_matches_actual_output() {
        let codec = SnappyCodec;
        let input = b"some payload bytes to round-trip through snappy".to_vec();
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert_eq!(codec.uncompressed_size(&compressed), Some(input.len()));
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let codec = SnappyCodec;
        assert!(codec.decompress_buffer(&[0xff, 0xff, 0xff], 0, None).is_err());
    }
}
