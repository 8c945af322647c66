//! Brotli codec backend, built on the `brotli` crate's pure-Rust encoder and
//! decoder.
//!
//! Only the one-shot buffer tier is exposed. `brotli::Decompressor` is a
//! `Read` adaptor over the *compressed* source, not a push-style cursor, so
//! it doesn't map cleanly onto this crate's `process(input, output)`
//! incremental shape the way `flate2`'s write-based encoders do; the splice
//! engine's accumulator path (§4.5) already covers one-shot codecs, so this
//! backend doesn't fight the grain to half-implement an incremental tier.

use std::io::{Read, Write};
use std::sync::Arc;

use brotli::enc::BrotliEncoderParams;
use brotli::{CompressorWriter, Decompressor};

use squash_core::{
    downcast_or_default, Capabilities, Codec, CodecOptions, CompressionLevel, Result, SquashError,
};

const BROTLI_BUFFER_SIZE: usize = 4096;

/// Registers the brotli codec under the name `"brotli"`.
pub fn register() {
    squash_core::register(Arc::new(BrotliCodec));
}

pub struct BrotliCodec;

impl Codec for BrotliCodec {
    fn name(&self) -> &'static str {
        "brotli"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BUFFER
    }

    fn compress_buffer(&self, input: &[u8], options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        let level = downcast_or_default(options, &CompressionLevel::DEFAULT);
        let params = BrotliEncoderParams {
            quality: level.get() as i32,
            ..Default::default()
        };
        let mut encoder = CompressorWriter::with_params(Vec::new(), BROTLI_BUFFER_SIZE, &params);
        encoder.write_all(input)?;
        encoder.flush()?;
        Ok(encoder.into_inner())
    }

    fn decompress_buffer(
        &self,
        input: &[u8],
        size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        let mut decoder = Decompressor::new(input, BROTLI_BUFFER_SIZE);
        let mut output = Vec::with_capacity(size_hint);
        decoder
            .read_to_end(&mut output)
            .map_err(SquashError::from)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let codec = BrotliCodec;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(40);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(!compressed.is_empty());
        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn empty_input_round_trips() {
        let codec = BrotliCodec;
        let compressed = codec.compress_buffer(&[], None).unwrap();
        let decompressed = codec.decompress_buffer(&compressed, 0, None).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn higher_levels_still_round_trip() {
        let codec = BrotliCodec;
        let input = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let level = CompressionLevel::BEST;
        let compressed = codec.compress_buffer(&input, Some(&level)).unwrap();
        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }
}
