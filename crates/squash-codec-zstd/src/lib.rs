//! Zstandard codec backend, built on the `zstd`/`zstd-safe` crates.
//!
//! This is the one backend that exposes all three in-process tiers: the
//! one-shot buffer tier via `zstd::bulk`, the incremental stream tier via
//! `zstd::stream::raw`'s `Operation` trait (the `next_in`/`avail_in`/
//! `next_out`/`avail_out` cursor shape [`squash_core::StreamAdaptor`] is
//! modeled on), and `uncompressed_size` via the frame header's content-size
//! field when the frame carries one.

use std::sync::Arc;

use zstd::stream::raw::{Decoder as RawDecoder, Encoder as RawEncoder, Operation};
use zstd_safe::{InBuffer, OutBuffer};

use squash_core::{
    downcast_or_default, Capabilities, Codec, CodecOptions, CompressionLevel, Direction,
    ProcessResult, Result, SquashError, StreamAdaptor,
};

/// Registers the zstd codec under the name `"zstd"`.
pub fn register() {
    squash_core::register(Arc::new(ZstdCodec));
}

pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BUFFER | Capabilities::STREAM | Capabilities::KNOWS_UNCOMPRESSED_SIZE
    }

    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        zstd_safe::compress_bound(uncompressed_len)
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<usize> {
        match zstd_safe::get_frame_content_size(compressed) {
            Ok(Some(size)) => usize::try_from(size).ok(),
            _ => None,
        }
    }

    fn compress_buffer(&self, input: &[u8], options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        let level = downcast_or_default(options, &CompressionLevel::DEFAULT);
        zstd::bulk::compress(input, level.get() as i32).map_err(SquashError::from)
    }

    fn decompress_buffer(
        &self,
        input: &[u8],
        size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        // zstd::bulk::decompress errors (including "destination buffer too
        // small") don't carry a structured variant we can match on, so any
        // failure here is treated as "buffer too small, try a bigger guess"
        // and left to the dispatcher's doubling loop in
        // `crate::dispatch::decompress_with_growth`.
        zstd::bulk::decompress(input, size_hint).map_err(|_| SquashError::InvalidBuffer)
    }

    fn create_stream(
        &self,
        direction: Direction,
        options: Option<&dyn CodecOptions>,
    ) -> Result<Box<dyn StreamAdaptor>> {
        let level = downcast_or_default(options, &CompressionLevel::DEFAULT);
        let inner = match direction {
            Direction::Compress => {
                Inner::Compress(RawEncoder::new(level.get() as i32).map_err(SquashError::from)?)
            }
            Direction::Decompress => Inner::Decompress(RawDecoder::new().map_err(SquashError::from)?),
        };
        Ok(Box::new(ZstdStream {
            inner,
            total_in: 0,
            total_out: 0,
        }))
    }
}

enum Inner {
    Compress(RawEncoder<'static>),
    Decompress(RawDecoder<'static>),
}

struct ZstdStream {
    inner: Inner,
    total_in: u64,
    total_out: u64,
}

impl StreamAdaptor for ZstdStream {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, ProcessResult)> {
        let mut in_buf = InBuffer::around(input);
        let mut out_buf = OutBuffer::around(output);

        match &mut self.inner {
            Inner::Compress(op) => op.run(&mut in_buf, &mut out_buf),
            Inner::Decompress(op) => op.run(&mut in_buf, &mut out_buf),
        }
        .map_err(SquashError::from)?;

        let consumed = in_buf.pos();
        let produced = out_buf.pos();
        self.total_in += consumed as u64;
        self.total_out += produced as u64;

        let result = if consumed < input.len() {
            ProcessResult::Processing
        } else {
            ProcessResult::Ok
        };
        Ok((consumed, produced, result))
    }

    fn finish(&mut self, output: &mut [u8]) -> Result<(usize, ProcessResult)> {
        let mut out_buf = OutBuffer::around(output);

        let hint = match &mut self.inner {
            Inner::Compress(op) => op.finish(&mut out_buf, true),
            Inner::Decompress(op) => op.finish(&mut out_buf, true),
        }
        .map_err(SquashError::from)?;

        let produced = out_buf.pos();
        self.total_out += produced as u64;

        if hint == 0 {
            Ok((produced, ProcessResult::EndOfStream))
        } else {
            Ok((produced, ProcessResult::Ok))
        }
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let codec = ZstdCodec;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(30);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(!compressed.is_empty());
        assert_eq!(codec.uncompressed_size(&compressed), Some(input.len()));
        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn stream_round_trips_in_small_chunks() {
        let codec = ZstdCodec;
        let input = b"stream me in little pieces, please and thank you".repeat(80);

        let mut compress_stream = codec.create_stream(Direction::Compress, None).unwrap();
        let mut compressed = Vec::new();
        let mut scratch = [0u8; 64];
        for chunk in input.chunks(13) {
            let mut next_in: &[u8] = chunk;
            loop {
                let (consumed, produced, result) = compress_stream.process(next_in, &mut scratch).unwrap();
                compressed.extend_from_slice(&scratch[..produced]);
                next_in = &next_in[consumed..];
                if result != ProcessResult::Processing {
                    break;
                }
            }
        }
        loop {
            let (produced, result) = compress_stream.finish(&mut scratch).unwrap();
            compressed.extend_from_slice(&scratch[..produced]);
            if result == ProcessResult::EndOfStream {
                break;
            }
        }

        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn decompress_buffer_too_small_is_growable() {
        let codec = ZstdCodec;
        let input = b"abcdefghij".repeat(1000);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(matches!(
            codec.decompress_buffer(&compressed, 4, None),
            Err(SquashError::InvalidBuffer)
        ));
    }
}
