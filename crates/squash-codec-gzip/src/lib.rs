//! Gzip/deflate codec backend, built on `flate2`.
//!
//! Exposes the one-shot buffer tier and the incremental stream tier.
//! Deliberately does not claim `KNOWS_UNCOMPRESSED_SIZE`: gzip's trailer
//! stores the uncompressed size mod 2^32, which is unreliable for inputs at
//! or above 4 GiB, so this backend lets the dispatcher discover the size by
//! decompressing rather than trusting a footer that can lie.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;

use squash_core::{
    downcast_or_default, Capabilities, Codec, CodecOptions, CompressionLevel, Direction,
    ProcessResult, Result, SquashError, StreamAdaptor,
};

/// Registers the gzip codec under the name `"gzip"`.
///
/// Called once at process start-up by `squash-cli` and by this crate's own
/// tests; see `squash_core::registry` for why there's no dynamic plugin
/// loader here.
pub fn register() {
    squash_core::register(Arc::new(GzipCodec));
}

fn level_to_compression(level: CompressionLevel) -> Compression {
    match level.get() {
        0 => Compression::none(),
        l => Compression::new(l as u32),
    }
}

pub struct GzipCodec;

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BUFFER | Capabilities::STREAM
    }

    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        // Deflate's documented worst case plus the gzip header/trailer.
        uncompressed_len + (uncompressed_len / 1000) + 128
    }

    fn compress_buffer(&self, input: &[u8], options: Option<&dyn CodecOptions>) -> Result<Vec<u8>> {
        let level = downcast_or_default(options, &CompressionLevel::DEFAULT);
        let mut encoder = GzEncoder::new(Vec::new(), level_to_compression(level));
        encoder.write_all(input)?;
        encoder.finish().map_err(SquashError::from)
    }

    fn decompress_buffer(
        &self,
        input: &[u8],
        size_hint: usize,
        _options: Option<&dyn CodecOptions>,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(size_hint);
        flate2::read::GzDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(SquashError::from)?;
        Ok(out)
    }

    fn create_stream(
        &self,
        direction: Direction,
        options: Option<&dyn CodecOptions>,
    ) -> Result<Box<dyn StreamAdaptor>> {
        Ok(Box::new(GzipStream::new(direction, options)))
    }
}

enum Inner {
    Compress(GzEncoder<Vec<u8>>),
    Decompress(GzDecoder<Vec<u8>>),
}

/// Incremental gzip adaptor.
///
/// `flate2`'s `write::GzEncoder`/`write::GzDecoder` only expose a `Write`
/// surface backed by an internal sink, not the slice-cursor shape
/// [`StreamAdaptor`] wants, so this wraps one in a pending-bytes queue: each
/// `process`/`finish` call writes what it can into the encoder, pulls
/// whatever the encoder produced into `pending`, then drains `pending` into
/// the caller's `output` slice, reporting `Processing` when more is queued
/// than fit.
struct GzipStream {
    inner: Option<Inner>,
    pending: VecDeque<u8>,
    finalized: bool,
    total_in: u64,
    total_out: u64,
}

impl GzipStream {
    fn new(direction: Direction, options: Option<&dyn CodecOptions>) -> Self {
        let level = downcast_or_default(options, &CompressionLevel::DEFAULT);
        let inner = match direction {
            Direction::Compress => Inner::Compress(GzEncoder::new(Vec::new(), level_to_compression(level))),
            Direction::Decompress => Inner::Decompress(GzDecoder::new(Vec::new())),
        };
        Self {
            inner: Some(inner),
            pending: VecDeque::new(),
            finalized: false,
            total_in: 0,
            total_out: 0,
        }
    }

    fn drain_into(&mut self, output: &mut [u8]) -> usize {
        let n = self.pending.len().min(output.len());
        for slot in output.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        self.total_out += n as u64;
        n
    }

    fn pull_produced(&mut self) -> Result<()> {
        // No explicit flush here: `write_all` already pushes whatever the
        // deflate window has emitted into the inner `Vec` on its own. Calling
        // `flush()` per chunk would force a Z_SYNC_FLUSH after every
        // process() call, resetting the deflate window and collapsing the
        // compression ratio on real input; the encoder's own `finish()` does
        // a full flush at the end regardless.
        let produced = match self.inner.as_mut().expect("stream used after finish") {
            Inner::Compress(enc) => std::mem::take(enc.get_mut()),
            Inner::Decompress(dec) => std::mem::take(dec.get_mut()),
        };
        self.pending.extend(produced);
        Ok(())
    }
}

impl StreamAdaptor for GzipStream {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, ProcessResult)> {
        if !input.is_empty() {
            match self.inner.as_mut().expect("stream used after finish") {
                Inner::Compress(enc) => enc.write_all(input)?,
                Inner::Decompress(dec) => dec.write_all(input)?,
            }
            self.total_in += input.len() as u64;
            self.pull_produced()?;
        }

        let produced = self.drain_into(output);
        let result = if self.pending.is_empty() {
            ProcessResult::Ok
        } else {
            ProcessResult::Processing
        };
        Ok((input.len(), produced, result))
    }

    fn finish(&mut self, output: &mut [u8]) -> Result<(usize, ProcessResult)> {
        if !self.finalized {
            self.finalized = true;
            let inner = self.inner.take().expect("stream used after finish");
            let tail = match inner {
                Inner::Compress(enc) => enc.finish().map_err(SquashError::from)?,
                Inner::Decompress(mut dec) => {
                    dec.try_finish().map_err(SquashError::from)?;
                    std::mem::take(dec.get_mut())
                }
            };
            self.pending.extend(tail);
        }

        let produced = self.drain_into(output);
        let result = if self.pending.is_empty() {
            ProcessResult::EndOfStream
        } else {
            ProcessResult::Ok
        };
        Ok((produced, result))
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
        let codec = GzipCodec;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = codec.compress_buffer(&input, None).unwrap();
        assert!(!compressed.is_empty());
        let decompressed = codec.decompress_buffer(&compressed, input.len(), None).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn stream_round_trips_in_small_chunks() {
        let codec = GzipCodec;
        let input = b"stream me in little pieces, please and thank you".repeat(50);

        let mut compress_stream = codec.create_stream(Direction::Compress, None).unwrap();
        let mut compressed = Vec::new();
        let mut scratch = [0u8; 16];
        for chunk in input.chunks(7) {
            let mut offset = 0;
            while offset < chunk.len() {
                let (consumed, produced, _) = compress_stream.process(&chunk[offset..], &mut scratch).unwrap();
                compressed.extend_from_slice(&scratch[..produced]);
                offset += consumed;
            }
        }
        loop {
            let (produced, result) = compress_stream.finish(&mut scratch).unwrap();
            compressed.extend_from_slice(&scratch[..produced]);
            if result == ProcessResult::EndOfStream {
                break;
            }
        }

        let mut decompress_stream = codec.create_stream(Direction::Decompress, None).unwrap();
        let mut decompressed = Vec::new();
        for chunk in compressed.chunks(11) {
            let mut offset = 0;
            while offset < chunk.len() {
                let (consumed, produced, _) = decompress_stream.process(&chunk[offset..], &mut scratch).unwrap();
                decompressed.extend_from_slice(&scratch[..produced]);
                offset += consumed;
            }
        }
        loop {
            let (produced, result) = decompress_stream.finish(&mut scratch).unwrap();
            decompressed.extend_from_slice(&scratch[..produced]);
            if result == ProcessResult::EndOfStream {
                break;
            }
        }

        assert_eq!(decompressed, input);
    }
}
