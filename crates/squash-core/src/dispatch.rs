use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::accumulator::ExpandableBuffer;
use crate::codec::{Capabilities, Codec, Direction};
use crate::error::{Result, SquashError};
use crate::limiter::apply_budget;
use crate::options::CodecOptions;
use crate::stream::ProcessResult;

/// Scratch-buffer size for the stream loop. Unified with the mapped-I/O
/// per-block size (see `crate::file::FILE_BUF_SIZE` and `SPEC_FULL.md` §9)
/// rather than carrying two independently tuned constants.
pub const SPLICE_BUF_SIZE: usize = 512;

/// Hard cap on how large an unknowing codec's guessed output buffer may grow
/// before a doubling retry gives up. Resolves the specification's open
/// question about the doubling loop having no explicit bound.
pub const MAX_DECOMPRESS_BUFFER: usize = 1 << 30; // 1 GiB

/// Generic splice over arbitrary `Read`/`Write` endpoints, with no knowledge
/// of whether they're backed by files. This picks among native splice (tier
/// 1), the stream loop (tier 3), and the one-shot accumulator (tier 4); it
/// never attempts the mmap tier, which requires real file handles (see
/// [`crate::file::splice_files`] for the tier that does).
pub fn splice_generic(
    codec: &dyn Codec,
    direction: Direction,
    sink: &mut dyn Write,
    source: &mut dyn Read,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let caps = codec.capabilities();

    if caps.contains(Capabilities::NATIVE_SPLICE) {
        debug!(codec = codec.name(), path = "native_splice");
        let (mut limited_source, mut limited_sink) = apply_budget(direction, source, sink, length);
        return codec.splice(direction, &mut *limited_source, &mut *limited_sink, options);
    }

    if caps.contains(Capabilities::STREAM) {
        debug!(codec = codec.name(), path = "stream");
        return stream_loop(codec, direction, sink, source, length, options);
    }

    if caps.contains(Capabilities::BUFFER) {
        debug!(codec = codec.name(), path = "accumulator");
        return accumulator_splice(codec, direction, sink, source, length, options);
    }

    Err(SquashError::BadParam(format!(
        "{} exposes no usable capability tier",
        codec.name()
    )))
}

/// The stream loop path (§4.4): drains the source through two fixed-size
/// scratch buffers and the codec's incremental stream adaptor, draining
/// produced bytes to the sink as they're generated.
///
/// `pub(crate)` so [`crate::file::splice_files`] can fall back to it when its
/// mapped-I/O variant hits a mapping failure.
pub(crate) fn stream_loop(
    codec: &dyn Codec,
    direction: Direction,
    sink: &mut dyn Write,
    source: &mut dyn Read,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let mut stream = codec.create_stream(direction, options)?;
    let mut in_buf = vec![0u8; SPLICE_BUF_SIZE];
    let mut out_buf = vec![0u8; SPLICE_BUF_SIZE];

    let budget = if length == 0 { None } else { Some(length) };
    let mut eof = false;

    loop {
        // 1. Refill in_buf, respecting the compress-side budget.
        let want = match (direction, budget) {
            (Direction::Compress, Some(budget)) => {
                let remaining = budget.saturating_sub(stream.total_in());
                (remaining.min(SPLICE_BUF_SIZE as u64)) as usize
            }
            _ => SPLICE_BUF_SIZE,
        };

        let mut avail_in = 0usize;
        if want > 0 && !eof {
            avail_in = read_fully_up_to(source, &mut in_buf[..want])?;
            if avail_in < want {
                eof = true;
            }
        } else if want == 0 {
            eof = true;
        }

        let mut next_in = &in_buf[..avail_in];

        // 2. Inner loop: drain everything the codec can emit from this input.
        loop {
            let (consumed, produced, mut result) = if eof {
                let (produced, result) = stream.finish(&mut out_buf)?;
                (0, produced, result)
            } else {
                stream.process(next_in, &mut out_buf)?
            };

            next_in = &next_in[consumed..];

            let mut produced = produced;
            if direction == Direction::Decompress {
                if let Some(budget) = budget {
                    if stream.total_out() > budget {
                        let overshoot = (stream.total_out() - budget) as usize;
                        produced = produced.saturating_sub(overshoot);
                        eof = true;
                        result = ProcessResult::Ok;
                    }
                }
            }

            write_all_retrying(sink, &out_buf[..produced])?;

            match result {
                ProcessResult::Processing => {
                    trace!(codec = codec.name(), "stream processing, looping inner");
                    continue;
                }
                ProcessResult::Ok => break,
                ProcessResult::EndOfStream => return Ok(()),
            }
        }

        if eof {
            // Outer loop is done once finish() has reported Ok with nothing
            // left; another pass will call finish() again and should reach
            // EndOfStream. Codecs that return Ok forever here would loop
            // forever, so we treat "eof and nothing pending" as terminal
            // (see `finish_drain`'s own defensive guard).
            return finish_drain(codec, &mut stream, sink, &mut out_buf, direction, budget);
        }
    }
}

/// After the outer loop has seen EOF and drained once, keep calling
/// `finish()` until the adaptor reports `EndOfStream`, applying the same
/// budget-overshoot clamp as the main loop.
fn finish_drain(
    codec: &dyn Codec,
    stream: &mut Box<dyn crate::stream::StreamAdaptor>,
    sink: &mut dyn Write,
    out_buf: &mut [u8],
    direction: Direction,
    budget: Option<u64>,
) -> Result<()> {
    loop {
        let (produced, result) = stream.finish(out_buf)?;
        let mut produced = produced;
        if direction == Direction::Decompress {
            if let Some(budget) = budget {
                if stream.total_out() > budget {
                    let overshoot = (stream.total_out() - budget) as usize;
                    produced = produced.saturating_sub(overshoot);
                }
            }
        }
        write_all_retrying(sink, &out_buf[..produced])?;
        match result {
            ProcessResult::EndOfStream => return Ok(()),
            ProcessResult::Ok if produced == 0 => return Ok(()),
            _ => {
                trace!(codec = codec.name(), "finish() draining more output");
                continue;
            }
        }
    }
}

/// Reads into `buf` until it's full or the source reaches end-of-stream,
/// returning the number of bytes actually read.
pub(crate) fn read_fully_up_to(source: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Writes `buf` to `sink`, retrying on short writes (§4.4 point 6).
pub(crate) fn write_all_retrying(sink: &mut dyn Write, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = sink.write(buf)?;
        if n == 0 {
            return Err(SquashError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "sink accepted zero bytes",
            )));
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// The one-shot accumulator path (§4.5): used only when a codec exposes
/// neither native splice nor an incremental stream.
pub(crate) fn accumulator_splice(
    codec: &dyn Codec,
    direction: Direction,
    sink: &mut dyn Write,
    source: &mut dyn Read,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let budget = if length == 0 { None } else { Some(length as usize) };

    // 1. Drain source into an expandable buffer.
    let mut input = ExpandableBuffer::new();
    let mut chunk = vec![0u8; SPLICE_BUF_SIZE];
    loop {
        if let Some(budget) = budget {
            if direction == Direction::Compress && input.len() >= budget {
                break;
            }
        }
        let want = match (direction, budget) {
            (Direction::Compress, Some(budget)) => (budget - input.len()).min(chunk.len()),
            _ => chunk.len(),
        };
        if want == 0 {
            break;
        }
        let n = source.read(&mut chunk[..want])?;
        if n == 0 {
            break;
        }
        input.extend_from_slice(&chunk[..n]);
    }

    // 2. Transform.
    let output = match direction {
        Direction::Compress => codec.compress_buffer(input.as_slice(), options)?,
        Direction::Decompress => decompress_with_growth(codec, input.as_slice(), options)?,
    };

    // 3. Truncate to the budget if decompressing with one.
    let output_slice = match (direction, budget) {
        (Direction::Decompress, Some(budget)) => &output[..budget.min(output.len())],
        _ => &output[..],
    };

    // 4. Drain to sink.
    write_all_retrying(sink, output_slice)
}

/// Decompresses `input` via `compress_buffer`'s counterpart, growing the
/// output allocation on `BufferFull` until it succeeds or exceeds
/// [`MAX_DECOMPRESS_BUFFER`].
fn decompress_with_growth(
    codec: &dyn Codec,
    input: &[u8],
    options: Option<&dyn CodecOptions>,
) -> Result<Vec<u8>> {
    if codec.capabilities().contains(Capabilities::KNOWS_UNCOMPRESSED_SIZE) {
        if let Some(n) = codec.uncompressed_size(input) {
            return codec.decompress_buffer(input, n, options);
        }
    }

    let mut guess = (input.len().max(1)).next_power_of_two().saturating_mul(8);
    loop {
        match codec.decompress_buffer(input, guess, options) {
            Ok(out) => return Ok(out),
            Err(SquashError::InvalidBuffer) if guess < MAX_DECOMPRESS_BUFFER => {
                trace!(codec = codec.name(), guess, "growing decompress buffer guess");
                guess = guess.saturating_mul(2);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}
