use std::fs::File;
use std::io::{self, Seek, SeekFrom};

use fs4::fs_std::FileExt;
use memmap2::{Mmap, MmapMut, MmapOptions};
use tracing::{debug, warn};

use crate::codec::{Capabilities, Codec, Direction};
use crate::dispatch::{self, MAX_DECOMPRESS_BUFFER};
use crate::env::{mmap_preference, page_size, MmapPreference};
use crate::error::{Result, SquashError};
use crate::options::CodecOptions;

/// Block size used by the mapped-I/O variant of the stream loop (§4.4).
/// Defaults to the process page size, unifying what the specification notes
/// as two independently-tuned constants (see `SPEC_FULL.md` §9).
pub fn file_buf_size() -> usize {
    page_size()
}

/// RAII guard for the exclusive advisory lock the dispatcher holds on a
/// file-like endpoint for the duration of a splice. Unlocking on every exit
/// path (success, error, panic-unwind) is the point: the `Drop` impl is the
/// guaranteed release the specification asks for instead of a `goto cleanup`.
pub struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    pub fn acquire_exclusive(file: &'a File) -> io::Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        // Best-effort: there is nothing useful to do with an unlock failure
        // on a handle we're about to release anyway.
        let _ = FileExt::unlock(self.file);
    }
}

/// A read or write window into a file, backed by a page-aligned memory
/// mapping. `destroy`/`Drop` releases the mapping; `destroy(commit = true)`
/// additionally flushes written bytes back to the file before releasing.
pub enum MappedWindow {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl MappedWindow {
    /// Maps `length` bytes of `file` starting at `offset`, read-only.
    pub fn map_read(file: &File, offset: u64, length: usize) -> io::Result<Self> {
        let mmap = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(length)
                .map(file)?
        };
        Ok(MappedWindow::ReadOnly(mmap))
    }

    /// Maps `length` bytes of `file` starting at `offset`, writable. The
    /// caller is responsible for ensuring the file is at least
    /// `offset + length` bytes long (e.g. via `File::set_len`) before calling.
    pub fn map_write(file: &File, offset: u64, length: usize) -> io::Result<Self> {
        let mmap = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(length)
                .map_mut(file)?
        };
        Ok(MappedWindow::Writable(mmap))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            MappedWindow::ReadOnly(m) => m,
            MappedWindow::Writable(m) => m,
        }
    }

    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            MappedWindow::ReadOnly(_) => None,
            MappedWindow::Writable(m) => Some(m),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases the mapping. When `commit` is true and the window is
    /// writable, flushes the mapped prefix to the file first; when false,
    /// the written bytes are discarded without being published.
    pub fn destroy(self, commit: bool) -> io::Result<()> {
        match self {
            MappedWindow::ReadOnly(_) => Ok(()),
            MappedWindow::Writable(m) => {
                if commit {
                    m.flush()?;
                }
                Ok(())
            }
        }
    }
}

fn stream_position(file: &File) -> io::Result<u64> {
    let mut f = file;
    f.stream_position()
}

fn seek_forward(file: &File, delta: u64) -> io::Result<u64> {
    let mut f = file;
    f.seek(SeekFrom::Current(delta as i64))
}

/// Splices `length` uncompressed bytes between two real files, implementing
/// the full four-tier dispatch algorithm from §4.1: native splice, the
/// mapped-file one-shot path, the stream loop (with its mapped-I/O variant),
/// and finally the one-shot accumulator.
///
/// Takes an exclusive advisory lock on both files for the duration of the
/// call, released on every exit path via [`FileLock`]'s `Drop` impl.
pub fn splice_files(
    codec: &dyn Codec,
    direction: Direction,
    sink_file: &File,
    source_file: &File,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let _source_lock = FileLock::acquire_exclusive(source_file)?;
    let _sink_lock = FileLock::acquire_exclusive(sink_file)?;

    let caps = codec.capabilities();

    if caps.contains(Capabilities::NATIVE_SPLICE) {
        debug!(codec = codec.name(), path = "native_splice");
        let mut source = source_file;
        let mut sink = sink_file;
        let (mut limited_source, mut limited_sink) =
            crate::limiter::apply_budget(direction, &mut source, &mut sink, length);
        return codec.splice(direction, &mut *limited_source, &mut *limited_sink, options);
    }

    let prefer_mmap = match mmap_preference() {
        MmapPreference::Never => false,
        MmapPreference::WhenNoStream => !caps.contains(Capabilities::STREAM),
        MmapPreference::Always => true,
    };

    if prefer_mmap {
        match mmap_one_shot(codec, direction, sink_file, source_file, length, options) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(codec = codec.name(), error = %e, "mmap one-shot path failed, falling back");
            }
        }
    }

    if caps.contains(Capabilities::STREAM) {
        return stream_loop_mapped(codec, direction, sink_file, source_file, length, options);
    }

    let mut source = source_file;
    let mut sink = sink_file;
    dispatch::accumulator_splice(codec, direction, &mut sink, &mut source, length, options)
}

/// The mapped-file one-shot path (§4.2).
fn mmap_one_shot(
    codec: &dyn Codec,
    direction: Direction,
    sink_file: &File,
    source_file: &File,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    match direction {
        Direction::Compress => mmap_compress(codec, sink_file, source_file, length, options),
        Direction::Decompress => mmap_decompress(codec, sink_file, source_file, length, options),
    }
}

fn mmap_compress(
    codec: &dyn Codec,
    sink_file: &File,
    source_file: &File,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let source_offset = stream_position(source_file)?;
    let sink_offset = stream_position(sink_file)?;

    let effective_len = if length == 0 {
        let total = source_file.metadata()?.len();
        total.checked_sub(source_offset).ok_or(SquashError::InvalidBuffer)? as usize
    } else {
        length as usize
    };

    let source_window = MappedWindow::map_read(source_file, source_offset, effective_len)?;
    let max_output = codec.max_compressed_size(effective_len);
    sink_file.set_len(sink_offset + max_output as u64)?;
    let mut sink_window = MappedWindow::map_write(sink_file, sink_offset, max_output)?;

    let result = codec.compress_buffer(source_window.as_slice(), options);
    source_window.destroy(false)?;

    match result {
        Ok(compressed) => {
            let out = sink_window.as_mut_slice().expect("writable window");
            out[..compressed.len()].copy_from_slice(&compressed);
            sink_window.destroy(true)?;
            sink_file.set_len(sink_offset + compressed.len() as u64)?;
            seek_forward(source_file, effective_len as u64)?;
            seek_forward(sink_file, compressed.len() as u64)?;
            Ok(())
        }
        Err(e) => {
            sink_window.destroy(false)?;
            sink_file.set_len(sink_offset)?;
            Err(e)
        }
    }
}

fn mmap_decompress(
    codec: &dyn Codec,
    sink_file: &File,
    source_file: &File,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let source_offset = stream_position(source_file)?;
    let sink_offset = stream_position(sink_file)?;
    let source_len = (source_file.metadata()?.len() - source_offset) as usize;

    let source_window = MappedWindow::map_read(source_file, source_offset, source_len)?;
    let input = source_window.as_slice();

    let caps = codec.capabilities();
    let known_len = if caps.contains(Capabilities::KNOWS_UNCOMPRESSED_SIZE) {
        codec.uncompressed_size(input)
    } else {
        None
    };

    let budget = if length == 0 { None } else { Some(length as usize) };

    let mut guess = known_len
        .unwrap_or_else(|| source_len.max(1).next_power_of_two().saturating_mul(8));

    let decompressed = loop {
        match codec.decompress_buffer(input, guess, options) {
            Ok(out) => break out,
            Err(SquashError::InvalidBuffer) if known_len.is_none() && guess < MAX_DECOMPRESS_BUFFER => {
                guess = guess.saturating_mul(2);
                continue;
            }
            Err(e) => {
                source_window.destroy(false)?;
                return Err(e);
            }
        }
    };
    source_window.destroy(false)?;

    let out_len = match budget {
        Some(b) => b.min(decompressed.len()),
        None => decompressed.len(),
    };

    sink_file.set_len(sink_offset + out_len as u64)?;
    let mut sink_window = MappedWindow::map_write(sink_file, sink_offset, out_len)?;
    sink_window
        .as_mut_slice()
        .expect("writable window")
        .copy_from_slice(&decompressed[..out_len]);
    sink_window.destroy(true)?;

    seek_forward(source_file, source_len as u64)?;
    seek_forward(sink_file, out_len as u64)?;
    Ok(())
}

/// The mapped-I/O variant of the stream loop (§4.4, last paragraph): maps
/// `FILE_BUF_SIZE`-byte blocks of the source/sink instead of copying through
/// scratch buffers. Falls back to the buffered [`dispatch::stream_loop`]
/// transparently on the *first* mapping failure; once mapping has succeeded
/// at least once, a later failure terminates the loop with an error rather
/// than silently falling back (per §4.4/§7).
fn stream_loop_mapped(
    codec: &dyn Codec,
    direction: Direction,
    sink_file: &File,
    source_file: &File,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let block = file_buf_size();
    let mut stream = codec.create_stream(direction, options)?;
    let budget = if length == 0 { None } else { Some(length) };
    let mut mapped_ever_succeeded = false;
    let mut eof = false;

    loop {
        let source_offset = stream_position(source_file)?;
        let remaining_source = source_file.metadata()?.len().saturating_sub(source_offset);
        let want = match (direction, budget) {
            (Direction::Compress, Some(budget)) => {
                budget.saturating_sub(stream.total_in()).min(block as u64)
            }
            _ => block as u64,
        }
        .min(remaining_source) as usize;

        if want == 0 {
            eof = true;
        }

        let source_window = if want > 0 {
            match MappedWindow::map_read(source_file, source_offset, want) {
                Ok(w) => {
                    mapped_ever_succeeded = true;
                    Some(w)
                }
                Err(e) if !mapped_ever_succeeded => {
                    warn!(codec = codec.name(), error = %e, "first mmap read failed, falling back to buffered stream loop");
                    let mut source = source_file;
                    let mut sink = sink_file;
                    return dispatch::stream_loop(codec, direction, &mut sink, &mut source, length, options);
                }
                Err(e) => return Err(SquashError::Io(e)),
            }
        } else {
            None
        };

        let input = source_window.as_ref().map(|w| w.as_slice()).unwrap_or(&[][..]);
        if want > 0 {
            seek_forward(source_file, want as u64)?;
        } else {
            eof = true;
        }

        let mut next_in = input;
        loop {
            let sink_offset = stream_position(sink_file)?;
            sink_file.set_len(sink_offset + block as u64)?;
            let mut out_window = match MappedWindow::map_write(sink_file, sink_offset, block) {
                Ok(w) => {
                    mapped_ever_succeeded = true;
                    w
                }
                Err(e) if !mapped_ever_succeeded => {
                    sink_file.set_len(sink_offset)?;
                    warn!(codec = codec.name(), error = %e, "first mmap write failed, falling back to buffered stream loop");
                    let mut source = source_file;
                    let mut sink = sink_file;
                    // `next_in` bytes already consumed from `source_file`'s
                    // position can't be un-read; restart the remaining
                    // transfer through the buffered loop from here.
                    return dispatch::stream_loop(codec, direction, &mut sink, &mut source, length, options);
                }
                Err(e) => {
                    sink_file.set_len(sink_offset)?;
                    return Err(SquashError::Io(e));
                }
            };
            let out_buf = out_window.as_mut_slice().expect("writable window");

            let (consumed, produced, mut result) = if eof && source_window.is_none() {
                let (produced, result) = stream.finish(out_buf)?;
                (0, produced, result)
            } else {
                stream.process(next_in, out_buf)?
            };
            next_in = &next_in[consumed..];

            let mut produced = produced;
            if direction == Direction::Decompress {
                if let Some(budget) = budget {
                    if stream.total_out() > budget {
                        let overshoot = (stream.total_out() - budget) as usize;
                        produced = produced.saturating_sub(overshoot);
                        eof = true;
                        result = crate::stream::ProcessResult::Ok;
                    }
                }
            }

            out_window.destroy(true)?;
            sink_file.set_len(sink_offset + produced as u64)?;
            seek_forward(sink_file, produced as u64)?;

            match result {
                crate::stream::ProcessResult::Processing => continue,
                // Defensive terminal case: a well-behaved adaptor should
                // have reported `EndOfStream` by now.
                crate::stream::ProcessResult::Ok if eof && produced == 0 => return Ok(()),
                crate::stream::ProcessResult::Ok => break,
                crate::stream::ProcessResult::EndOfStream => return Ok(()),
            }
        }
        // `source_window` (read-only, or absent once `eof`) is dropped here;
        // unmapping a read-only window needs no explicit flush.
        if eof {
            // Mirrors `dispatch::stream_loop`'s eof-terminates guard: once
            // `eof` is set — whether because the source is exhausted or
            // because a decompress budget was just met mid-block — stop
            // feeding the source into the decoder and only drain whatever
            // `finish()` still has queued, instead of looping back and
            // mapping further (possibly trailing, unwanted) source blocks.
            return finish_drain_mapped(codec, &mut stream, sink_file, block, direction, budget);
        }
    }
}

/// Mapped-I/O counterpart to `dispatch::finish_drain`: keeps calling
/// `stream.finish()`, mapping a fresh sink block each time, until the
/// adaptor reports `EndOfStream`.
fn finish_drain_mapped(
    codec: &dyn Codec,
    stream: &mut Box<dyn crate::stream::StreamAdaptor>,
    sink_file: &File,
    block: usize,
    direction: Direction,
    budget: Option<u64>,
) -> Result<()> {
    loop {
        let sink_offset = stream_position(sink_file)?;
        sink_file.set_len(sink_offset + block as u64)?;
        let mut out_window = MappedWindow::map_write(sink_file, sink_offset, block)?;
        let out_buf = out_window.as_mut_slice().expect("writable window");

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

        out_window.destroy(true)?;
        sink_file.set_len(sink_offset + produced as u64)?;
        seek_forward(sink_file, produced as u64)?;

        match result {
            crate::stream::ProcessResult::EndOfStream => return Ok(()),
            crate::stream::ProcessResult::Ok if produced == 0 => return Ok(()),
            _ => {
                tracing::trace!(codec = codec.name(), "finish() draining more output (mapped)");
                continue;
            }
        }
    }
}
