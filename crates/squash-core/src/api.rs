use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::codec::{Codec, Direction};
use crate::dispatch::splice_generic;
use crate::error::Result;
use crate::file::splice_files;
use crate::options::CodecOptions;
use crate::registry;

fn open_source(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

fn open_sink(path: &Path) -> Result<File> {
    // `read(true)` is required alongside `write(true)` so the mapped-file
    // tier can open a writable `MAP_SHARED` mapping; a write-only fd can't
    // back a read/write mmap.
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Looks the codec up by name, then splices `source` into `sink`.
///
/// Canonical, explicit-options form. `length = 0` means "entire input" when
/// compressing, or "until the codec signals end-of-stream" when
/// decompressing.
pub fn splice_with_options(
    codec_name: &str,
    direction: Direction,
    sink: impl AsRef<Path>,
    source: impl AsRef<Path>,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let codec = registry::lookup(codec_name)?;
    splice_codec_with_options(&*codec, direction, sink, source, length, options)
}

/// Same as [`splice_with_options`] but with no options (codec defaults apply).
pub fn splice(
    codec_name: &str,
    direction: Direction,
    sink: impl AsRef<Path>,
    source: impl AsRef<Path>,
    length: u64,
) -> Result<()> {
    splice_with_options(codec_name, direction, sink, source, length, None)
}

/// Same as [`splice`] but with a pre-resolved codec descriptor, skipping the
/// registry lookup.
pub fn splice_codec(
    codec: &dyn Codec,
    direction: Direction,
    sink: impl AsRef<Path>,
    source: impl AsRef<Path>,
    length: u64,
) -> Result<()> {
    splice_codec_with_options(codec, direction, sink, source, length, None)
}

/// Canonical form: pre-resolved codec, explicit options, real files. Runs the
/// full four-tier dispatch algorithm including the mmap tier.
pub fn splice_codec_with_options(
    codec: &dyn Codec,
    direction: Direction,
    sink: impl AsRef<Path>,
    source: impl AsRef<Path>,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    let source_file = open_source(source.as_ref())?;
    let sink_file = open_sink(sink.as_ref())?;
    splice_files(codec, direction, &sink_file, &source_file, length, options)
}

/// Generic callback form: splices over arbitrary `Read`/`Write` endpoints
/// rather than files. Because there is no file handle here, this never
/// attempts the mmap tier — it picks among native splice, the stream loop,
/// and the one-shot accumulator (see [`crate::dispatch::splice_generic`]).
pub fn splice_custom_codec_with_options(
    codec: &dyn Codec,
    direction: Direction,
    write_cb: &mut dyn Write,
    read_cb: &mut dyn Read,
    length: u64,
    options: Option<&dyn CodecOptions>,
) -> Result<()> {
    splice_generic(codec, direction, write_cb, read_cb, length, options)
}
