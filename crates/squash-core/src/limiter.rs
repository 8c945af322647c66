use std::io::{self, Read, Write};

use crate::codec::Direction;

/// Wraps a user-supplied reader so it reports end-of-stream once `remaining`
/// uncompressed bytes have been read. Used on the *input* side when
/// compressing with a budget.
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, remaining: u64) -> Self {
        Self { inner, remaining }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Wraps a user-supplied writer so it silently truncates output once
/// `remaining` uncompressed bytes have been written. Used on the *output*
/// side when decompressing with a budget — per the specification, excess
/// codec output beyond the budget is discarded without surfacing an error.
pub struct LimitedWriter<W> {
    inner: W,
    remaining: u64,
    written: u64,
}

impl<W: Write> LimitedWriter<W> {
    pub fn new(inner: W, remaining: u64) -> Self {
        Self { inner, remaining, written: 0 }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LimitedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            // Budget exhausted: report the full slice as "written" so callers
            // (e.g. the stream loop) don't spin retrying a short write; the
            // bytes are simply dropped, matching the spec's silent-truncation
            // contract for over-budget decompression output.
            return Ok(buf.len());
        }
        let cap = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.write(&buf[..cap])?;
        self.remaining -= n as u64;
        self.written += n as u64;
        if cap < buf.len() && n == cap {
            // Wrote everything the budget allowed; absorb the rest silently
            // rather than reporting a short write the caller would retry.
            return Ok(buf.len());
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Picks which side of a splice carries the byte budget, based on direction,
/// and returns the limited reader/writer pair as trait objects so the
/// dispatcher's inner loops don't need to know which side is limited.
pub fn apply_budget<'a>(
    direction: Direction,
    source: &'a mut dyn Read,
    sink: &'a mut dyn Write,
    length: u64,
) -> (Box<dyn Read + 'a>, Box<dyn Write + 'a>) {
    if length == 0 {
        return (Box::new(PassthroughRead(source)), Box::new(PassthroughWrite(sink)));
    }
    match direction {
        Direction::Compress => (
            Box::new(LimitedReader::new(PassthroughRead(source), length)),
            Box::new(PassthroughWrite(sink)),
        ),
        Direction::Decompress => (
            Box::new(PassthroughRead(source)),
            Box::new(LimitedWriter::new(PassthroughWrite(sink), length)),
        ),
    }
}

struct PassthroughRead<'a>(&'a mut dyn Read);
impl Read for PassthroughRead<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

struct PassthroughWrite<'a>(&'a mut dyn Write);
impl Write for PassthroughWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn limited_reader_stops_at_budget() {
        let mut reader = LimitedReader::new(Cursor::new(b"hello world".to_vec()), 5);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn limited_writer_truncates_silently() {
        let mut writer = LimitedWriter::new(Vec::new(), 5);
        writer.write_all(b"hello world").unwrap();
        assert_eq!(writer.written(), 5);
        assert_eq!(writer.into_inner(), b"hello");
    }
}
