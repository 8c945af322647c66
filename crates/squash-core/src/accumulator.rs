/// A growable byte buffer used by the accumulator and mmap retry paths to
/// size an output buffer when the decompressed length is unknown.
///
/// `length` is always `<= capacity` (`data.capacity()`). [`ExpandableBuffer::set_size`]
/// grows capacity to at least the requested size but never shrinks it, so
/// repeated `BufferFull`-retry-doubling never triggers a spurious reallocation
/// on the way back down (e.g. after [`ExpandableBuffer::truncate`]).
pub struct ExpandableBuffer {
    data: Vec<u8>,
    length: usize,
}

impl ExpandableBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new(), length: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), length: 0 }
    }

    /// Grows capacity to at least `n` bytes, filling any newly exposed
    /// region with zeros, and sets the logical length to `n`. Never shrinks
    /// the backing allocation.
    pub fn set_size(&mut self, n: usize) {
        if n > self.data.len() {
            self.data.resize(n, 0);
        }
        self.length = n;
    }

    /// Shrinks the logical length without touching the allocation.
    pub fn truncate(&mut self, n: usize) {
        self.length = self.length.min(n);
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.length]
    }

    /// Appends `bytes` to the end of the logical region, growing capacity
    /// as needed (amortized doubling via `Vec::extend_from_slice`).
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        if self.length < self.data.len() {
            self.data.truncate(self.length);
        }
        self.data.extend_from_slice(bytes);
        self.length = self.data.len();
    }
}

impl Default for ExpandableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_size_grows_without_shrinking_capacity() {
        let mut buf = ExpandableBuffer::new();
        buf.set_size(1024);
        let cap = buf.capacity();
        assert_eq!(buf.len(), 1024);
        buf.truncate(16);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.capacity(), cap);
        buf.set_size(32);
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn extend_from_slice_accumulates() {
        let mut buf = ExpandableBuffer::new();
        buf.extend_from_slice(b"hello ");
        buf.extend_from_slice(b"world");
        assert_eq!(buf.as_slice(), b"hello world");
    }
}
