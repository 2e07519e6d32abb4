//! Growable buffer that accumulates a streamed response body.
//!
//! Growth happens in configurable chunk multiples so that thousands of small
//! network reads do not each trigger a reallocation. The buffer always keeps
//! one spare byte of capacity beyond its length so a response body can be
//! inspected as a terminated string without reallocating first.

/// Smallest accepted growth increment.
pub const MIN_BUFFER_CHUNK_SIZE: usize = 1024;

/// Default growth increment (1 MiB).
pub const DEFAULT_BUFFER_CHUNK_SIZE: usize = 1024 * 1024;

/// Byte buffer that grows in chunk multiples while a response streams in.
#[derive(Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    chunk_size: usize,
}

impl ResponseBuffer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            data: Vec::new(),
            chunk_size: chunk_size.max(MIN_BUFFER_CHUNK_SIZE),
        }
    }

    /// Appends one streamed body chunk.
    ///
    /// Capacity is extended by whole chunk multiples: one chunk for ordinary
    /// reads, or the ceiling multiple plus one chunk when a single incoming
    /// read is larger than the configured chunk size.
    pub fn write(&mut self, chunk: &[u8]) {
        let needed = self.data.len() + chunk.len() + 1;

        if needed > self.data.capacity() {
            let additional = if chunk.len() >= self.chunk_size {
                (chunk.len().div_ceil(self.chunk_size) + 1) * self.chunk_size
            } else {
                self.chunk_size
            };
            self.data.reserve(self.data.capacity() + additional - self.data.len());
        }

        self.data.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Hands the accumulated body to the caller (GET result path).
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_writes_grow_by_one_chunk() {
        let mut buf = ResponseBuffer::new(MIN_BUFFER_CHUNK_SIZE);
        buf.write(b"hello");
        assert_eq!(buf.len(), 5);
        assert!(buf.data.capacity() >= MIN_BUFFER_CHUNK_SIZE);
        assert!(buf.data.capacity() > buf.len());
    }

    #[test]
    fn chunk_size_floor_is_enforced() {
        let buf = ResponseBuffer::new(16);
        assert_eq!(buf.chunk_size, MIN_BUFFER_CHUNK_SIZE);
    }

    #[test]
    fn oversized_write_grows_by_ceiling_multiple() {
        let mut buf = ResponseBuffer::new(MIN_BUFFER_CHUNK_SIZE);
        let big = vec![0xabu8; MIN_BUFFER_CHUNK_SIZE * 3 + 17];
        buf.write(&big);
        assert_eq!(buf.len(), big.len());
        assert!(buf.data.capacity() > buf.len());
    }

    #[test]
    fn accumulates_in_arrival_order() {
        let mut buf = ResponseBuffer::new(MIN_BUFFER_CHUNK_SIZE);
        buf.write(b"abc");
        buf.write(b"def");
        assert_eq!(buf.as_slice(), b"abcdef");
        assert_eq!(buf.into_bytes(), b"abcdef".to_vec());
    }

    #[test]
    fn content_independent_of_chunk_size() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

        let mut small = ResponseBuffer::new(MIN_BUFFER_CHUNK_SIZE);
        let mut large = ResponseBuffer::new(DEFAULT_BUFFER_CHUNK_SIZE);

        for part in payload.chunks(1500) {
            small.write(part);
            large.write(part);
        }

        assert_eq!(small.into_bytes(), payload);
        assert_eq!(large.into_bytes(), payload);
    }
}
