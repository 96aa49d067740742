//! Ring buffer backing one direction of a pipe.
//!
//! The buffer is tracked by `offset` (first valid byte) and `len` (number of
//! valid bytes). All index arithmetic goes through [`RingBuffer::wrap`], so
//! the `len <= capacity` and `offset < capacity` invariants are enforced in
//! one place.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{Error, ErrorKind, Result};

/// A fixed-capacity circular byte buffer allocated on the heap.
#[derive(Debug)]
pub struct RingBuffer {
    /// The underlying storage.
    buffer: Box<[u8]>,

    /// Start of valid data.
    offset: usize,

    /// Current number of bytes in buffer.
    len: usize,
}

impl RingBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    ///
    /// Fails with `AllocationFailure` instead of aborting when the allocator
    /// refuses the request.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| Error::new(ErrorKind::AllocationFailure))?;
        storage.resize(capacity, 0u8);

        Ok(Self {
            buffer: storage.into_boxed_slice(),
            offset: 0,
            len: 0,
        })
    }

    /// Returns the number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Returns the buffer capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the number of bytes that can be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Drops all queued bytes.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.len = 0;
    }

    /// Maps a logical position in `0..2 * capacity` onto the backing array.
    #[inline]
    fn wrap(&self, pos: usize) -> usize {
        let capacity = self.capacity();
        debug_assert!(pos < 2 * capacity);
        if pos >= capacity { pos - capacity } else { pos }
    }

    /// Appends as much of `data` as fits.
    ///
    /// Returns the number of bytes written, which is 0 only if `data` is
    /// empty or the buffer is full.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let to_write = core::cmp::min(data.len(), self.remaining());
        if to_write == 0 {
            return 0;
        }

        let start = self.wrap(self.offset + self.len);

        // One or two chunks, depending on whether the run crosses the end
        let first_chunk = core::cmp::min(to_write, self.capacity() - start);
        self.buffer[start..start + first_chunk].copy_from_slice(&data[..first_chunk]);

        if to_write > first_chunk {
            let second_chunk = to_write - first_chunk;
            self.buffer[..second_chunk].copy_from_slice(&data[first_chunk..to_write]);
        }

        self.len += to_write;
        debug_assert!(self.len <= self.capacity());

        to_write
    }

    /// Copies queued bytes into `buf` without consuming them.
    ///
    /// Returns the number of bytes copied.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let to_read = core::cmp::min(buf.len(), self.len);
        if to_read == 0 {
            return 0;
        }

        let first_chunk = core::cmp::min(to_read, self.capacity() - self.offset);
        buf[..first_chunk].copy_from_slice(&self.buffer[self.offset..self.offset + first_chunk]);

        if to_read > first_chunk {
            let second_chunk = to_read - first_chunk;
            buf[first_chunk..to_read].copy_from_slice(&self.buffer[..second_chunk]);
        }

        to_read
    }

    /// Moves queued bytes into `buf`.
    ///
    /// Returns the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.peek(buf);
        self.consume(n);
        n
    }

    /// Discards up to `count` queued bytes.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = core::cmp::min(count, self.len);
        self.len -= count;
        if self.len == 0 {
            // Empty buffers restart at the front so the next write is contiguous
            self.offset = 0;
        } else {
            self.offset = self.wrap(self.offset + count);
        }
        count
    }

    /// Returns the queued bytes as two slices, the second possibly empty.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        if self.len == 0 {
            return (&[], &[]);
        }

        if self.offset + self.len <= self.capacity() {
            (&self.buffer[self.offset..self.offset + self.len], &[])
        } else {
            let second_len = self.len - (self.capacity() - self.offset);
            (&self.buffer[self.offset..], &self.buffer[..second_len])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_write_read() {
        let mut buf = RingBuffer::try_with_capacity(64).unwrap();

        let written = buf.write(b"Hello");
        assert_eq!(written, 5);
        assert_eq!(buf.len(), 5);

        let mut out = [0u8; 10];
        let read = buf.read(&mut out);
        assert_eq!(read, 5);
        assert_eq!(&out[..5], b"Hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wrap_around() {
        let mut buf = RingBuffer::try_with_capacity(8).unwrap();

        buf.write(b"12345");

        let mut out = [0u8; 3];
        buf.read(&mut out);
        assert_eq!(&out, b"123");
        assert_eq!(buf.len(), 2);

        // Starts at physical offset 5 and wraps after three bytes
        assert_eq!(buf.write(b"ABCDE"), 5);
        assert_eq!(buf.len(), 7);

        let (s1, s2) = buf.as_slices();
        assert_eq!(s1, b"45ABC");
        assert_eq!(s2, b"DE");

        let mut out = [0u8; 8];
        let read = buf.read(&mut out);
        assert_eq!(read, 7);
        assert_eq!(&out[..7], b"45ABCDE");
    }

    #[test]
    fn test_partial_write_when_nearly_full() {
        let mut buf = RingBuffer::try_with_capacity(8).unwrap();

        assert_eq!(buf.write(b"123456"), 6);
        assert_eq!(buf.write(b"ABCD"), 2);
        assert!(buf.is_full());
        assert_eq!(buf.write(b"Z"), 0);

        let mut out = [0u8; 8];
        assert_eq!(buf.read(&mut out), 8);
        assert_eq!(&out, b"123456AB");
    }

    #[test]
    fn test_offset_resets_when_drained() {
        let mut buf = RingBuffer::try_with_capacity(8).unwrap();

        buf.write(b"abcdef");
        let mut out = [0u8; 6];
        buf.read(&mut out);
        assert!(buf.is_empty());

        // A full-capacity write after draining lands in one chunk
        assert_eq!(buf.write(b"01234567"), 8);
        let (s1, s2) = buf.as_slices();
        assert_eq!(s1, b"01234567");
        assert!(s2.is_empty());
    }

    #[test]
    fn test_peek_and_consume() {
        let mut buf = RingBuffer::try_with_capacity(32).unwrap();
        buf.write(b"Test data");

        let mut out1 = [0u8; 4];
        let mut out2 = [0u8; 4];
        buf.peek(&mut out1);
        buf.peek(&mut out2);
        assert_eq!(&out1, b"Test");
        assert_eq!(&out2, b"Test");
        assert_eq!(buf.len(), 9);

        assert_eq!(buf.consume(5), 5);
        let mut rest = [0u8; 8];
        assert_eq!(buf.read(&mut rest), 4);
        assert_eq!(&rest[..4], b"data");
        assert_eq!(buf.consume(1), 0);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut buf = RingBuffer::try_with_capacity(7).unwrap();
        let mut out = [0u8; 3];

        for round in 0..50u8 {
            buf.write(&[round; 5]);
            assert!(buf.len() <= buf.capacity());
            if round % 2 == 0 {
                buf.read(&mut out);
            }
        }
        assert!(buf.is_full());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RingBuffer::try_with_capacity(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_oversized_allocation_fails() {
        let err = RingBuffer::try_with_capacity(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    }
}
