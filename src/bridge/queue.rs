//! Fixed-capacity byte FIFO.
//!
//! Both directions of a client connection use one of these. The
//! network → serial side only ever accepts what fits ([`ByteQueue::push_bounded`]),
//! so the socket itself applies backpressure. The serial → network side
//! overwrites its oldest bytes instead ([`ByteQueue::push_overwrite`]): a UART
//! cannot be paused, so a slow client loses history rather than stalling
//! everyone else.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct ByteQueue {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl ByteQueue {
    /// Allocates the full capacity up front; the queue never grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Room left before the queue is full.
    pub fn free(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Append as much of `data` as fits and return how many bytes were taken.
    pub fn push_bounded(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        self.buf.extend(&data[..n]);
        n
    }

    /// Append all of `data`, discarding the oldest bytes on overflow.
    ///
    /// Returns the number of bytes lost, counting any part of `data` itself
    /// that could never fit.
    pub fn push_overwrite(&mut self, data: &[u8]) -> usize {
        let skipped = data.len().saturating_sub(self.capacity);
        let data = &data[skipped..];

        let overflow = (self.buf.len() + data.len()).saturating_sub(self.capacity);
        self.buf.drain(..overflow);
        self.buf.extend(data);

        skipped + overflow
    }

    /// The oldest contiguous run of queued bytes.
    pub fn front(&self) -> &[u8] {
        self.buf.as_slices().0
    }

    /// Drop `n` bytes from the front after they were handed on.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    /// Empty the queue, returning how many bytes were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.clear();
        n
    }

    #[cfg(test)]
    fn to_vec(&self) -> Vec<u8> {
        self.buf.iter().copied().collect()
    }
}
