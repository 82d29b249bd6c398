// src/uart/ring.rs
//! Fixed-capacity single-producer/single-consumer byte ring
//!
//! One slot is always left free so that `head == tail` means empty and
//! `head + 1 == tail` means full without a separate counter.

use std::sync::{
    atomic::{
        AtomicU8, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
    Arc,
};

/// Default number of slots for each direction of a UART transport
pub const UART_BUFFER_SIZE: usize = 512;

// Push at HEAD, pop at TAIL
pub struct RingBuffer<const N: usize> {
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicUsize,
    buf: [AtomicU8; N],
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    const VALID_CAPACITY: () = assert!(N >= 2, "a ring buffer needs at least two slots");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;

        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            buf: std::array::from_fn(|_| AtomicU8::new(0)),
        }
    }

    /// Number of bytes the ring can hold at once (one less than its slot count)
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Store one byte, returning `false` if the ring is full. The byte is
    /// dropped in that case and counted in [`RingBuffer::dropped`].
    pub fn push(&mut self, byte: u8) -> bool {
        self.enqueue(byte)
    }

    /// Take the oldest byte, or `None` when empty
    pub fn pop(&mut self) -> Option<u8> {
        self.dequeue()
    }

    pub fn available(&self) -> usize {
        self.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Acquire) == self.tail.load(Acquire)
    }

    pub fn is_full(&self) -> bool {
        (self.head.load(Acquire) + 1) % N == self.tail.load(Acquire)
    }

    /// Bytes rejected because the ring was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Relaxed)
    }

    /// Rewind both indices to zero and clear the storage
    pub fn reset(&mut self) {
        *self.head.get_mut() = 0;
        *self.tail.get_mut() = 0;
        for slot in self.buf.iter_mut() {
            *slot.get_mut() = 0;
        }
    }

    /// Hand the ring over to exactly one producer and one consumer.
    pub fn split(self) -> (Producer<N>, Consumer<N>) {
        let ring = Arc::new(self);
        (Producer(Arc::clone(&ring)), Consumer(ring))
    }

    // Only the producer stores `head`
    fn enqueue(&self, byte: u8) -> bool {
        let head = self.head.load(Relaxed);
        let next = (head + 1) % N;

        if next == self.tail.load(Acquire) {
            self.dropped.fetch_add(1, Relaxed);
            return false;
        }

        self.buf[head].store(byte, Relaxed);
        self.head.store(next, Release);
        true
    }

    // Only the consumer stores `tail`
    fn dequeue(&self) -> Option<u8> {
        let tail = self.tail.load(Relaxed);

        if tail == self.head.load(Acquire) {
            return None;
        }

        let byte = self.buf[tail].load(Relaxed);
        self.tail.store((tail + 1) % N, Release);
        Some(byte)
    }

    fn occupancy(&self) -> usize {
        let head = self.head.load(Acquire);
        let tail = self.tail.load(Acquire);
        (N + head - tail) % N
    }

    fn discard(&self) {
        self.tail.store(self.head.load(Acquire), Release);
    }
}

/// Write half of a split [`RingBuffer`]
pub struct Producer<const N: usize>(Arc<RingBuffer<N>>);

impl<const N: usize> Producer<N> {
    pub fn push(&mut self, byte: u8) -> bool {
        self.0.enqueue(byte)
    }

    pub fn available(&self) -> usize {
        self.0.occupancy()
    }

    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.0.dropped()
    }
}

/// Read half of a split [`RingBuffer`]
pub struct Consumer<const N: usize>(Arc<RingBuffer<N>>);

impl<const N: usize> Consumer<N> {
    pub fn pop(&mut self) -> Option<u8> {
        self.0.dequeue()
    }

    pub fn available(&self) -> usize {
        self.0.occupancy()
    }

    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.0.dropped()
    }

    /// Discard everything queued so far. The producer keeps running; only
    /// `tail` moves, so this is safe while bytes are still arriving.
    pub fn reset(&mut self) {
        self.0.discard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fills_to_capacity_minus_one() {
        let mut ring = RingBuffer::<8>::new();

        for b in 0..7u8 {
            assert!(ring.push(b));
        }
        assert!(ring.is_full());
        assert!(!ring.push(0xaa));
        assert!(!ring.push(0xbb));
        assert_eq!(ring.dropped(), 2);
        assert_eq!(ring.available(), 7);

        for b in 0..7u8 {
            assert_eq!(ring.pop(), Some(b));
        }
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_available_tracks_pushes_and_pops() {
        let mut ring = RingBuffer::<16>::new();

        for k in 0..=15usize {
            for j in 0..=k {
                ring.reset();
                for b in 0..k {
                    ring.push(b as u8);
                }
                for _ in 0..j {
                    ring.pop();
                }
                assert_eq!(ring.available(), k - j);
            }
        }
    }

    #[test]
    fn test_wraps_around() {
        let mut ring = RingBuffer::<4>::new();

        for round in 0..10u8 {
            assert!(ring.push(round));
            assert!(ring.push(round.wrapping_add(100)));
            assert_eq!(ring.available(), 2);
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round.wrapping_add(100)));
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn test_reset_rewinds() {
        let mut ring = RingBuffer::<4>::new();
        ring.push(1);
        ring.push(2);
        ring.pop();

        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.pop(), None);

        assert!(ring.push(7));
        assert!(ring.push(8));
        assert!(ring.push(9));
        assert!(!ring.push(10));
        assert_eq!(ring.pop(), Some(7));
    }

    #[test]
    fn test_consumer_reset_discards() {
        let (mut tx, mut rx) = RingBuffer::<8>::new().split();
        tx.push(1);
        tx.push(2);
        assert_eq!(rx.available(), 2);

        rx.reset();
        assert!(rx.is_empty());
        assert_eq!(rx.pop(), None);

        tx.push(3);
        assert_eq!(rx.pop(), Some(3));
    }

    #[test]
    fn test_split_shares_drop_count() {
        let (mut tx, rx) = RingBuffer::<2>::new().split();
        assert!(tx.push(1));
        assert!(!tx.push(2));
        assert!(rx.is_full());
        assert_eq!(rx.dropped(), 1);
    }

    #[test]
    fn test_fifo_across_threads() {
        const TOTAL: usize = 100_000;
        let (mut tx, mut rx) = RingBuffer::<64>::new().split();

        let producer = thread::spawn(move || {
            for i in 0..TOTAL {
                while !tx.push(i as u8) {
                    std::hint::spin_loop();
                }
            }
        });

        let mut expected = 0usize;
        while expected < TOTAL {
            if let Some(b) = rx.pop() {
                assert_eq!(b, expected as u8);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
