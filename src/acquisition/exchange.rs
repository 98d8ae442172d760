// src/acquisition/exchange.rs
//! Double-buffered handoff between the capture side and the pipeline.
//!
//! Mirrors the DMA-style exchange of the embedded front-end: the producer
//! fills one block while the consumer drains the previously published one.
//! The slot between them holds at most a single block, so a stalled consumer
//! never sees stale data: publishing into an occupied slot displaces the old
//! block, and the displaced block is handed back to the producer side for
//! drop accounting.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::constants::capacity::{BLOCK_CAPACITY, CHANNELS};
use crate::utils::TimeProvider;

/// One block of multichannel frames as captured from the front-end.
///
/// Frames hold raw signed 24-bit converter codes widened to `i32`. The
/// timestamp marks the capture instant of the first frame in the block.
#[derive(Clone)]
pub struct SampleBlock {
    frames: [[i32; CHANNELS]; BLOCK_CAPACITY],
    len: usize,
    /// Capture timestamp of the first frame, in nanoseconds.
    pub timestamp: u64,
    /// Which of the two alternating capture buffers produced this block.
    pub buffer_id: u8,
}

impl SampleBlock {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self {
            frames: [[0; CHANNELS]; BLOCK_CAPACITY],
            len: 0,
            timestamp: 0,
            buffer_id: 0,
        }
    }

    /// Appends a frame. Returns `true` once the block is at capacity.
    /// Frames pushed into a full block are discarded.
    pub fn push_frame(&mut self, frame: [i32; CHANNELS]) -> bool {
        if self.len < BLOCK_CAPACITY {
            self.frames[self.len] = frame;
            self.len += 1;
        }
        self.len == BLOCK_CAPACITY
    }

    /// Valid frames of the block, oldest first.
    pub fn frames(&self) -> &[[i32; CHANNELS]] {
        &self.frames[..self.len]
    }

    /// Number of valid frames.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block holds no frames.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops all frames, keeping timestamp and buffer id untouched.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for SampleBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SampleBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBlock")
            .field("len", &self.len)
            .field("timestamp", &self.timestamp)
            .field("buffer_id", &self.buffer_id)
            .finish_non_exhaustive()
    }
}

struct Slot {
    block: Mutex<Option<SampleBlock>>,
    ready: Condvar,
}

/// Constructor for the producer/consumer pair of the exchange.
pub struct BlockExchange;

impl BlockExchange {
    /// Creates a connected producer/consumer pair.
    ///
    /// `block_size` is the frame count at which the producer publishes
    /// automatically; it must fit the block capacity, which the
    /// configuration layer guarantees.
    pub fn new(
        block_size: usize,
        time: Arc<dyn TimeProvider>,
    ) -> (BlockProducer, BlockConsumer) {
        debug_assert!((1..=BLOCK_CAPACITY).contains(&block_size));
        let slot = Arc::new(Slot {
            block: Mutex::new(None),
            ready: Condvar::new(),
        });
        let producer = BlockProducer {
            slot: Arc::clone(&slot),
            filling: SampleBlock::new(),
            block_size,
            next_id: 0,
            time,
        };
        let consumer = BlockConsumer { slot };
        (producer, consumer)
    }
}

/// Capture-side handle: fills blocks frame by frame and publishes them.
pub struct BlockProducer {
    slot: Arc<Slot>,
    filling: SampleBlock,
    block_size: usize,
    next_id: u8,
    time: Arc<dyn TimeProvider>,
}

impl BlockProducer {
    /// Appends one frame to the block being filled.
    ///
    /// When the block reaches the configured size it is published. If the
    /// slot still held an unconsumed block at that moment, the stale block
    /// is returned so the caller can count its frames as dropped.
    pub fn push_frame(&mut self, frame: [i32; CHANNELS]) -> Option<SampleBlock> {
        if self.filling.is_empty() {
            self.filling.timestamp = self.time.now_nanos();
        }
        self.filling.push_frame(frame);
        if self.filling.len() >= self.block_size {
            self.publish()
        } else {
            None
        }
    }

    /// Publishes a partially filled block. Returns a displaced stale block
    /// like [`push_frame`](Self::push_frame); a no-op when nothing is pending.
    pub fn flush(&mut self) -> Option<SampleBlock> {
        if self.filling.is_empty() {
            None
        } else {
            self.publish()
        }
    }

    /// Discards the partial fill, returning the number of frames thrown away.
    pub fn reset(&mut self) -> usize {
        let discarded = self.filling.len();
        self.filling.clear();
        discarded
    }

    /// Frames accumulated toward the next publish.
    pub fn pending(&self) -> usize {
        self.filling.len()
    }

    fn publish(&mut self) -> Option<SampleBlock> {
        let mut block = mem::replace(&mut self.filling, SampleBlock::new());
        block.buffer_id = self.next_id;
        self.next_id ^= 1;
        let displaced = self.slot.block.lock().replace(block);
        self.slot.ready.notify_one();
        displaced
    }
}

/// Pipeline-side handle: waits for published blocks.
pub struct BlockConsumer {
    slot: Arc<Slot>,
}

impl BlockConsumer {
    /// Waits up to `timeout` for a published block.
    ///
    /// Returns `None` when the wait expires without new data, which the
    /// acquisition stage treats as an idle poll rather than a fault.
    pub fn read_buffer(&mut self, timeout: Duration) -> Option<SampleBlock> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.block.lock();
        while slot.is_none() {
            if self.slot.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }

    /// Takes a pending block without waiting. Used when draining on reset.
    pub fn try_read(&mut self) -> Option<SampleBlock> {
        self.slot.block.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MockTimeProvider;
    use std::thread;

    fn exchange(block_size: usize) -> (BlockProducer, BlockConsumer) {
        BlockExchange::new(block_size, Arc::new(MockTimeProvider::new(1_000)))
    }

    #[test]
    fn test_block_fills_to_capacity() {
        let mut block = SampleBlock::new();
        assert!(block.is_empty());
        for i in 0..BLOCK_CAPACITY {
            let full = block.push_frame([i as i32; CHANNELS]);
            assert_eq!(full, i == BLOCK_CAPACITY - 1);
        }
        assert_eq!(block.len(), BLOCK_CAPACITY);
        // Extra frames are discarded.
        block.push_frame([99; CHANNELS]);
        assert_eq!(block.len(), BLOCK_CAPACITY);
        assert_eq!(block.frames()[0], [0; CHANNELS]);
    }

    #[test]
    fn test_publish_and_read() {
        let (mut producer, mut consumer) = exchange(4);
        for i in 0..4 {
            assert!(producer.push_frame([i; CHANNELS]).is_none());
        }
        let block = consumer.read_buffer(Duration::from_millis(1)).unwrap();
        assert_eq!(block.len(), 4);
        assert_eq!(block.buffer_id, 0);
        assert_eq!(block.timestamp, 1_000);
        assert_eq!(block.frames()[2], [2; CHANNELS]);
        // Slot is now empty again.
        assert!(consumer.read_buffer(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_buffer_ids_alternate() {
        let (mut producer, mut consumer) = exchange(1);
        for expected in [0u8, 1, 0] {
            producer.push_frame([7; CHANNELS]);
            let block = consumer.try_read().unwrap();
            assert_eq!(block.buffer_id, expected);
        }
    }

    #[test]
    fn test_stale_block_is_displaced() {
        let (mut producer, mut consumer) = exchange(2);
        producer.push_frame([1; CHANNELS]);
        assert!(producer.push_frame([1; CHANNELS]).is_none());
        producer.push_frame([2; CHANNELS]);
        let displaced = producer.push_frame([2; CHANNELS]).expect("stale block");
        assert_eq!(displaced.buffer_id, 0);
        assert_eq!(displaced.len(), 2);
        // The consumer only ever sees the fresh block.
        let fresh = consumer.try_read().unwrap();
        assert_eq!(fresh.buffer_id, 1);
        assert_eq!(fresh.frames()[0], [2; CHANNELS]);
    }

    #[test]
    fn test_flush_publishes_partial_block() {
        let (mut producer, mut consumer) = exchange(8);
        assert!(producer.flush().is_none());
        producer.push_frame([5; CHANNELS]);
        producer.push_frame([6; CHANNELS]);
        producer.flush();
        let block = consumer.try_read().unwrap();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_reset_discards_partial_fill() {
        let (mut producer, mut consumer) = exchange(8);
        producer.push_frame([5; CHANNELS]);
        producer.push_frame([6; CHANNELS]);
        assert_eq!(producer.reset(), 2);
        assert_eq!(producer.pending(), 0);
        assert!(producer.flush().is_none());
        assert!(consumer.try_read().is_none());
    }

    #[test]
    fn test_timestamp_marks_first_frame() {
        let clock = Arc::new(MockTimeProvider::new(100));
        let (mut producer, mut consumer) = BlockExchange::new(3, clock.clone());
        producer.push_frame([0; CHANNELS]);
        clock.advance_by(5_000);
        producer.push_frame([0; CHANNELS]);
        producer.push_frame([0; CHANNELS]);
        let block = consumer.try_read().unwrap();
        assert_eq!(block.timestamp, 100);
    }

    #[test]
    fn test_consumer_wakes_on_publish() {
        let (mut producer, mut consumer) = exchange(1);
        let reader = thread::spawn(move || consumer.read_buffer(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(10));
        producer.push_frame([42; CHANNELS]);
        let block = reader.join().unwrap().expect("block before timeout");
        assert_eq!(block.frames()[0], [42; CHANNELS]);
    }
}
