// src/processing/window.rs
//! Sliding analysis window with 50 % overlap.
//!
//! Conditioned frames accumulate until the window fills; the owner then
//! extracts features and calls [`SlidingWindow::advance`], which shifts the
//! newer half down so consecutive windows share half their samples. The
//! write cursor therefore always sits in `hop..=size` once the first window
//! has fired, and a trailing partial window is simply never extracted.

use crate::config::constants::capacity::{CHANNELS, WINDOW_CAPACITY};

/// Fixed-capacity multichannel window over conditioned samples.
pub struct SlidingWindow {
    samples: [[f32; CHANNELS]; WINDOW_CAPACITY],
    size: usize,
    hop: usize,
    cursor: usize,
}

impl SlidingWindow {
    /// Creates a window of `size` samples with a hop of half the size.
    ///
    /// The configuration layer guarantees `size` is even and within the
    /// buffer capacity.
    pub fn new(size: usize) -> Self {
        debug_assert!(size % 2 == 0 && size <= WINDOW_CAPACITY);
        Self {
            samples: [[0.0; CHANNELS]; WINDOW_CAPACITY],
            size,
            hop: size / 2,
            cursor: 0,
        }
    }

    /// Appends one conditioned frame. Returns `true` when the window just
    /// became full and is ready for extraction.
    ///
    /// Frames pushed while the window is ready are discarded; the owner is
    /// expected to extract and [`advance`](Self::advance) first.
    pub fn push(&mut self, frame: [f32; CHANNELS]) -> bool {
        if self.cursor < self.size {
            self.samples[self.cursor] = frame;
            self.cursor += 1;
        }
        self.cursor == self.size
    }

    /// Whether a full window is available.
    pub fn is_ready(&self) -> bool {
        self.cursor == self.size
    }

    /// Accumulated frames, oldest first. Spans the full window when ready.
    pub fn frames(&self) -> &[[f32; CHANNELS]] {
        &self.samples[..self.cursor]
    }

    /// Slides the window forward by the hop, keeping the newer half.
    pub fn advance(&mut self) {
        debug_assert!(self.is_ready());
        self.samples.copy_within(self.hop..self.size, 0);
        self.cursor = self.size - self.hop;
    }

    /// Discards all accumulated samples.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Configured window size in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Samples the window moves per extraction.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Frames currently accumulated.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Whether no frames are accumulated.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }
}
