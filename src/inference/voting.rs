// src/inference/voting.rs
//! Temporal smoothing of classifier output.
//!
//! A small ring of recent predictions absorbs single-window flicker. The
//! smoothed class is the majority over the ring, with ties resolved in
//! favour of the most recent prediction, and the smoothed confidence is the
//! integer mean over the entries that voted for the winning class.

use crate::config::constants::capacity::VOTE_DEPTH;
use crate::inference::model::Prediction;

/// Ring buffer of the most recent predictions.
#[derive(Debug, Clone)]
pub struct VotingBuffer {
    entries: [Prediction; VOTE_DEPTH],
    cursor: usize,
    len: usize,
}

impl VotingBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            entries: [Prediction {
                class: 0,
                confidence: 0,
            }; VOTE_DEPTH],
            cursor: 0,
            len: 0,
        }
    }

    /// Records one prediction, evicting the oldest once the ring is full.
    pub fn add_prediction(&mut self, prediction: Prediction) {
        self.entries[self.cursor] = prediction;
        self.cursor = (self.cursor + 1) % VOTE_DEPTH;
        self.len = (self.len + 1).min(VOTE_DEPTH);
    }

    /// Majority class over the ring with its mean confidence.
    ///
    /// Returns `None` while the ring is empty.
    pub fn majority(&self) -> Option<Prediction> {
        if self.len == 0 {
            return None;
        }

        // Scanning newest first and replacing only on a strictly larger
        // count makes ties land on the most recent class.
        let mut best_class = 0u8;
        let mut best_count = 0usize;
        for age in 0..self.len {
            let class = self.entry_at(age).class;
            let count = (0..self.len)
                .filter(|&other| self.entry_at(other).class == class)
                .count();
            if count > best_count {
                best_count = count;
                best_class = class;
            }
        }

        let mut confidence_sum = 0u32;
        for age in 0..self.len {
            let entry = self.entry_at(age);
            if entry.class == best_class {
                confidence_sum += entry.confidence as u32;
            }
        }
        Some(Prediction {
            class: best_class,
            confidence: (confidence_sum / best_count as u32) as u8,
        })
    }

    /// Forgets every recorded prediction.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.len = 0;
    }

    /// Recorded predictions, at most the ring depth.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Age 0 is the newest entry.
    fn entry_at(&self, age: usize) -> Prediction {
        debug_assert!(age < self.len);
        let index = (self.cursor + VOTE_DEPTH - 1 - age) % VOTE_DEPTH;
        self.entries[index]
    }
}

impl Default for VotingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
