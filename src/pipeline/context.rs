// src/pipeline/context.rs
//! Shared observability state for a running pipeline.
//!
//! Stages publish into atomics so readers never take a lock on the hot
//! path. Counters are monotonic over the pipeline lifetime; gauges reflect
//! the most recent window. A snapshot is a coherent-enough copy for logs
//! and dashboards, not a transactional read.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Pipeline lifecycle mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PipelineMode {
    /// Not started or already shut down.
    Idle = 0,
    /// Stages are consuming and producing.
    Running = 1,
    /// Stages drained their queues and parked.
    Paused = 2,
}

impl PipelineMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineMode::Running,
            2 => PipelineMode::Paused,
            _ => PipelineMode::Idle,
        }
    }
}

/// Progress of the most recent window through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum WindowPhase {
    /// Fewer than a full window of samples accumulated.
    Accumulating = 0,
    /// A full window is available for extraction.
    WindowReady = 1,
    /// Features were assembled from the window.
    Extracted = 2,
    /// The classifier produced a prediction.
    Classified = 3,
    /// The vote ring produced a smoothed prediction.
    Voted = 4,
    /// The decision cleared the gate and was delivered.
    Emitted = 5,
    /// The decision stayed below the gate and was held.
    Held = 6,
}

impl WindowPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WindowPhase::WindowReady,
            2 => WindowPhase::Extracted,
            3 => WindowPhase::Classified,
            4 => WindowPhase::Voted,
            5 => WindowPhase::Emitted,
            6 => WindowPhase::Held,
            _ => WindowPhase::Accumulating,
        }
    }
}

/// Monotonic throughput and drop counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    samples_acquired: AtomicU64,
    samples_dropped: AtomicU64,
    blocks_published: AtomicU64,
    blocks_dropped: AtomicU64,
    windows_extracted: AtomicU64,
    features_dropped: AtomicU64,
    predictions: AtomicU64,
    votes_dropped: AtomicU64,
    decisions_emitted: AtomicU64,
    decisions_held: AtomicU64,
    last_condition_micros: AtomicU64,
    max_condition_micros: AtomicU64,
    last_infer_micros: AtomicU64,
    max_infer_micros: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn add_samples_acquired(&self, n: u64) {
        self.samples_acquired.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_samples_dropped(&self, n: u64) {
        self.samples_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_blocks_published(&self) {
        self.blocks_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_blocks_dropped(&self, n: u64) {
        self.blocks_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_windows_extracted(&self) {
        self.windows_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_features_dropped(&self, n: u64) {
        self.features_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_predictions(&self) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_votes_dropped(&self, n: u64) {
        self.votes_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_decisions_emitted(&self) {
        self.decisions_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_decisions_held(&self) {
        self.decisions_held.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_condition_micros(&self, micros: u64) {
        self.last_condition_micros.store(micros, Ordering::Relaxed);
        self.max_condition_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_infer_micros(&self, micros: u64) {
        self.last_infer_micros.store(micros, Ordering::Relaxed);
        self.max_infer_micros.fetch_max(micros, Ordering::Relaxed);
    }
}

/// Observability handle shared by every stage and the controller.
#[derive(Debug)]
pub struct PipelineContext {
    stats: PipelineStats,
    mode: AtomicU8,
    phase: AtomicU8,
    gesture: AtomicU8,
    confidence: AtomicU8,
    fault: RwLock<Option<String>>,
}

impl PipelineContext {
    pub(crate) fn new() -> Self {
        Self {
            stats: PipelineStats::default(),
            mode: AtomicU8::new(PipelineMode::Idle as u8),
            phase: AtomicU8::new(WindowPhase::Accumulating as u8),
            gesture: AtomicU8::new(0),
            confidence: AtomicU8::new(0),
            fault: RwLock::new(None),
        }
    }

    /// Stage-side access to the counters.
    pub(crate) fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Current lifecycle mode.
    pub fn mode(&self) -> PipelineMode {
        PipelineMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub(crate) fn set_mode(&self, mode: PipelineMode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    /// Phase of the most recent window.
    pub fn phase(&self) -> WindowPhase {
        WindowPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub(crate) fn set_phase(&self, phase: WindowPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Most recently emitted gesture class and its confidence.
    pub fn current_gesture(&self) -> (u8, u8) {
        (
            self.gesture.load(Ordering::Relaxed),
            self.confidence.load(Ordering::Relaxed),
        )
    }

    pub(crate) fn set_gesture(&self, class: u8, confidence: u8) {
        self.gesture.store(class, Ordering::Relaxed);
        self.confidence.store(confidence, Ordering::Relaxed);
    }

    /// First recorded fault, if any. Later faults keep the root cause.
    pub fn fault(&self) -> Option<String> {
        self.fault.read().clone()
    }

    pub(crate) fn record_fault(&self, fault: impl Into<String>) {
        let mut slot = self.fault.write();
        if slot.is_none() {
            *slot = Some(fault.into());
        }
    }

    /// Copies every counter and gauge into a plain struct.
    pub fn snapshot(&self) -> StatsSnapshot {
        let stats = &self.stats;
        StatsSnapshot {
            mode: self.mode(),
            phase: self.phase(),
            gesture: self.gesture.load(Ordering::Relaxed),
            confidence: self.confidence.load(Ordering::Relaxed),
            fault: self.fault(),
            samples_acquired: stats.samples_acquired.load(Ordering::Relaxed),
            samples_dropped: stats.samples_dropped.load(Ordering::Relaxed),
            blocks_published: stats.blocks_published.load(Ordering::Relaxed),
            blocks_dropped: stats.blocks_dropped.load(Ordering::Relaxed),
            windows_extracted: stats.windows_extracted.load(Ordering::Relaxed),
            features_dropped: stats.features_dropped.load(Ordering::Relaxed),
            predictions: stats.predictions.load(Ordering::Relaxed),
            votes_dropped: stats.votes_dropped.load(Ordering::Relaxed),
            decisions_emitted: stats.decisions_emitted.load(Ordering::Relaxed),
            decisions_held: stats.decisions_held.load(Ordering::Relaxed),
            last_condition_micros: stats.last_condition_micros.load(Ordering::Relaxed),
            max_condition_micros: stats.max_condition_micros.load(Ordering::Relaxed),
            last_infer_micros: stats.last_infer_micros.load(Ordering::Relaxed),
            max_infer_micros: stats.max_infer_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Lifecycle mode at snapshot time.
    pub mode: PipelineMode,
    /// Phase of the most recent window.
    pub phase: WindowPhase,
    /// Most recently emitted gesture class.
    pub gesture: u8,
    /// Confidence of the most recently emitted gesture.
    pub confidence: u8,
    /// First recorded fault, if any.
    pub fault: Option<String>,
    /// Frames read from the signal source.
    pub samples_acquired: u64,
    /// Frames lost to displaced or discarded blocks.
    pub samples_dropped: u64,
    /// Blocks handed to the conditioning queue.
    pub blocks_published: u64,
    /// Blocks evicted from the conditioning queue.
    pub blocks_dropped: u64,
    /// Full windows turned into feature vectors.
    pub windows_extracted: u64,
    /// Feature vectors evicted from the inference queue.
    pub features_dropped: u64,
    /// Predictions produced by the classifier.
    pub predictions: u64,
    /// Smoothed votes evicted from the decision queue.
    pub votes_dropped: u64,
    /// Decisions that cleared the gate and were delivered.
    pub decisions_emitted: u64,
    /// Decisions held back below the gate.
    pub decisions_held: u64,
    /// Conditioning time of the most recent block, in microseconds.
    pub last_condition_micros: u64,
    /// Worst conditioning time seen, in microseconds.
    pub max_condition_micros: u64,
    /// Inference time of the most recent vector, in microseconds.
    pub last_infer_micros: u64,
    /// Worst inference time seen, in microseconds.
    pub max_infer_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_into_snapshot() {
        let context = PipelineContext::new();
        context.stats().add_samples_acquired(64);
        context.stats().add_samples_acquired(64);
        context.stats().incr_blocks_published();
        context.stats().incr_windows_extracted();
        context.stats().incr_decisions_held();

        let snapshot = context.snapshot();
        assert_eq!(snapshot.samples_acquired, 128);
        assert_eq!(snapshot.blocks_published, 1);
        assert_eq!(snapshot.windows_extracted, 1);
        assert_eq!(snapshot.decisions_held, 1);
        assert_eq!(snapshot.decisions_emitted, 0);
    }

    #[test]
    fn test_max_timing_keeps_the_peak() {
        let context = PipelineContext::new();
        context.stats().record_infer_micros(120);
        context.stats().record_infer_micros(40);
        let snapshot = context.snapshot();
        assert_eq!(snapshot.last_infer_micros, 40);
        assert_eq!(snapshot.max_infer_micros, 120);
    }

    #[test]
    fn test_mode_and_phase_round_trip() {
        let context = PipelineContext::new();
        assert_eq!(context.mode(), PipelineMode::Idle);
        context.set_mode(PipelineMode::Running);
        assert_eq!(context.mode(), PipelineMode::Running);
        context.set_phase(WindowPhase::Voted);
        assert_eq!(context.phase(), WindowPhase::Voted);
    }

    #[test]
    fn test_first_fault_wins() {
        let context = PipelineContext::new();
        context.record_fault("model rejected");
        context.record_fault("source unplugged");
        assert_eq!(context.fault().as_deref(), Some("model rejected"));
    }

    #[test]
    fn test_gesture_gauge() {
        let context = PipelineContext::new();
        context.set_gesture(7, 85);
        assert_eq!(context.current_gesture(), (7, 85));
    }
}
