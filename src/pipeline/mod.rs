// src/pipeline/mod.rs
//! Threaded gesture pipeline.
//!
//! Five threads cooperate over bounded channels: a source pump fills the
//! block exchange, and the acquire, condition, infer and decide stages hand
//! work down drop-oldest queues so a stall anywhere degrades freshness
//! instead of latency. A controller thread owns the [`Pipeline`] handle and
//! drives pause, resume and shutdown through per-stage control channels;
//! every stage acknowledges before the call returns.

pub mod context;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;
use tracing::{debug, error, info, warn};

use crate::acquisition::{
    BlockConsumer, BlockExchange, BlockProducer, SampleBlock, SignalSource,
};
use crate::config::constants::capacity::{BLOCK_CAPACITY, CHANNELS};
use crate::config::{ConfigError, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::gestures;
use crate::inference::{Classifier, Prediction, VotingBuffer};
use crate::processing::{FeatureExtractor, FeatureVector, SignalConditioner, SlidingWindow};
use crate::utils::SystemTimeProvider;

pub use context::{PipelineContext, PipelineMode, StatsSnapshot, WindowPhase};

const STAGE_SOURCE: &str = "source";
const STAGE_ACQUIRE: &str = "acquire";
const STAGE_CONDITION: &str = "condition";
const STAGE_INFER: &str = "infer";
const STAGE_DECIDE: &str = "decide";

// Frames the pump reads per source call.
const PUMP_CHUNK_FRAMES: usize = 32;
// Idle sleep when the source has nothing, and after a source fault.
const PUMP_IDLE: Duration = Duration::from_millis(1);
// How long control calls wait for every stage to acknowledge.
const ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// A smoothed gesture that cleared the actuation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureDecision {
    /// Gesture class index.
    pub class: u8,
    /// Smoothed confidence in percent.
    pub confidence: u8,
    /// Timestamp of the block that completed the deciding window.
    pub timestamp: u64,
}

impl fmt::Display for GestureDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match gestures::label(self.class) {
            Some(letter) => write!(f, "{letter} ({}%)", self.confidence),
            None => write!(f, "class {} ({}%)", self.class, self.confidence),
        }
    }
}

/// Receives decisions that cleared the actuation gate.
pub trait DecisionSink: Send {
    /// Called from the decide stage for every actuating decision.
    fn deliver(&mut self, decision: GestureDecision);
}

enum Control {
    Pause,
    Resume,
    Shutdown,
}

struct Vote {
    smoothed: Prediction,
    timestamp: u64,
}

/// Bounded sender that evicts the oldest queued item instead of blocking.
struct FreshSender<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> FreshSender<T> {
    fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(capacity);
        (
            Self {
                tx,
                rx: rx.clone(),
            },
            rx,
        )
    }

    /// Queues an item, evicting queued items when full. Returns how many
    /// were evicted. A disconnected receiver swallows the item.
    fn send_fresh(&self, item: T) -> u64 {
        let mut evicted = 0;
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(channel::TrySendError::Full(back)) => {
                    item = back;
                    if self.rx.try_recv().is_ok() {
                        evicted += 1;
                    }
                }
                Err(channel::TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }
}

fn drain_count<T>(rx: &Receiver<T>) -> u64 {
    let mut drained = 0;
    while rx.try_recv().is_ok() {
        drained += 1;
    }
    drained
}

// Parks a paused stage until Resume. Returns false on Shutdown.
fn wait_for_resume(
    control: &Receiver<Control>,
    acks: &Sender<&'static str>,
    stage: &'static str,
) -> bool {
    loop {
        match control.recv() {
            Ok(Control::Resume) => {
                let _ = acks.send(stage);
                return true;
            }
            Ok(Control::Pause) => {
                let _ = acks.send(stage);
            }
            Ok(Control::Shutdown) | Err(_) => return false,
        }
    }
}

/// Running pipeline handle.
///
/// Dropping the handle shuts the stages down; [`Pipeline::shutdown`] does
/// the same but reports stage panics.
pub struct Pipeline {
    context: Arc<PipelineContext>,
    controls: Vec<(&'static str, Sender<Control>)>,
    acks: Receiver<&'static str>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Pipeline {
    /// Validates the configuration and spawns the stage threads.
    ///
    /// A degraded classifier does not fail the start; its fault is recorded
    /// and the pipeline runs without predictions. A classifier whose model
    /// disagrees with the configured feature layout does fail the start.
    pub fn start(
        config: PipelineConfig,
        source: Box<dyn SignalSource>,
        classifier: Classifier,
        sink: Box<dyn DecisionSink>,
    ) -> PipelineResult<Pipeline> {
        config.validate()?;
        if let Some(model) = classifier.model() {
            let assembled = config.feature_count();
            if model.n_features() as usize != assembled {
                return Err(ConfigError::FeatureCountMismatch {
                    model: model.n_features() as usize,
                    assembled,
                }
                .into());
            }
        }

        let context = Arc::new(PipelineContext::new());
        if let Some(fault) = classifier.fault() {
            warn!("starting degraded, no predictions will be made: {fault}");
            context.record_fault(fault.to_string());
        }
        info!("pipeline starting: {:?}", config.summary());

        let (producer, consumer) =
            BlockExchange::new(config.acquisition.block_size, Arc::new(SystemTimeProvider));
        let (block_tx, block_rx) = FreshSender::bounded(config.queues.block_queue_depth);
        let (feature_tx, feature_rx) = FreshSender::bounded(config.queues.feature_queue_depth);
        let (vote_tx, vote_rx) = FreshSender::bounded(config.queues.vote_queue_depth);

        let (ack_tx, ack_rx) = channel::unbounded();
        let (source_ctrl_tx, source_ctrl_rx) = channel::unbounded();
        let (acquire_ctrl_tx, acquire_ctrl_rx) = channel::unbounded();
        let (condition_ctrl_tx, condition_ctrl_rx) = channel::unbounded();
        let (infer_ctrl_tx, infer_ctrl_rx) = channel::unbounded();
        let (decide_ctrl_tx, decide_ctrl_rx) = channel::unbounded();
        let controls = vec![
            (STAGE_SOURCE, source_ctrl_tx),
            (STAGE_ACQUIRE, acquire_ctrl_tx),
            (STAGE_CONDITION, condition_ctrl_tx),
            (STAGE_INFER, infer_ctrl_tx),
            (STAGE_DECIDE, decide_ctrl_tx),
        ];

        let conditioner = SignalConditioner::new(&config);
        let window = SlidingWindow::new(config.features.window_size);
        let extractor = FeatureExtractor::new(&config);
        let read_timeout = Duration::from_millis(config.acquisition.read_timeout_ms);
        let decide_wake = Duration::from_millis(config.queues.decide_timeout_ms);
        let threshold = config.voting.confidence_threshold;

        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::with_capacity(5);
        let spawned = {
            let ctx = &context;
            let acks = &ack_tx;
            let spawn_all = || -> PipelineResult<()> {
                handles.push((
                    STAGE_SOURCE,
                    spawn_stage(STAGE_SOURCE, {
                        let (ctx, acks) = (Arc::clone(ctx), acks.clone());
                        move || source_loop(source, producer, ctx, source_ctrl_rx, acks)
                    })?,
                ));
                handles.push((
                    STAGE_ACQUIRE,
                    spawn_stage(STAGE_ACQUIRE, {
                        let (ctx, acks) = (Arc::clone(ctx), acks.clone());
                        move || {
                            acquire_loop(consumer, block_tx, read_timeout, ctx, acquire_ctrl_rx, acks)
                        }
                    })?,
                ));
                handles.push((
                    STAGE_CONDITION,
                    spawn_stage(STAGE_CONDITION, {
                        let (ctx, acks) = (Arc::clone(ctx), acks.clone());
                        move || {
                            condition_loop(
                                conditioner,
                                window,
                                extractor,
                                block_rx,
                                feature_tx,
                                ctx,
                                condition_ctrl_rx,
                                acks,
                            )
                        }
                    })?,
                ));
                handles.push((
                    STAGE_INFER,
                    spawn_stage(STAGE_INFER, {
                        let (ctx, acks) = (Arc::clone(ctx), acks.clone());
                        move || infer_loop(classifier, feature_rx, vote_tx, ctx, infer_ctrl_rx, acks)
                    })?,
                ));
                handles.push((
                    STAGE_DECIDE,
                    spawn_stage(STAGE_DECIDE, {
                        let (ctx, acks) = (Arc::clone(ctx), acks.clone());
                        move || {
                            decide_loop(sink, vote_rx, threshold, decide_wake, ctx, decide_ctrl_rx, acks)
                        }
                    })?,
                ));
                Ok(())
            };
            spawn_all()
        };
        if let Err(err) = spawned {
            for (_, tx) in &controls {
                let _ = tx.send(Control::Shutdown);
            }
            for (_, handle) in handles {
                let _ = handle.join();
            }
            return Err(err);
        }

        context.set_mode(PipelineMode::Running);
        Ok(Pipeline {
            context,
            controls,
            acks: ack_rx,
            handles,
        })
    }

    /// Shared observability handle.
    pub fn context(&self) -> Arc<PipelineContext> {
        Arc::clone(&self.context)
    }

    /// Convenience copy of the current state.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.context.snapshot()
    }

    /// Drains in-flight data and parks every stage.
    ///
    /// Returns once every stage has acknowledged. Pausing a paused
    /// pipeline is a no-op.
    pub fn pause(&self) -> PipelineResult<()> {
        if self.context.mode() == PipelineMode::Paused {
            return Ok(());
        }
        for (_, tx) in &self.controls {
            let _ = tx.send(Control::Pause);
        }
        self.await_acks("pause")?;
        self.context.set_mode(PipelineMode::Paused);
        self.context.set_phase(WindowPhase::Accumulating);
        info!("pipeline paused");
        Ok(())
    }

    /// Wakes every parked stage. Resuming a running pipeline is a no-op.
    pub fn resume(&self) -> PipelineResult<()> {
        if self.context.mode() != PipelineMode::Paused {
            return Ok(());
        }
        for (_, tx) in &self.controls {
            let _ = tx.send(Control::Resume);
        }
        self.await_acks("resume")?;
        self.context.set_mode(PipelineMode::Running);
        info!("pipeline resumed");
        Ok(())
    }

    /// Stops every stage and joins the threads.
    pub fn shutdown(mut self) -> PipelineResult<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> PipelineResult<()> {
        if self.handles.is_empty() {
            return Ok(());
        }
        for (_, tx) in &self.controls {
            let _ = tx.send(Control::Shutdown);
        }
        let mut result = Ok(());
        for (stage, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("{stage} stage thread panicked");
                result = Err(PipelineError::StagePanicked { stage });
            }
        }
        self.context.set_mode(PipelineMode::Idle);
        info!("pipeline stopped");
        result
    }

    fn await_acks(&self, op: &'static str) -> PipelineResult<()> {
        let deadline = Instant::now() + ACK_TIMEOUT;
        let mut pending: HashSet<&'static str> =
            self.controls.iter().map(|(stage, _)| *stage).collect();
        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PipelineError::ControlTimeout(op));
            }
            match self.acks.recv_timeout(remaining) {
                Ok(stage) => {
                    pending.remove(stage);
                }
                Err(_) => return Err(PipelineError::ControlTimeout(op)),
            }
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown_inner() {
            error!("shutdown on drop failed: {err}");
        }
    }
}

fn spawn_stage<F>(stage: &'static str, body: F) -> PipelineResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("gesture-{stage}"))
        .spawn(body)
        .map_err(|source| PipelineError::Spawn { stage, source })
}

/// Reads the signal source into the block exchange.
///
/// Stands in for the DMA engine of a hardware front end. A source failure
/// records a fault and the pump idles, still honouring control messages.
fn source_loop(
    mut source: Box<dyn SignalSource>,
    mut producer: BlockProducer,
    ctx: Arc<PipelineContext>,
    control: Receiver<Control>,
    acks: Sender<&'static str>,
) {
    let mut chunk = [[0i32; CHANNELS]; PUMP_CHUNK_FRAMES];
    let mut faulted = false;
    loop {
        match control.try_recv() {
            Ok(Control::Pause) => {
                let discarded = producer.reset() as u64;
                ctx.stats().add_samples_dropped(discarded);
                let _ = acks.send(STAGE_SOURCE);
                if !wait_for_resume(&control, &acks, STAGE_SOURCE) {
                    return;
                }
            }
            Ok(Control::Resume) => {}
            Ok(Control::Shutdown) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {}
        }

        if faulted {
            thread::sleep(PUMP_IDLE);
            continue;
        }
        match source.read_frames(&mut chunk) {
            Ok(0) => thread::sleep(PUMP_IDLE),
            Ok(n) => {
                ctx.stats().add_samples_acquired(n as u64);
                for frame in &chunk[..n] {
                    if let Some(stale) = producer.push_frame(*frame) {
                        // Conditioning fell behind a whole block.
                        ctx.stats().add_samples_dropped(stale.len() as u64);
                        debug!("displaced a stale block of {} frames", stale.len());
                    }
                }
            }
            Err(err) => {
                error!("signal source failed: {err}");
                ctx.record_fault(err.to_string());
                faulted = true;
            }
        }
    }
}

/// Moves published blocks from the exchange into the block queue.
fn acquire_loop(
    mut consumer: BlockConsumer,
    blocks: FreshSender<SampleBlock>,
    read_timeout: Duration,
    ctx: Arc<PipelineContext>,
    control: Receiver<Control>,
    acks: Sender<&'static str>,
) {
    loop {
        match control.try_recv() {
            Ok(Control::Pause) => {
                let mut discarded = 0;
                while let Some(block) = consumer.try_read() {
                    discarded += block.len() as u64;
                }
                ctx.stats().add_samples_dropped(discarded);
                let _ = acks.send(STAGE_ACQUIRE);
                if !wait_for_resume(&control, &acks, STAGE_ACQUIRE) {
                    return;
                }
                while let Some(block) = consumer.try_read() {
                    ctx.stats().add_samples_dropped(block.len() as u64);
                }
            }
            Ok(Control::Resume) => {}
            Ok(Control::Shutdown) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {}
        }

        if let Some(block) = consumer.read_buffer(read_timeout) {
            let evicted = blocks.send_fresh(block);
            ctx.stats().incr_blocks_published();
            ctx.stats().add_blocks_dropped(evicted);
        }
    }
}

/// Filters blocks, slides the window and assembles feature vectors.
#[allow(clippy::too_many_arguments)]
fn condition_loop(
    mut conditioner: SignalConditioner,
    mut window: SlidingWindow,
    mut extractor: FeatureExtractor,
    blocks: Receiver<SampleBlock>,
    features: FreshSender<FeatureVector>,
    ctx: Arc<PipelineContext>,
    control: Receiver<Control>,
    acks: Sender<&'static str>,
) {
    let mut conditioned = [[0.0f32; CHANNELS]; BLOCK_CAPACITY];
    loop {
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Pause) => {
                    ctx.stats().add_blocks_dropped(drain_count(&blocks));
                    conditioner.reset();
                    window.reset();
                    extractor.reset();
                    let _ = acks.send(STAGE_CONDITION);
                    if !wait_for_resume(&control, &acks, STAGE_CONDITION) {
                        return;
                    }
                    ctx.stats().add_blocks_dropped(drain_count(&blocks));
                }
                Ok(Control::Resume) => {}
                Ok(Control::Shutdown) | Err(_) => return,
            },
            recv(blocks) -> block => {
                let Ok(block) = block else { return };
                let start = Instant::now();
                let frames = conditioner.process_block(&block, &mut conditioned);
                let mut extracted = false;
                for frame in &conditioned[..frames] {
                    if window.push(*frame) {
                        ctx.set_phase(WindowPhase::WindowReady);
                        let vector = extractor.extract(&window, block.timestamp);
                        window.advance();
                        ctx.set_phase(WindowPhase::Extracted);
                        ctx.stats().incr_windows_extracted();
                        let evicted = features.send_fresh(vector);
                        ctx.stats().add_features_dropped(evicted);
                        extracted = true;
                    }
                }
                if !extracted {
                    ctx.set_phase(WindowPhase::Accumulating);
                }
                ctx.stats().record_condition_micros(start.elapsed().as_micros() as u64);
            }
        }
    }
}

/// Classifies feature vectors and smooths them through the vote ring.
fn infer_loop(
    classifier: Classifier,
    features: Receiver<FeatureVector>,
    votes: FreshSender<Vote>,
    ctx: Arc<PipelineContext>,
    control: Receiver<Control>,
    acks: Sender<&'static str>,
) {
    let mut ring = VotingBuffer::new();
    loop {
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Pause) => {
                    ctx.stats().add_features_dropped(drain_count(&features));
                    ring.reset();
                    let _ = acks.send(STAGE_INFER);
                    if !wait_for_resume(&control, &acks, STAGE_INFER) {
                        return;
                    }
                    ctx.stats().add_features_dropped(drain_count(&features));
                }
                Ok(Control::Resume) => {}
                Ok(Control::Shutdown) | Err(_) => return,
            },
            recv(features) -> vector => {
                let Ok(vector) = vector else { return };
                let start = Instant::now();
                if let Some(prediction) = classifier.predict(&vector) {
                    ctx.set_phase(WindowPhase::Classified);
                    ctx.stats().incr_predictions();
                    ring.add_prediction(prediction);
                    if let Some(smoothed) = ring.majority() {
                        ctx.set_phase(WindowPhase::Voted);
                        let evicted = votes.send_fresh(Vote {
                            smoothed,
                            timestamp: vector.timestamp,
                        });
                        ctx.stats().add_votes_dropped(evicted);
                    }
                }
                ctx.stats().record_infer_micros(start.elapsed().as_micros() as u64);
            }
        }
    }
}

/// Applies the actuation gate and delivers decisions to the sink.
fn decide_loop(
    mut sink: Box<dyn DecisionSink>,
    votes: Receiver<Vote>,
    threshold: u8,
    wake: Duration,
    ctx: Arc<PipelineContext>,
    control: Receiver<Control>,
    acks: Sender<&'static str>,
) {
    loop {
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Pause) => {
                    ctx.stats().add_votes_dropped(drain_count(&votes));
                    let _ = acks.send(STAGE_DECIDE);
                    if !wait_for_resume(&control, &acks, STAGE_DECIDE) {
                        return;
                    }
                    ctx.stats().add_votes_dropped(drain_count(&votes));
                }
                Ok(Control::Resume) => {}
                Ok(Control::Shutdown) | Err(_) => return,
            },
            recv(votes) -> vote => {
                let Ok(vote) = vote else { return };
                if vote.smoothed.confidence > threshold {
                    let decision = GestureDecision {
                        class: vote.smoothed.class,
                        confidence: vote.smoothed.confidence,
                        timestamp: vote.timestamp,
                    };
                    ctx.set_gesture(decision.class, decision.confidence);
                    ctx.set_phase(WindowPhase::Emitted);
                    ctx.stats().incr_decisions_emitted();
                    debug!("gesture {decision}");
                    sink.deliver(decision);
                } else {
                    ctx.set_phase(WindowPhase::Held);
                    ctx.stats().incr_decisions_held();
                }
            },
            default(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_sender_evicts_oldest() {
        let (tx, rx) = FreshSender::bounded(2);
        assert_eq!(tx.send_fresh(1), 0);
        assert_eq!(tx.send_fresh(2), 0);
        assert_eq!(tx.send_fresh(3), 1);
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fresh_sender_depth_one_keeps_newest() {
        let (tx, rx) = FreshSender::bounded(1);
        tx.send_fresh("a");
        assert_eq!(tx.send_fresh("b"), 1);
        assert_eq!(tx.send_fresh("c"), 1);
        assert_eq!(rx.try_recv(), Ok("c"));
    }

    #[test]
    fn test_fresh_sender_outlives_external_receiver() {
        let (tx, rx) = FreshSender::bounded(1);
        drop(rx);
        // The internal receiver clone keeps the channel connected, so
        // sends keep landing (and churning) instead of erroring.
        assert_eq!(tx.send_fresh(7), 0);
        assert_eq!(tx.send_fresh(8), 1);
    }

    #[test]
    fn test_decision_display_uses_labels() {
        let decision = GestureDecision {
            class: 0,
            confidence: 90,
            timestamp: 0,
        };
        assert_eq!(decision.to_string(), "A (90%)");

        let unknown = GestureDecision {
            class: 77,
            confidence: 10,
            timestamp: 0,
        };
        assert_eq!(unknown.to_string(), "class 77 (10%)");
    }
}
