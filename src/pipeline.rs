//! Frame pipeline.
//!
//! One frame at a time flows from the producer to a single worker thread:
//!
//! ```text
//! Idle -> Admitted -> Preprocessing -> Classifying -> Reducing -> Idle
//! ```
//!
//! Any failure returns straight to `Idle`. Admission is a compare-and-set on
//! the busy flag. A frame offered while a cycle is in flight is dropped (and
//! thereby released back to its source); frames are never queued and the
//! producer never blocks. The flag is cleared by a guard that travels with
//! the frame, so every exit path of a cycle resets it.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::classify::{reduce, ClassificationResult, Classifier, SharedClassifier};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::orientation::effective_rotation;
use crate::preprocess::{prepare_with, Normalization};

/// Receives the outcome of every completed cycle.
pub trait ResultSink: Send {
    fn publish(&mut self, result: &ClassificationResult);

    /// Called when a cycle is aborted. No result follows for that frame.
    fn cycle_failed(&mut self, _error: &PipelineError) {}
}

impl<F> ResultSink for F
where
    F: FnMut(&ClassificationResult) + Send,
{
    fn publish(&mut self, result: &ClassificationResult) {
        self(result)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineConfig {
    /// Display rotation in degrees; subtracted from each frame's sensor orientation.
    pub display_rotation: i32,
    pub normalization: Normalization,
}

/// Snapshot of pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames offered via `submit` or `acquire_and_submit`.
    pub submitted: u64,
    /// Offers that won admission.
    pub admitted: u64,
    /// Offers rejected because a cycle was in flight or the worker was stopped.
    pub dropped: u64,
    /// Cycles that published a result.
    pub completed: u64,
    /// Cycles aborted with a `PipelineError`.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    admitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    busy: AtomicBool,
    display_rotation: AtomicI32,
    normalization: Normalization,
    counters: Counters,
}

/// Clears the busy flag when dropped.
struct BusyGuard {
    shared: Arc<Shared>,
}

impl BusyGuard {
    /// Atomically claim the pipeline. `None` if a cycle is already in flight.
    fn try_acquire(shared: &Arc<Shared>) -> Option<Self> {
        shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                shared: shared.clone(),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared.busy.store(false, Ordering::Release);
    }
}

struct Job {
    frame: Frame,
    guard: BusyGuard,
}

struct Worker {
    sender: SyncSender<Job>,
    handle: JoinHandle<()>,
}

type SharedSink = Arc<Mutex<Box<dyn ResultSink>>>;

/// Single-flight frame-to-label pipeline.
pub struct FramePipeline {
    shared: Arc<Shared>,
    classifier: SharedClassifier,
    sink: SharedSink,
    worker: Option<Worker>,
}

impl FramePipeline {
    /// Build a stopped pipeline. Call `start` before submitting frames.
    pub fn new(
        classifier: SharedClassifier,
        config: PipelineConfig,
        sink: impl ResultSink + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                busy: AtomicBool::new(false),
                display_rotation: AtomicI32::new(config.display_rotation),
                normalization: config.normalization,
                counters: Counters::default(),
            }),
            classifier,
            sink: Arc::new(Mutex::new(Box::new(sink))),
            worker: None,
        }
    }

    /// Spawn the worker thread. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (sender, receiver) = mpsc::sync_channel(1);
        let shared = self.shared.clone();
        let classifier = self.classifier.clone();
        let sink = self.sink.clone();
        let handle = std::thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || worker_loop(receiver, shared, classifier, sink))
            .context("spawn inference worker")?;
        self.worker = Some(Worker { sender, handle });
        log::info!("frame pipeline started");
        Ok(())
    }

    /// Stop accepting frames, let the in-flight cycle finish and join the worker.
    pub fn stop(&mut self) -> Result<()> {
        let Some(Worker { sender, handle }) = self.worker.take() else {
            return Ok(());
        };
        drop(sender);
        handle
            .join()
            .map_err(|_| anyhow!("inference worker panicked"))?;
        log::info!("frame pipeline stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// True while a cycle is in flight.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    pub fn display_rotation(&self) -> i32 {
        self.shared.display_rotation.load(Ordering::Relaxed)
    }

    /// Update the display rotation used by subsequent cycles.
    pub fn set_display_rotation(&self, degrees: i32) {
        self.shared.display_rotation.store(degrees, Ordering::Relaxed);
    }

    /// Offer a frame. Returns `false` (and releases the frame) when a cycle is
    /// already in flight or the pipeline is stopped.
    pub fn submit(&self, frame: Frame) -> bool {
        let counters = &self.shared.counters;
        counters.submitted.fetch_add(1, Ordering::Relaxed);

        if self.worker.is_none() {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("frame {} dropped: pipeline stopped", frame.sequence);
            return false;
        }
        let Some(guard) = BusyGuard::try_acquire(&self.shared) else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("frame {} dropped: pipeline busy", frame.sequence);
            return false;
        };
        self.dispatch(frame, guard)
    }

    /// Claim the pipeline first, then pull a frame from `source`.
    ///
    /// A busy pipeline never asks the source for a frame. If the source fails,
    /// the claim is released and `SourceUnavailable` is returned.
    pub fn acquire_and_submit(&self, source: &mut dyn FrameSource) -> Result<bool, PipelineError> {
        let counters = &self.shared.counters;
        counters.submitted.fetch_add(1, Ordering::Relaxed);

        let guard = match BusyGuard::try_acquire(&self.shared) {
            Some(guard) if self.worker.is_some() => guard,
            _ => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        };
        match source.next_frame() {
            Ok(frame) => Ok(self.dispatch(frame, guard)),
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                let err = PipelineError::SourceUnavailable(format!("{:#}", err));
                log::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Poll until no cycle is in flight. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn dispatch(&self, frame: Frame, guard: BusyGuard) -> bool {
        let counters = &self.shared.counters;
        let Some(worker) = self.worker.as_ref() else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        // Admission guarantees the single slot is free, so this never blocks.
        match worker.sender.try_send(Job { frame, guard }) {
            Ok(()) => {
                counters.admitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("inference worker unavailable: {}", err);
                false
            }
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("failed to stop frame pipeline: {}", err);
        }
    }
}

fn worker_loop(
    receiver: Receiver<Job>,
    shared: Arc<Shared>,
    classifier: SharedClassifier,
    sink: SharedSink,
) {
    while let Ok(Job { frame, guard }) = receiver.recv() {
        let sequence = frame.sequence;
        let age_ms = frame.age_ms();
        let outcome = run_cycle(
            &classifier,
            frame,
            shared.display_rotation.load(Ordering::Relaxed),
            shared.normalization,
        );

        match sink.lock() {
            Ok(mut sink) => match &outcome {
                Ok(result) => sink.publish(result),
                Err(err) => sink.cycle_failed(err),
            },
            Err(_) => log::error!("result sink lock poisoned"),
        }
        match outcome {
            Ok(_) => {
                shared.counters.completed.fetch_add(1, Ordering::Relaxed);
                log::debug!("frame {} classified ({} ms queued)", sequence, age_ms);
            }
            Err(err) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("cycle for frame {} aborted: {}", sequence, err);
            }
        }
        drop(guard);
    }
}

/// Run one cycle synchronously: readiness check, preprocessing, classification
/// and argmax. The frame is released as soon as preprocessing is done.
pub fn run_cycle(
    classifier: &Mutex<dyn Classifier>,
    frame: Frame,
    display_rotation: i32,
    normalization: Normalization,
) -> Result<ClassificationResult, PipelineError> {
    let input = {
        let guard = lock_classifier(classifier)?;
        if !guard.is_ready() {
            return Err(PipelineError::NotReady);
        }
        guard.input_size().ok_or(PipelineError::NotReady)?
    };

    let sequence = frame.sequence;
    let rotation = effective_rotation(frame.sensor_orientation, display_rotation);
    let prepared = prepare_with(&frame, input.width, input.height, rotation, normalization)?;
    drop(frame);

    let scores = lock_classifier(classifier)?
        .classify(&prepared)
        .map_err(|err| PipelineError::Classifier(format!("{:#}", err)))?;
    let (label, confidence) = reduce(&scores)?;

    Ok(ClassificationResult {
        label,
        confidence,
        sequence,
    })
}

fn lock_classifier(
    classifier: &Mutex<dyn Classifier>,
) -> Result<std::sync::MutexGuard<'_, dyn Classifier + 'static>, PipelineError> {
    classifier
        .lock()
        .map_err(|_| PipelineError::Classifier("classifier lock poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{shared, ColorClassifier, LabelScores, StubClassifier};
    use crate::frame::PixelFormat;
    use crate::orientation::Size;
    use crate::preprocess::PreparedImage;

    fn red_frame() -> Frame {
        Frame::new([255u8, 0, 0].repeat(16), 4, 4, PixelFormat::Rgb24).with_sequence(9)
    }

    struct EmptyClassifier;

    impl Classifier for EmptyClassifier {
        fn name(&self) -> &'static str {
            "empty"
        }
        fn initialize(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn input_size(&self) -> Option<Size> {
            Some(Size::new(2, 2))
        }
        fn classify(&mut self, _image: &PreparedImage) -> anyhow::Result<LabelScores> {
            Ok(LabelScores::new())
        }
        fn close(&mut self) {}
    }

    #[test]
    fn cycle_produces_top_label() -> anyhow::Result<()> {
        let classifier = shared(ColorClassifier::new(Size::new(2, 2)));
        classifier.lock().unwrap().initialize()?;

        let result = run_cycle(&classifier, red_frame(), 0, Normalization::UNIT)?;
        assert_eq!(result.label, "red");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.sequence, 9);
        Ok(())
    }

    #[test]
    fn uninitialized_classifier_is_not_ready() {
        let classifier = shared(StubClassifier::default());
        let result = run_cycle(&classifier, red_frame(), 0, Normalization::UNIT);
        assert_eq!(result, Err(PipelineError::NotReady));
    }

    #[test]
    fn empty_scores_abort_cycle() {
        let classifier = shared(EmptyClassifier);
        let result = run_cycle(&classifier, red_frame(), 0, Normalization::UNIT);
        assert_eq!(result, Err(PipelineError::EmptyDistribution));
    }

    #[test]
    fn bad_frame_is_invalid_dimensions() -> anyhow::Result<()> {
        let classifier = shared(StubClassifier::default());
        classifier.lock().unwrap().initialize()?;

        let truncated = Frame::new(vec![0u8; 5], 4, 4, PixelFormat::Rgb24);
        let result = run_cycle(&classifier, truncated, 0, Normalization::UNIT);
        assert!(matches!(result, Err(PipelineError::InvalidDimensions { .. })));
        Ok(())
    }

    #[test]
    fn submit_while_stopped_is_rejected() {
        let pipeline = FramePipeline::new(
            shared(StubClassifier::default()),
            PipelineConfig::default(),
            |_: &ClassificationResult| {},
        );
        assert!(!pipeline.submit(red_frame()));
        assert!(!pipeline.is_busy());
        let stats = pipeline.stats();
        assert_eq!((stats.submitted, stats.dropped, stats.admitted), (1, 1, 0));
    }

    #[test]
    fn display_rotation_is_adjustable() {
        let pipeline = FramePipeline::new(
            shared(StubClassifier::default()),
            PipelineConfig {
                display_rotation: 90,
                ..PipelineConfig::default()
            },
            |_: &ClassificationResult| {},
        );
        assert_eq!(pipeline.display_rotation(), 90);
        pipeline.set_display_rotation(270);
        assert_eq!(pipeline.display_rotation(), 270);
    }
}
