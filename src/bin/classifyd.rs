//! classifyd - camera classification daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera (or a `stub://` synthetic one)
//! 2. Offers each frame to a single-flight pipeline, dropping frames while busy
//! 3. Runs the configured classifier on admitted frames
//! 4. Logs the top label of every completed cycle and periodic stats

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camera_classifier::classify::{load_labels, ColorClassifier, StubClassifier};
use camera_classifier::config::ClassifierdConfig;
use camera_classifier::{
    CameraConfig, CameraSource, ClassificationResult, ClassifierRegistry, FramePipeline,
    FrameSource, PipelineConfig, PipelineError, ResultSink, Size,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "CLASSIFIER_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames have been offered to the pipeline (0 runs forever).
    #[arg(long, default_value_t = 0)]
    frames: u64,
}

/// Logs every result and every aborted cycle.
struct LogSink;

impl ResultSink for LogSink {
    fn publish(&mut self, result: &ClassificationResult) {
        log::info!("frame {}: {}", result.sequence, result);
    }

    fn cycle_failed(&mut self, error: &PipelineError) {
        log::debug!("no result: {}", error);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ClassifierdConfig::load_from(args.config.as_deref())?;

    let registry = build_registry(&cfg)?;
    log::info!("classifier backends: {}", registry.list().join(", "));
    let classifier = registry.initialize_default()?;

    let mut source = CameraSource::new(CameraConfig {
        url: cfg.source.url.clone(),
        target_fps: cfg.source.target_fps,
        width: cfg.source.width,
        height: cfg.source.height,
        sensor_orientation: cfg.source.sensor_orientation,
    })?;
    source.connect()?;

    let mut pipeline = FramePipeline::new(
        classifier.clone(),
        PipelineConfig {
            display_rotation: cfg.display_rotation,
            normalization: cfg.normalization,
        },
        LogSink,
    );
    pipeline.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    log::info!(
        "classifyd running. source={} backend={} display_rotation={}",
        cfg.source.url,
        cfg.classifier.backend,
        cfg.display_rotation
    );

    let frame_interval = cfg.frame_interval();
    let mut last_stats_log = Instant::now();
    let mut offered = 0u64;

    while running.load(Ordering::SeqCst) {
        if args.frames > 0 && offered >= args.frames {
            break;
        }
        offered += 1;
        if let Err(err) = pipeline.acquire_and_submit(&mut source) {
            log::warn!("frame acquisition failed: {}", err);
        }

        if last_stats_log.elapsed() >= cfg.stats_interval {
            let stats = pipeline.stats();
            let source_stats = source.stats();
            log::info!(
                "camera health={} frames={} url={} | pipeline admitted={} dropped={} completed={} failed={}",
                source.is_healthy(),
                source_stats.frames_captured,
                source_stats.location,
                stats.admitted,
                stats.dropped,
                stats.completed,
                stats.failed
            );
            last_stats_log = Instant::now();
        }

        std::thread::sleep(frame_interval);
    }

    log::info!("shutting down");
    pipeline.wait_idle(Duration::from_secs(5));
    pipeline.stop()?;
    classifier
        .lock()
        .map_err(|_| anyhow!("classifier lock poisoned"))?
        .close();

    let stats = pipeline.stats();
    log::info!(
        "classifyd stopped. submitted={} admitted={} dropped={} completed={} failed={}",
        stats.submitted,
        stats.admitted,
        stats.dropped,
        stats.completed,
        stats.failed
    );
    Ok(())
}

fn build_registry(cfg: &ClassifierdConfig) -> Result<ClassifierRegistry> {
    let input = Size::new(cfg.classifier.input_width, cfg.classifier.input_height);
    let mut registry = ClassifierRegistry::new();

    let stub = match &cfg.classifier.labels_path {
        Some(path) => StubClassifier::new(load_labels(path)?, input),
        None => StubClassifier::new(StubClassifier::default_labels(), input),
    };
    registry.register(stub);
    registry.register(ColorClassifier::new(input));

    #[cfg(feature = "backend-tract")]
    if let (Some(model), Some(labels)) = (&cfg.classifier.model_path, &cfg.classifier.labels_path)
    {
        registry.register(camera_classifier::classify::TractClassifier::new(
            model,
            labels,
            input,
            cfg.classifier.layout,
        ));
    }

    registry.set_default(&cfg.classifier.backend)?;
    Ok(registry)
}
