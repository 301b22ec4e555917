//! Background tempo analysis
//!
//! One analysis thread serves every load. Each job carries the buffer
//! generation it was started for; a newer submission supersedes it, which
//! both skips queued stale jobs and cancels the running one between stages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use basedrop::Shared;

use super::tempo::{TempoAnalyzer, TempoEstimate};
use crate::config::AnalysisConfig;
use crate::types::SampleBuffer;

/// Called on the analysis thread with `(generation, estimate)`
pub type AnalysisCallback = Box<dyn Fn(u64, TempoEstimate) + Send>;

struct AnalysisJob {
    generation: u64,
    buffer: Shared<SampleBuffer>,
}

/// Handle to the analysis thread
pub struct AnalysisWorker {
    tx: Sender<AnalysisJob>,
    /// Generation of the most recent submission
    latest: Arc<AtomicU64>,
    _handle: JoinHandle<()>,
}

impl AnalysisWorker {
    /// Spawn the analysis thread
    pub fn spawn(config: AnalysisConfig, on_result: AnalysisCallback) -> Self {
        let (tx, rx) = mpsc::channel::<AnalysisJob>();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_for_thread = latest.clone();

        let handle = thread::Builder::new()
            .name("tempo-analysis".to_string())
            .spawn(move || {
                analysis_thread(rx, TempoAnalyzer::new(config), latest_for_thread, on_result);
            })
            .expect("Failed to spawn tempo analysis thread");

        log::info!("AnalysisWorker spawned");

        Self {
            tx,
            latest,
            _handle: handle,
        }
    }

    /// Queue `buffer` for analysis, superseding any earlier job (non-blocking)
    pub fn submit(&self, generation: u64, buffer: Shared<SampleBuffer>) -> Result<(), String> {
        self.latest.store(generation, Ordering::SeqCst);
        self.tx
            .send(AnalysisJob { generation, buffer })
            .map_err(|e| format!("Analysis thread disconnected: {}", e))
    }

    /// Drop results for anything submitted so far (track unloaded)
    pub fn invalidate(&self, generation: u64) {
        self.latest.store(generation, Ordering::SeqCst);
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

fn analysis_thread(
    rx: Receiver<AnalysisJob>,
    analyzer: TempoAnalyzer,
    latest: Arc<AtomicU64>,
    on_result: AnalysisCallback,
) {
    log::info!("Tempo analysis thread started");

    while let Ok(job) = rx.recv() {
        let generation = job.generation;
        if latest.load(Ordering::SeqCst) != generation {
            log::debug!("Skipping stale analysis job (generation {})", generation);
            continue;
        }

        let start = std::time::Instant::now();
        let stale = || latest.load(Ordering::SeqCst) != generation;
        let Some(estimate) = analyzer.analyze_cancellable(&job.buffer, &stale) else {
            log::debug!("Analysis of generation {} cancelled", generation);
            continue;
        };

        if stale() {
            log::debug!("Discarding analysis of superseded generation {}", generation);
            continue;
        }
        log::info!(
            "Tempo analysis of generation {} finished in {:?}: {:.2} BPM, phase {:.1} ms, confidence {:.2}",
            generation,
            start.elapsed(),
            estimate.bpm,
            estimate.beat_phase_ms,
            estimate.confidence
        );
        on_result(generation, estimate);
    }

    log::info!("Tempo analysis thread shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc_handle;
    use crate::types::StereoSample;
    use std::time::Duration;

    const SR: u32 = 48000;

    fn clicks(bpm: f64, secs: f64) -> Shared<SampleBuffer> {
        let len = (secs * SR as f64) as usize;
        let period = (60.0 / bpm * SR as f64) as usize;
        let mut frames = vec![StereoSample::silence(); len];
        for start in (0..len).step_by(period) {
            for (i, frame) in frames[start..(start + 240).min(len)].iter_mut().enumerate() {
                let v = 0.8 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / SR as f32).sin();
                *frame = StereoSample::mono(v * (-(i as f32) / 50.0).exp());
            }
        }
        Shared::new(&gc_handle(), SampleBuffer::from_frames(frames, SR).unwrap())
    }

    fn worker() -> (AnalysisWorker, Receiver<(u64, TempoEstimate)>) {
        let (tx, rx) = mpsc::channel();
        let worker = AnalysisWorker::spawn(
            AnalysisConfig::default(),
            Box::new(move |generation, estimate| {
                let _ = tx.send((generation, estimate));
            }),
        );
        (worker, rx)
    }

    #[test]
    fn test_result_reported_for_current_generation() {
        let (worker, rx) = worker();
        worker.submit(1, clicks(120.0, 20.0)).unwrap();

        let (generation, estimate) = rx.recv_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(generation, 1);
        assert!((estimate.bpm - 120.0).abs() < 1.5, "bpm {}", estimate.bpm);
    }

    #[test]
    fn test_superseded_jobs_are_not_reported() {
        let (worker, rx) = worker();
        worker.submit(1, clicks(100.0, 20.0)).unwrap();
        worker.submit(2, clicks(130.0, 20.0)).unwrap();

        let (generation, estimate) = rx.recv_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(generation, 2);
        assert!((estimate.bpm - 130.0).abs() < 1.5, "bpm {}", estimate.bpm);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_invalidate_discards_pending_result() {
        let (worker, rx) = worker();
        worker.submit(1, clicks(120.0, 20.0)).unwrap();
        worker.invalidate(2);
        assert_eq!(worker.latest_generation(), 2);
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }
}
