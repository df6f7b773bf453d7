//! Capture statistics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use wcap_capture::CropDecision;
use wcap_types::CaptureStats;

/// Collects counters for the current capture source.
pub struct MetricsCollector {
    start_time: RwLock<Option<Instant>>,
    frames: AtomicU64,
    empty_pulls: AtomicU64,
    producer_crops: AtomicU64,
    detected_crops: AtomicU64,
    full_frames: AtomicU64,
    fallback_crops: AtomicU64,
    last_frame_micros: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            frames: AtomicU64::new(0),
            empty_pulls: AtomicU64::new(0),
            producer_crops: AtomicU64::new(0),
            detected_crops: AtomicU64::new(0),
            full_frames: AtomicU64::new(0),
            fallback_crops: AtomicU64::new(0),
            last_frame_micros: AtomicU64::new(0),
        }
    }

    /// Reset every counter and start the uptime clock.
    pub fn start(&self) {
        for counter in [
            &self.frames,
            &self.empty_pulls,
            &self.producer_crops,
            &self.detected_crops,
            &self.full_frames,
            &self.fallback_crops,
            &self.last_frame_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.start_time.write() = Some(Instant::now());
    }

    /// Stop the uptime clock. Counters are kept.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    /// Record a delivered frame.
    pub fn record_frame(&self, decision: CropDecision, elapsed: Duration) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        let counter = match decision {
            CropDecision::ProducerMetadata => &self.producer_crops,
            CropDecision::Detected => &self.detected_crops,
            CropDecision::FullFrame => &self.full_frames,
            CropDecision::Fallback => &self.fallback_crops,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_frame_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a pull that produced no frame.
    pub fn record_empty_pull(&self) {
        self.empty_pulls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics.
    pub fn snapshot(&self, dropped_buffers: u64, scratch_bytes: usize) -> CaptureStats {
        let frames = self.frames.load(Ordering::Relaxed);

        let uptime = self
            .start_time
            .read()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let fps = if uptime.as_secs_f32() > 0.0 {
            frames as f32 / uptime.as_secs_f32()
        } else {
            0.0
        };

        CaptureStats {
            frames,
            empty_pulls: self.empty_pulls.load(Ordering::Relaxed),
            producer_crops: self.producer_crops.load(Ordering::Relaxed),
            detected_crops: self.detected_crops.load(Ordering::Relaxed),
            full_frames: self.full_frames.load(Ordering::Relaxed),
            fallback_crops: self.fallback_crops.load(Ordering::Relaxed),
            dropped_buffers,
            scratch_bytes: scratch_bytes as u64,
            last_frame_micros: self.last_frame_micros.load(Ordering::Relaxed),
            fps,
            uptime_seconds: uptime.as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_are_counted_separately() {
        let metrics = MetricsCollector::new();
        metrics.start();
        metrics.record_frame(CropDecision::Detected, Duration::from_micros(40));
        metrics.record_frame(CropDecision::Detected, Duration::from_micros(50));
        metrics.record_frame(CropDecision::Fallback, Duration::from_micros(60));
        metrics.record_empty_pull();

        let stats = metrics.snapshot(3, 1024);
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.detected_crops, 2);
        assert_eq!(stats.fallback_crops, 1);
        assert_eq!(stats.full_frames, 0);
        assert_eq!(stats.empty_pulls, 1);
        assert_eq!(stats.dropped_buffers, 3);
        assert_eq!(stats.scratch_bytes, 1024);
        assert_eq!(stats.last_frame_micros, 60);
    }

    #[test]
    fn test_start_resets_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_frame(CropDecision::FullFrame, Duration::ZERO);
        metrics.start();
        assert_eq!(metrics.snapshot(0, 0).frames, 0);
    }

    #[test]
    fn test_stopped_collector_reports_no_uptime() {
        let metrics = MetricsCollector::new();
        metrics.start();
        metrics.record_frame(CropDecision::FullFrame, Duration::ZERO);
        metrics.stop();

        let stats = metrics.snapshot(0, 0);
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.uptime_seconds, 0);
        assert_eq!(stats.fps, 0.0);
    }
}
