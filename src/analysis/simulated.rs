//! Simulated authenticity analysis.
//!
//! Real signal analysis is out of scope; this evaluator stands in for it by
//! drawing random metrics and pausing for a configurable window so the rest
//! of the pipeline behaves as it would against a real backend.

use crate::analysis::evaluator::Evaluator;
use crate::analysis::report::{AnalysisResult, Metrics};
use crate::audio::recorder::AudioCapture;
use crate::defaults::{
    MAX_ANALYSIS_DELAY_MS, METRIC_CEILING, METRIC_FLOOR, MIN_ANALYSIS_DELAY_MS,
};
use crate::error::{Result, VoxcheckError};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Source of individual metric values.
///
/// This trait allows swapping the random draw for scripted values in tests.
pub trait MetricSource: Send + Sync {
    /// Produce one metric value in `[floor, ceiling]` (inclusive).
    fn sample(&self, floor: u8, ceiling: u8) -> u8;
}

/// Draws metrics uniformly at random from the allowed window.
pub struct UniformMetricSource;

impl MetricSource for UniformMetricSource {
    fn sample(&self, floor: u8, ceiling: u8) -> u8 {
        let mut rng = rand::thread_rng();
        rng.gen_range(floor..=ceiling)
    }
}

/// Returns scripted values in order; repeats the last one when exhausted.
pub struct FixedMetricSource {
    values: Vec<u8>,
    index: AtomicUsize,
}

impl FixedMetricSource {
    pub fn new(values: &[u8]) -> Self {
        Self {
            values: values.to_vec(),
            index: AtomicUsize::new(0),
        }
    }
}

impl MetricSource for FixedMetricSource {
    fn sample(&self, floor: u8, _ceiling: u8) -> u8 {
        if self.values.is_empty() {
            return floor;
        }
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.values[i.min(self.values.len() - 1)]
    }
}

/// Delay mechanism used to simulate analysis latency.
///
/// This trait allows swapping the real sleep for a no-op in tests.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Pacer backed by the tokio timer.
pub struct TokioPacer;

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Pacer that returns immediately, for tests.
pub struct NoopPacer;

#[async_trait::async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self, _duration: Duration) {}
}

/// Evaluator that simulates voice authenticity analysis.
///
/// Rejects empty captures up front, pauses for a random duration inside the
/// configured window, then draws the three metrics from the metric source.
pub struct SimulatedEvaluator {
    metric_source: Box<dyn MetricSource>,
    pacer: Box<dyn Pacer>,
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatedEvaluator {
    /// Create an evaluator with uniform random metrics and real delays.
    pub fn new() -> Self {
        Self {
            metric_source: Box::new(UniformMetricSource),
            pacer: Box::new(TokioPacer),
            min_delay: Duration::from_millis(MIN_ANALYSIS_DELAY_MS),
            max_delay: Duration::from_millis(MAX_ANALYSIS_DELAY_MS),
        }
    }

    /// Override the latency window. Swapped bounds are normalized.
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        if min <= max {
            self.min_delay = min;
            self.max_delay = max;
        } else {
            self.min_delay = max;
            self.max_delay = min;
        }
        self
    }

    /// Override the metric source.
    pub fn with_metric_source(mut self, source: Box<dyn MetricSource>) -> Self {
        self.metric_source = source;
        self
    }

    /// Override the pacer.
    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    fn draw_delay(&self) -> Duration {
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        if min_ms >= max_ms {
            return self.min_delay;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}

impl Default for SimulatedEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Evaluator for SimulatedEvaluator {
    async fn evaluate(&self, capture: &AudioCapture) -> Result<AnalysisResult> {
        // Reject before any delay or sampling
        if capture.is_empty() {
            return Err(VoxcheckError::EmptyCapture);
        }

        let delay = self.draw_delay();
        debug!(
            "analyzing {} bytes ({}), simulated latency {}ms",
            capture.len(),
            capture.media_type(),
            delay.as_millis()
        );
        self.pacer.pause(delay).await;

        // Sampling order: authentication rate, naturalness, stability
        let metrics = Metrics::new(
            self.metric_source.sample(METRIC_FLOOR, METRIC_CEILING),
            self.metric_source.sample(METRIC_FLOOR, METRIC_CEILING),
            self.metric_source.sample(METRIC_FLOOR, METRIC_CEILING),
        );

        let result = AnalysisResult::new(metrics);
        debug!(
            "analysis complete: auth={} natural={} stable={} verdict={}",
            metrics.authentication_rate, metrics.naturalness, metrics.stability, result.verdict
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::report::Verdict;
    use std::sync::Mutex;

    fn capture_with_bytes() -> AudioCapture {
        AudioCapture::new(vec![0u8; 3200], "audio/pcm;rate=16000")
    }

    /// Metric source that counts samples through a shared handle.
    struct CountingMetricSource {
        count: std::sync::Arc<AtomicUsize>,
    }

    impl MetricSource for CountingMetricSource {
        fn sample(&self, floor: u8, _ceiling: u8) -> u8 {
            self.count.fetch_add(1, Ordering::SeqCst);
            floor
        }
    }

    /// Pacer that records requested durations through a shared handle.
    struct RecordingPacer {
        durations: std::sync::Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait::async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, duration: Duration) {
            self.durations.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn test_empty_capture_rejected_before_any_work() {
        let sample_count = std::sync::Arc::new(AtomicUsize::new(0));
        let pauses = std::sync::Arc::new(Mutex::new(Vec::new()));

        let evaluator = SimulatedEvaluator::new()
            .with_metric_source(Box::new(CountingMetricSource {
                count: std::sync::Arc::clone(&sample_count),
            }))
            .with_pacer(Box::new(RecordingPacer {
                durations: std::sync::Arc::clone(&pauses),
            }));

        let empty = AudioCapture::new(Vec::new(), "audio/pcm;rate=16000");
        let result = evaluator.evaluate(&empty).await;

        assert!(matches!(result, Err(VoxcheckError::EmptyCapture)));
        assert_eq!(sample_count.load(Ordering::SeqCst), 0);
        assert!(pauses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_metrics_produce_authentic_verdict() {
        let evaluator = SimulatedEvaluator::new()
            .with_metric_source(Box::new(FixedMetricSource::new(&[80, 76, 75])))
            .with_pacer(Box::new(NoopPacer));

        let result = evaluator.evaluate(&capture_with_bytes()).await.unwrap();

        assert_eq!(result.metrics.authentication_rate, 80);
        assert_eq!(result.metrics.naturalness, 76);
        assert_eq!(result.metrics.stability, 75);
        assert_eq!(result.verdict, Verdict::Authentic);
    }

    #[tokio::test]
    async fn test_scripted_metrics_produce_synthetic_verdict() {
        let evaluator = SimulatedEvaluator::new()
            .with_metric_source(Box::new(FixedMetricSource::new(&[80, 76, 74])))
            .with_pacer(Box::new(NoopPacer));

        let result = evaluator.evaluate(&capture_with_bytes()).await.unwrap();

        assert_eq!(result.verdict, Verdict::Synthetic);
    }

    #[tokio::test]
    async fn test_random_metrics_stay_within_window() {
        let evaluator = SimulatedEvaluator::new().with_pacer(Box::new(NoopPacer));
        let capture = capture_with_bytes();

        for _ in 0..50 {
            let result = evaluator.evaluate(&capture).await.unwrap();
            let m = result.metrics;
            for value in [m.authentication_rate, m.naturalness, m.stability] {
                assert!(
                    (METRIC_FLOOR..=METRIC_CEILING).contains(&value),
                    "metric {} escaped the window",
                    value
                );
            }
        }
    }

    #[test]
    fn test_uniform_source_respects_bounds() {
        let source = UniformMetricSource;
        for _ in 0..200 {
            let value = source.sample(METRIC_FLOOR, METRIC_CEILING);
            assert!((METRIC_FLOOR..=METRIC_CEILING).contains(&value));
        }
    }

    #[test]
    fn test_uniform_source_degenerate_window() {
        let source = UniformMetricSource;
        assert_eq!(source.sample(75, 75), 75);
    }

    #[test]
    fn test_fixed_source_repeats_last_value_when_exhausted() {
        let source = FixedMetricSource::new(&[61, 62]);
        assert_eq!(source.sample(60, 100), 61);
        assert_eq!(source.sample(60, 100), 62);
        assert_eq!(source.sample(60, 100), 62);
        assert_eq!(source.sample(60, 100), 62);
    }

    #[test]
    fn test_fixed_source_empty_falls_back_to_floor() {
        let source = FixedMetricSource::new(&[]);
        assert_eq!(source.sample(60, 100), 60);
    }

    #[tokio::test]
    async fn test_delay_drawn_within_configured_window() {
        let recorded = std::sync::Arc::new(Mutex::new(Vec::new()));
        let evaluator = SimulatedEvaluator::new()
            .with_delay_range(Duration::from_millis(5), Duration::from_millis(10))
            .with_metric_source(Box::new(FixedMetricSource::new(&[90])))
            .with_pacer(Box::new(RecordingPacer {
                durations: std::sync::Arc::clone(&recorded),
            }));

        let capture = capture_with_bytes();
        for _ in 0..20 {
            evaluator.evaluate(&capture).await.unwrap();
        }

        let durations = recorded.lock().unwrap();
        assert_eq!(durations.len(), 20);
        for d in durations.iter() {
            assert!(
                *d >= Duration::from_millis(5) && *d <= Duration::from_millis(10),
                "delay {:?} escaped the window",
                d
            );
        }
    }

    #[tokio::test]
    async fn test_swapped_delay_bounds_are_normalized() {
        let evaluator = SimulatedEvaluator::new()
            .with_delay_range(Duration::from_millis(10), Duration::from_millis(5));

        assert_eq!(evaluator.min_delay, Duration::from_millis(5));
        assert_eq!(evaluator.max_delay, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_degenerate_delay_window_uses_exact_value() {
        let evaluator = SimulatedEvaluator::new()
            .with_delay_range(Duration::from_millis(7), Duration::from_millis(7));

        assert_eq!(evaluator.draw_delay(), Duration::from_millis(7));
    }

    #[tokio::test]
    async fn test_verdict_always_consistent_with_metrics() {
        let evaluator = SimulatedEvaluator::new().with_pacer(Box::new(NoopPacer));
        let capture = capture_with_bytes();

        for _ in 0..50 {
            let result = evaluator.evaluate(&capture).await.unwrap();
            assert_eq!(result.verdict, Verdict::from_metrics(&result.metrics));
        }
    }
}
