use crate::analysis::report::{AnalysisResult, Metrics};
use crate::audio::recorder::AudioCapture;
use crate::error::{Result, VoxcheckError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for voice authenticity evaluation.
///
/// This trait allows swapping implementations (simulated vs mock).
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate a finished capture and produce metrics plus a verdict.
    ///
    /// # Arguments
    /// * `capture` - Immutable capture produced by the recorder
    ///
    /// # Errors
    /// Returns `VoxcheckError::EmptyCapture` for captures with no bytes,
    /// before any analysis work is performed. Returns
    /// `VoxcheckError::Evaluation` when the analysis itself fails.
    async fn evaluate(&self, capture: &AudioCapture) -> Result<AnalysisResult>;
}

/// Implement Evaluator for Arc<T> to allow sharing across sessions.
#[async_trait::async_trait]
impl<T: Evaluator + ?Sized> Evaluator for Arc<T> {
    async fn evaluate(&self, capture: &AudioCapture) -> Result<AnalysisResult> {
        (**self).evaluate(capture).await
    }
}

/// Mock evaluator for testing.
///
/// Returns a configured result immediately. An optional gate lets tests hold
/// the evaluation mid-flight to observe intermediate pipeline states.
#[derive(Clone)]
pub struct MockEvaluator {
    result: AnalysisResult,
    should_fail: bool,
    gate: Option<Arc<tokio::sync::Notify>>,
    call_count: Arc<AtomicUsize>,
}

impl MockEvaluator {
    /// Create a mock that reports an authentic voice.
    pub fn new() -> Self {
        Self {
            result: AnalysisResult::new(Metrics::new(90, 90, 90)),
            should_fail: false,
            gate: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific result.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.result = AnalysisResult::new(metrics);
        self
    }

    /// Configure the mock to fail on evaluate.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Block each evaluation until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<tokio::sync::Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of evaluate calls made so far.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Shared handle to the call counter, usable after the mock is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(&self, capture: &AudioCapture) -> Result<AnalysisResult> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        // Mirrors the empty-capture contract of the real evaluator
        if capture.is_empty() {
            return Err(VoxcheckError::EmptyCapture);
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.should_fail {
            Err(VoxcheckError::Evaluation {
                message: "mock evaluation failure".to_string(),
            })
        } else {
            Ok(self.result)
        }
    }
}
