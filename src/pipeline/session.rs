//! Async check session: owns the recorder, drives the evaluator, publishes state.

use crate::audio::recorder::Recorder;
use crate::audio::stream::CaptureStream;
use crate::analysis::evaluator::Evaluator;
use crate::defaults::POLL_INTERVAL_MS;
use crate::error::{Result, VoxcheckError};
use crate::pipeline::state::{FailureInfo, PipelineEvent, PipelineState, reduce};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::debug;

struct Inner {
    recorder: Recorder<Box<dyn CaptureStream>>,
    evaluator: Arc<dyn Evaluator>,
    state: PipelineState,
    state_tx: watch::Sender<PipelineState>,
    /// Incremented on every start; in-flight work from older runs is dropped.
    run: u64,
    pump: Option<tokio::task::JoinHandle<()>>,
    poll_interval: Duration,
}

impl Inner {
    fn apply(&mut self, event: PipelineEvent) {
        let next = reduce(self.state.clone(), event);
        if next != self.state {
            debug!("pipeline state: {} -> {}", self.state.name(), next.name());
            self.state = next.clone();
            self.state_tx.send_replace(next);
        }
    }

    fn stop_pump(&mut self) {
        if let Some(handle) = self.pump.take() {
            handle.abort();
        }
    }
}

/// One interactive check session.
///
/// Drives the capture → analyze → present flow over a single recorder and a
/// shared evaluator. All mutation happens behind one async mutex; observers
/// follow the state through a watch channel instead of polling the lock.
///
/// Commands are safe to issue at any time: invalid ones are rejected with an
/// error and leave the state untouched.
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    state_rx: watch::Receiver<PipelineState>,
}

impl Session {
    /// Create a session over a capture stream and an evaluator.
    pub fn new(stream: Box<dyn CaptureStream>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self::with_poll_interval(stream, evaluator, Duration::from_millis(POLL_INTERVAL_MS))
    }

    /// Create a session with a custom recorder poll interval.
    pub fn with_poll_interval(
        stream: Box<dyn CaptureStream>,
        evaluator: Arc<dyn Evaluator>,
        poll_interval: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let inner = Inner {
            recorder: Recorder::new(stream),
            evaluator,
            state: PipelineState::Idle,
            state_tx,
            run: 0,
            pump: None,
            poll_interval,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            state_rx,
        }
    }

    /// Current state as last published.
    pub fn state(&self) -> PipelineState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Bytes buffered by the recorder so far (0 outside a recording).
    pub async fn buffered_bytes(&self) -> usize {
        self.inner.lock().await.recorder.buffered_bytes()
    }

    /// Start a new check: acquire the stream and begin recording.
    ///
    /// # Errors
    /// Returns `NotIdle` for any state other than idle, without touching the
    /// stream. Acquisition errors (`PermissionDenied`, `DeviceUnavailable`)
    /// are returned and also move the pipeline to the failed state.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !inner.state.is_idle() {
            return Err(VoxcheckError::NotIdle);
        }

        inner.run = inner.run.wrapping_add(1);
        if let Err(e) = inner.recorder.start() {
            inner.apply(PipelineEvent::Failed(FailureInfo::from(&e)));
            return Err(e);
        }
        inner.apply(PipelineEvent::RecordingStarted);

        let run = inner.run;
        let interval = inner.poll_interval;
        let weak = Arc::downgrade(&self.inner);
        inner.pump = Some(tokio::spawn(pump_loop(weak, run, interval)));

        Ok(())
    }

    /// Stop recording, finalize the capture, and hand it to the evaluator.
    ///
    /// Returns as soon as the capture is finalized; the analysis runs in the
    /// background and lands in the state when it completes.
    ///
    /// # Errors
    /// Returns `NotRecording` when no recording is in progress, leaving the
    /// state unchanged.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !inner.state.is_recording() {
            return Err(VoxcheckError::NotRecording);
        }

        inner.stop_pump();

        let capture = match inner.recorder.stop() {
            Ok(capture) => capture,
            Err(e) => {
                inner.apply(PipelineEvent::Failed(FailureInfo::from(&e)));
                return Err(e);
            }
        };

        inner.apply(PipelineEvent::CaptureFinalized);

        let run = inner.run;
        let evaluator = Arc::clone(&inner.evaluator);
        tokio::spawn(evaluate_task(
            Arc::clone(&self.inner),
            run,
            evaluator,
            capture,
        ));

        Ok(())
    }

    /// Wait until the pipeline lands in a terminal state.
    ///
    /// Returns the `Result` or `Failed` state once the background analysis
    /// completes. Intended for callers that have already issued `stop` and
    /// only need the outcome.
    pub async fn wait_for_outcome(&self) -> PipelineState {
        let mut rx = self.state_rx.clone();
        let terminal = rx
            .wait_for(|s| matches!(s, PipelineState::Result(_) | PipelineState::Failed(_)))
            .await;
        match terminal {
            Ok(state) => state.clone(),
            // The sender lives in `inner`, kept alive by `self`, so the
            // channel closing is unreachable; fall back to the snapshot.
            Err(_) => self.state(),
        }
    }

    /// Abandon whatever is in progress and return to idle.
    ///
    /// During a recording the stream is released and the buffer dropped.
    /// During analysis the eventual outcome is discarded when it arrives.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;

        inner.stop_pump();
        if inner.recorder.is_active() {
            inner.recorder.discard();
        }
        inner.apply(PipelineEvent::Reset);
    }
}

/// Drain the capture stream into the recorder while the recording lasts.
async fn pump_loop(inner: Weak<Mutex<Inner>>, run: u64, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut guard = inner.lock().await;

        if guard.run != run || !guard.state.is_recording() {
            return;
        }

        if let Err(e) = guard.recorder.poll() {
            guard.recorder.discard();
            guard.apply(PipelineEvent::Failed(FailureInfo::from(&e)));
            return;
        }
    }
}

/// Run the evaluator and apply its outcome, unless the run was superseded.
async fn evaluate_task(
    inner: Arc<Mutex<Inner>>,
    run: u64,
    evaluator: Arc<dyn Evaluator>,
    capture: crate::audio::recorder::AudioCapture,
) {
    let outcome = evaluator.evaluate(&capture).await;

    let mut guard = inner.lock().await;
    if guard.run != run || !guard.state.is_analyzing() {
        debug!("dropping analysis outcome from superseded run {}", run);
        return;
    }

    match outcome {
        Ok(result) => guard.apply(PipelineEvent::AnalysisSucceeded(result)),
        Err(e) => guard.apply(PipelineEvent::Failed(FailureInfo::from(&e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::evaluator::MockEvaluator;
    use crate::analysis::report::{Metrics, Verdict};
    use crate::audio::stream::MockCaptureStream;

    fn fast_session(stream: MockCaptureStream, evaluator: MockEvaluator) -> Session {
        Session::with_poll_interval(
            Box::new(stream),
            Arc::new(evaluator),
            Duration::from_millis(1),
        )
    }

    async fn wait_for(
        rx: &mut watch::Receiver<PipelineState>,
        pred: impl FnMut(&PipelineState) -> bool,
    ) -> PipelineState {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed")
            .clone()
    }

    #[tokio::test]
    async fn test_full_check_reaches_result() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc", b"def"]);
        let acquires = stream.acquire_counter();
        let releases = stream.release_counter();
        let evaluator = MockEvaluator::new().with_metrics(Metrics::new(80, 76, 75));

        let session = fast_session(stream, evaluator);
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        assert!(session.state().is_recording());

        session.stop().await.unwrap();
        let result = wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;

        match result {
            PipelineState::Result(report) => {
                assert_eq!(report.verdict, Verdict::Authentic);
                assert_eq!(report.metrics.authentication_rate, 80);
            }
            other => panic!("Expected result state, got {other:?}"),
        }

        assert_eq!(acquires.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_outcome_returns_terminal_state() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let evaluator = MockEvaluator::new().with_metrics(Metrics::new(90, 85, 80));

        let session = fast_session(stream, evaluator);
        session.start().await.unwrap();
        session.stop().await.unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), session.wait_for_outcome())
            .await
            .expect("timed out waiting for outcome");

        match outcome {
            PipelineState::Result(report) => assert_eq!(report.verdict, Verdict::Authentic),
            other => panic!("Expected result state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyzing_state_visible_while_evaluator_runs() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let evaluator = MockEvaluator::new().with_gate(Arc::clone(&gate));

        let session = fast_session(stream, evaluator);
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();

        wait_for(&mut rx, |s| s.is_analyzing()).await;
        assert!(session.state().is_analyzing());

        gate.notify_one();
        wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;
    }

    #[tokio::test]
    async fn test_second_start_rejected_without_second_acquisition() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let acquires = stream.acquire_counter();

        let session = fast_session(stream, MockEvaluator::new());
        session.start().await.unwrap();

        let second = session.start().await;
        assert!(matches!(second, Err(VoxcheckError::NotIdle)));
        assert!(session.state().is_recording());
        assert_eq!(acquires.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_when_idle_fails_and_state_unchanged() {
        let session = fast_session(MockCaptureStream::new(), MockEvaluator::new());

        let result = session.stop().await;

        assert!(matches!(result, Err(VoxcheckError::NotRecording)));
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_evaluation_failure_lands_in_failed_state() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let evaluator = MockEvaluator::new().with_failure();

        let session = fast_session(stream, evaluator);
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();

        let state = wait_for(&mut rx, |s| matches!(s, PipelineState::Failed(_))).await;
        match state {
            PipelineState::Failed(info) => {
                assert!(info.message.contains("mock evaluation failure"));
            }
            other => panic!("Expected failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_capture_fails_after_stop() {
        let stream = MockCaptureStream::new(); // no chunks scripted
        let session = fast_session(stream, MockEvaluator::new());
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();

        let state = wait_for(&mut rx, |s| matches!(s, PipelineState::Failed(_))).await;
        match state {
            PipelineState::Failed(info) => {
                assert!(info.message.contains("Capture is empty"));
            }
            other => panic!("Expected failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_error_and_failed_state() {
        let stream = MockCaptureStream::new().with_acquire_failure();
        let releases = stream.release_counter();

        let session = fast_session(stream, MockEvaluator::new());

        let result = session.start().await;
        assert!(matches!(
            result,
            Err(VoxcheckError::DeviceUnavailable { .. })
        ));
        assert!(matches!(session.state(), PipelineState::Failed(_)));
        // A failed acquisition must not be paired with a release
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_reported_in_failed_state() {
        let stream = MockCaptureStream::new().with_permission_failure();

        let session = fast_session(stream, MockEvaluator::new());

        let result = session.start().await;
        assert!(matches!(result, Err(VoxcheckError::PermissionDenied { .. })));
        match session.state() {
            PipelineState::Failed(info) => {
                assert!(info.message.contains("permission denied"));
            }
            other => panic!("Expected failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reset_from_idle_stays_idle() {
        let session = fast_session(MockCaptureStream::new(), MockEvaluator::new());
        session.reset().await;
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_reset_during_recording_releases_stream() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let releases = stream.release_counter();

        let session = fast_session(stream, MockEvaluator::new());
        session.start().await.unwrap();

        session.reset().await;

        assert!(session.state().is_idle());
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_from_result_returns_to_idle() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let session = fast_session(stream, MockEvaluator::new());
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;

        session.reset().await;
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_reset_from_failed_returns_to_idle() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let session = fast_session(stream, MockEvaluator::new().with_failure());
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| matches!(s, PipelineState::Failed(_))).await;

        session.reset().await;
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_reset_during_analysis_discards_late_result() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let evaluator = MockEvaluator::new().with_gate(Arc::clone(&gate));
        let calls = evaluator.call_counter();

        let session = fast_session(stream, evaluator);
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| s.is_analyzing()).await;

        session.reset().await;
        assert!(session.state().is_idle());

        // Let the held evaluation finish; its outcome must be dropped
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_late_result_does_not_corrupt_next_run() {
        use crate::analysis::report::AnalysisResult;
        use std::collections::VecDeque;

        /// Hands out scripted results in call order, holding each
        /// evaluation until a permit is available.
        struct SequencedEvaluator {
            results: std::sync::Mutex<VecDeque<AnalysisResult>>,
            started: Arc<std::sync::atomic::AtomicUsize>,
            gate: Arc<tokio::sync::Semaphore>,
        }

        #[async_trait::async_trait]
        impl Evaluator for SequencedEvaluator {
            async fn evaluate(
                &self,
                _capture: &crate::audio::recorder::AudioCapture,
            ) -> Result<AnalysisResult> {
                let result = self
                    .results
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("more evaluations than scripted results");
                self.started
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let _permit = self.gate.acquire().await.unwrap();
                Ok(result)
            }
        }

        async fn wait_until_started(counter: &std::sync::atomic::AtomicUsize, n: usize) {
            for _ in 0..500 {
                if counter.load(std::sync::atomic::Ordering::SeqCst) >= n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            panic!("evaluation {n} never claimed its scripted result");
        }

        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let started = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let evaluator = SequencedEvaluator {
            results: std::sync::Mutex::new(VecDeque::from([
                AnalysisResult::new(Metrics::new(90, 90, 90)),
                AnalysisResult::new(Metrics::new(61, 61, 61)),
            ])),
            started: Arc::clone(&started),
            gate: Arc::clone(&gate),
        };

        // The empty chunk in the middle stops the first run's final drain,
        // leaving "def" for the second run. A long poll interval keeps the
        // pump from stealing it early.
        let stream = MockCaptureStream::new().with_chunks(&[b"abc" as &[u8], b"", b"def"]);
        let session = Session::with_poll_interval(
            Box::new(stream),
            Arc::new(evaluator),
            Duration::from_secs(10),
        );
        let mut rx = session.watch_state();

        // First run claims its scripted result, then gets abandoned
        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_until_started(&started, 1).await;
        session.reset().await;

        // Second run parks in analyzing as well
        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_until_started(&started, 2).await;

        // Release both evaluations; only the second run's outcome may land
        gate.add_permits(2);
        let state = wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;
        match state {
            PipelineState::Result(report) => {
                assert_eq!(report.metrics.authentication_rate, 61);
            }
            other => panic!("Expected result state, got {other:?}"),
        }

        // The abandoned run's result must not overwrite it afterwards
        tokio::time::sleep(Duration::from_millis(50)).await;
        match session.state() {
            PipelineState::Result(report) => {
                assert_eq!(report.metrics.authentication_rate, 61);
            }
            other => panic!("Expected result state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_failure_while_recording_fails_the_check() {
        let stream = MockCaptureStream::new().with_read_failure();
        let releases = stream.release_counter();

        let session = fast_session(stream, MockEvaluator::new());
        let mut rx = session.watch_state();

        session.start().await.unwrap();

        let state = wait_for(&mut rx, |s| matches!(s, PipelineState::Failed(_))).await;
        match state {
            PipelineState::Failed(info) => {
                assert!(info.message.contains("Audio capture failed"));
            }
            other => panic!("Expected failed state, got {other:?}"),
        }
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_check_works_after_reset() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let acquires = stream.acquire_counter();
        let releases = stream.release_counter();

        let session = fast_session(stream, MockEvaluator::new());
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;
        session.reset().await;

        // Second cycle: the scripted chunks are exhausted, so this run
        // finalizes an empty capture and must fail cleanly
        session.start().await.unwrap();
        session.stop().await.unwrap();
        let state = wait_for(&mut rx, |s| matches!(s, PipelineState::Failed(_))).await;
        match state {
            PipelineState::Failed(info) => {
                assert!(info.message.contains("Capture is empty"));
            }
            other => panic!("Expected failed state, got {other:?}"),
        }

        assert_eq!(acquires.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_start_after_result_requires_reset() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let session = fast_session(stream, MockEvaluator::new());
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| matches!(s, PipelineState::Result(_))).await;

        let result = session.start().await;
        assert!(matches!(result, Err(VoxcheckError::NotIdle)));
        assert!(matches!(session.state(), PipelineState::Result(_)));
    }

    #[tokio::test]
    async fn test_pump_fills_buffer_while_recording() {
        let stream = MockCaptureStream::new().with_chunks(&[b"abc", b"def"]);
        let session = fast_session(stream, MockEvaluator::new());

        session.start().await.unwrap();
        // Give the pump a few ticks to drain the scripted chunks
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.buffered_bytes().await, 6);
    }

    #[tokio::test]
    async fn test_stop_while_analyzing_is_rejected() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let stream = MockCaptureStream::new().with_chunks(&[b"abc"]);
        let evaluator = MockEvaluator::new().with_gate(Arc::clone(&gate));

        let session = fast_session(stream, evaluator);
        let mut rx = session.watch_state();

        session.start().await.unwrap();
        session.stop().await.unwrap();
        wait_for(&mut rx, |s| s.is_analyzing()).await;

        let second_stop = session.stop().await;
        assert!(matches!(second_stop, Err(VoxcheckError::NotRecording)));
        assert!(session.state().is_analyzing());

        gate.notify_one();
    }
}
