//! Pipeline state machine.
//!
//! All state transitions go through [`reduce`], a pure function over
//! (state, event) pairs. Events that make no sense in the current state
//! leave it unchanged, so stale or duplicated events are harmless.

use crate::analysis::report::AnalysisResult;
use crate::error::VoxcheckError;

/// Details carried in the failed state, cloneable for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub message: String,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&VoxcheckError> for FailureInfo {
    fn from(err: &VoxcheckError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Where a check currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing in progress; ready to start a check.
    #[default]
    Idle,
    /// Microphone acquired, capture in progress.
    Recording,
    /// Capture finalized, waiting on the evaluator.
    Analyzing,
    /// Analysis finished with a report.
    Result(AnalysisResult),
    /// A step failed; reset to start over.
    Failed(FailureInfo),
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, PipelineState::Recording)
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, PipelineState::Analyzing)
    }

    /// Short lowercase name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Recording => "recording",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Result(_) => "result",
            PipelineState::Failed(_) => "failed",
        }
    }
}

/// Things that happen to a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The capture stream was acquired and recording began.
    RecordingStarted,
    /// The recording was stopped and the capture finalized.
    CaptureFinalized,
    /// The evaluator produced a report.
    AnalysisSucceeded(AnalysisResult),
    /// A step failed (acquisition, capture, or analysis).
    Failed(FailureInfo),
    /// The user asked to go back to idle.
    Reset,
}

/// Advance the state machine by one event.
///
/// Reset returns to idle from every state. Failures are only accepted while
/// a check is underway; once a result or failure is shown it stays until
/// reset. All other combinations leave the state unchanged.
pub fn reduce(state: PipelineState, event: PipelineEvent) -> PipelineState {
    use PipelineEvent as E;
    use PipelineState as S;

    match (state, event) {
        (_, E::Reset) => S::Idle,
        (S::Idle, E::RecordingStarted) => S::Recording,
        (S::Recording, E::CaptureFinalized) => S::Analyzing,
        (S::Analyzing, E::AnalysisSucceeded(result)) => S::Result(result),
        (S::Idle | S::Recording | S::Analyzing, E::Failed(failure)) => S::Failed(failure),
        (state, _) => state,
    }
}
