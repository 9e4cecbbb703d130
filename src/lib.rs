//! voxcheck - Voice authenticity checking from the terminal
//!
//! Records a short voice sample (or reads a WAV file), runs it through a
//! placeholder authenticity analyzer, and reports three scores plus a
//! verdict.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod analysis;
#[cfg(feature = "cli")]
pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
#[cfg(feature = "cli")]
pub mod render;

// Core seams (capture → evaluate → present)
pub use analysis::{AnalysisResult, Evaluator, Metrics, SimulatedEvaluator, Verdict};
pub use audio::{AudioCapture, CaptureStream, Recorder};
pub use pipeline::{PipelineEvent, PipelineState, Session, reduce};

// Error handling
pub use error::{Result, VoxcheckError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
