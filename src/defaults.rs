//! Default configuration constants for voxcheck.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech processing and keeps capture payloads
/// small; the evaluator treats the bytes as opaque either way.
pub const SAMPLE_RATE: u32 = 16000;

/// Media type tag attached to PCM captures.
///
/// Signed 16-bit little-endian mono at [`SAMPLE_RATE`]. Downstream consumers
/// must not assume more than "some bytes plus this tag".
pub const PCM_MEDIA_TYPE: &str = "audio/pcm;rate=16000";

/// Lowest value a simulated metric can take.
pub const METRIC_FLOOR: u8 = 60;

/// Highest value a simulated metric can take.
pub const METRIC_CEILING: u8 = 100;

/// Verdict threshold: a capture is called authentic only when every metric
/// reaches this value.
///
/// Placeholder policy for the simulated evaluator. The number carries no
/// acoustic meaning, which is why it is a constant and not a config knob.
pub const AUTHENTIC_THRESHOLD: u8 = 75;

/// Default minimum artificial analysis delay in milliseconds.
///
/// The simulated evaluator pauses for a random duration inside the
/// [min, max] window so the analyzing phase is observable.
pub const MIN_ANALYSIS_DELAY_MS: u64 = 1000;

/// Default maximum artificial analysis delay in milliseconds.
pub const MAX_ANALYSIS_DELAY_MS: u64 = 3000;

/// Interval in milliseconds at which the session pump drains pending chunks
/// while recording.
///
/// ~60Hz keeps per-poll chunk sizes small without measurable CPU cost.
pub const POLL_INTERVAL_MS: u64 = 16;

/// Chunk size in samples for finite sources (WAV file / stdin).
///
/// 1600 samples = 100ms at 16kHz, matching the granularity a live
/// input callback typically delivers.
pub const WAV_CHUNK_SAMPLES: usize = 1600;
