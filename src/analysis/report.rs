//! Analysis metrics and verdict types.

use crate::defaults::AUTHENTIC_THRESHOLD;
use serde::Serialize;

/// The three scores produced by a voice authenticity analysis.
///
/// Each score is an integer percentage. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// How strongly the voice matches a genuine human signature.
    pub authentication_rate: u8,
    /// How natural the prosody and timbre sound.
    pub naturalness: u8,
    /// How stable the voice characteristics are across the capture.
    pub stability: u8,
}

impl Metrics {
    pub fn new(authentication_rate: u8, naturalness: u8, stability: u8) -> Self {
        Self {
            authentication_rate,
            naturalness,
            stability,
        }
    }
}

/// Overall call on a capture: genuine human voice or synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Authentic,
    Synthetic,
}

impl Verdict {
    /// Derive the verdict from a set of metrics.
    ///
    /// Authentic only when every metric reaches the threshold; a single
    /// weak score marks the capture as synthetic.
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let all_pass = metrics.authentication_rate >= AUTHENTIC_THRESHOLD
            && metrics.naturalness >= AUTHENTIC_THRESHOLD
            && metrics.stability >= AUTHENTIC_THRESHOLD;

        if all_pass {
            Verdict::Authentic
        } else {
            Verdict::Synthetic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Authentic => "authentic",
            Verdict::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed analysis: the sampled metrics plus the verdict derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub verdict: Verdict,
}

impl AnalysisResult {
    /// Build a result, deriving the verdict from the metrics.
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            verdict: Verdict::from_metrics(&metrics),
        }
    }
}
