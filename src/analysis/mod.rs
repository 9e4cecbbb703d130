//! Voice authenticity analysis: evaluator trait, simulated backend, reports.

pub mod evaluator;
pub mod report;
pub mod simulated;

pub use evaluator::{Evaluator, MockEvaluator};
pub use report::{AnalysisResult, Metrics, Verdict};
pub use simulated::{
    FixedMetricSource, MetricSource, NoopPacer, Pacer, SimulatedEvaluator, TokioPacer,
    UniformMetricSource,
};
