//! Check pipeline: state machine and the session that drives it.
//!
//! The reducer in [`state`] is a pure function over state and event;
//! [`session`] owns the recorder and evaluator and feeds the reducer.

pub mod session;
pub mod state;

pub use session::Session;
pub use state::{FailureInfo, PipelineEvent, PipelineState, reduce};
