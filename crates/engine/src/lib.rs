//! Orchestration for the paper-arb engine.
//!
//! Composes sources, detectors, the strict A+B validator, the risk gate,
//! and the paper broker into the iteration loop, and owns the two durable
//! outputs: the incremental live summary and the execution-trace log.

pub mod engine;
pub mod notify;
pub mod reporter;
pub mod trace;

pub use engine::{Engine, IterationOutcome};
pub use notify::{NullNotifier, TracingNotifier};
pub use reporter::{LiveReporter, ReportError, ReportState};
pub use trace::{ExecutionTrace, ExecutionTraceLogger, RiskApproval, TraceStatus};
