//! Execution-trace logging.
//!
//! One JSON-Lines record per gated opportunity, capturing intent (the legs
//! as detected), the risk verdict, and what actually filled. Trace ids are
//! derived from opportunity content, so identical inputs produce identical
//! ids across runs - the log diffs cleanly between deployments.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use paper_arb_core::{Opportunity, Trade, TradeAction};

use crate::reporter::ReportError;

/// Terminal status of one gated opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    /// Every leg filled in full.
    Success,
    /// Some legs filled, or filled short of the requested amount.
    Partial,
    /// Nothing executed (rejected or zero fills).
    Cancelled,
    /// An unexpected failure interrupted execution.
    Error,
}

/// The risk verdict embedded in a trace record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskApproval {
    /// Whether the gate (and validator, in dual-venue mode) let it through.
    pub allowed: bool,
    /// Rejection reason code when not allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One execution trace record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Deterministic id over opportunity content and detector.
    pub trace_id: String,
    /// Wall-clock time of the record.
    pub timestamp_utc: DateTime<Utc>,
    /// The opportunity's deterministic id.
    pub opportunity_id: String,
    /// Detector that produced the opportunity.
    pub detector: String,
    /// Markets referenced.
    pub markets: Vec<String>,
    /// Quoted prices per `market:outcome` at detection time.
    pub prices_before: BTreeMap<String, Decimal>,
    /// The legs as the detector intended them.
    pub intended_actions: Vec<TradeAction>,
    /// Risk verdict.
    pub risk_approval: RiskApproval,
    /// Fills actually produced.
    pub executions: Vec<Trade>,
    /// Hedge leg, reserved; always null in paper mode.
    pub hedge: Option<serde_json::Value>,
    /// Terminal status.
    pub status: TraceStatus,
    /// Signed cash impact across all fills.
    pub realized_pnl: Decimal,
    /// Wall-clock gate-to-fill latency.
    pub latency_ms: u64,
}

impl ExecutionTrace {
    /// Derives the deterministic trace id for an opportunity/detector pair.
    #[must_use]
    pub fn derive_trace_id(opportunity: &Opportunity, detector: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(opportunity.id().as_bytes());
        hasher.update(b"|");
        hasher.update(detector.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Classifies fills against intent.
    #[must_use]
    pub fn status_of(intended: &[TradeAction], executions: &[Trade]) -> TraceStatus {
        if executions.is_empty() {
            return TraceStatus::Cancelled;
        }
        if executions.len() < intended.len() {
            return TraceStatus::Partial;
        }
        let fully_filled = intended.iter().zip(executions.iter()).all(|(action, fill)| {
            fill.amount_filled >= action.amount
        });
        if fully_filled {
            TraceStatus::Success
        } else {
            TraceStatus::Partial
        }
    }
}

/// Appends execution traces to a JSONL file.
#[derive(Debug)]
pub struct ExecutionTraceLogger {
    path: PathBuf,
}

impl ExecutionTraceLogger {
    /// Creates a logger writing to `opportunity_logs.jsonl` under the
    /// reports directory.
    #[must_use]
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: reports_dir.into().join("opportunity_logs.jsonl"),
        }
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Disk failures surface to the caller; the engine logs and continues,
    /// since the trace log is an audit aid rather than a correctness
    /// requirement.
    pub fn append(&self, record: &ExecutionTrace) -> Result<(), ReportError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
