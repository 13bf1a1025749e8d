//! Incremental, restart-safe reporting.
//!
//! One CSV accumulates a row per *change* in the observable state: the set
//! of market ids and the set of approved opportunity ids, each reduced to a
//! SHA-256. Unchanged inputs write nothing, across restarts too, because the
//! hashes persist in a small JSON state file written atomically (temp file
//! plus rename).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use paper_arb_core::{Market, Opportunity};

/// Errors on the reporter's disk path. These are the only non-config errors
/// the engine treats as fatal.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure.
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failure.
    #[error("report CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// State serialization failure.
    #[error("report state error: {0}")]
    State(#[from] serde_json::Error),
}

/// Persisted dedup state: two content hashes and a timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportState {
    /// SHA-256 over the sorted market id set.
    pub market_ids_hash: Option<String>,
    /// SHA-256 over the sorted approved opportunity id set.
    pub approved_opp_ids_hash: Option<String>,
    /// ISO-8601 UTC timestamp of the last write.
    pub last_updated: Option<String>,
}

const SUMMARY_COLUMNS: [&str; 13] = [
    "TIMESTAMP",
    "READABLE_TIME",
    "ITERATION",
    "MARKETS",
    "MARKETS_Δ",
    "DETECTED",
    "DETECTED_Δ",
    "APPROVED",
    "APPROVED_Δ",
    "APPROVAL%",
    "STATUS",
    "MARKET_HASH",
    "OPP_HASH",
];

const SUMMARY_UNITS: [&str; 13] = [
    "unix_seconds",
    "utc",
    "count",
    "count",
    "delta_vs_previous_row",
    "count",
    "delta_vs_previous_row",
    "count",
    "delta_vs_previous_row",
    "percent",
    "write_trigger",
    "sha256",
    "sha256",
];

/// Writes `live_summary.csv` and `.last_report_state.json` under a reports
/// directory, appending a data row only when the observable state changed.
#[derive(Debug)]
pub struct LiveReporter {
    reports_dir: PathBuf,
    state: ReportState,
    // Previous row's counts, for the delta columns. Not persisted: after a
    // restart deltas restart from zero baselines.
    previous_counts: Option<(usize, usize, usize)>,
}

impl LiveReporter {
    /// Opens a reporter over a directory, creating it and loading any
    /// persisted state.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created. A corrupt state file is
    /// not fatal: it is ignored and rebuilt on the next write.
    pub fn new(reports_dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let reports_dir = reports_dir.into();
        fs::create_dir_all(&reports_dir)?;

        let state_path = Self::state_path_of(&reports_dir);
        let state = match fs::read_to_string(&state_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %state_path.display(), error = %e, "ignoring corrupt report state");
                ReportState::default()
            }),
            Err(_) => ReportState::default(),
        };

        Ok(Self {
            reports_dir,
            state,
            previous_counts: None,
        })
    }

    /// The summary CSV path.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.reports_dir.join("live_summary.csv")
    }

    /// The state file path.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        Self::state_path_of(&self.reports_dir)
    }

    fn state_path_of(dir: &Path) -> PathBuf {
        dir.join(".last_report_state.json")
    }

    /// Loaded or last-written dedup state.
    #[must_use]
    pub const fn state(&self) -> &ReportState {
        &self.state
    }

    /// SHA-256 hex over sorted ids joined by newlines. Order-independent.
    #[must_use]
    pub fn content_hash<I, S>(ids: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: Vec<String> = ids.into_iter().map(Into::into).collect();
        sorted.sort();
        let mut hasher = Sha256::new();
        hasher.update(sorted.join("\n").as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Reports one iteration. Returns true when a row was written.
    ///
    /// A row is written when either content hash differs from the persisted
    /// state, or the summary CSV is missing entirely.
    ///
    /// # Errors
    ///
    /// Disk failures on this path are the engine's only runtime-fatal
    /// error class.
    pub fn report(
        &mut self,
        iteration: u64,
        markets: &[Market],
        detected: &[Opportunity],
        approved: &[Opportunity],
    ) -> Result<bool, ReportError> {
        let market_hash = Self::content_hash(markets.iter().map(|m| m.id.clone()));
        let opp_hash = Self::content_hash(approved.iter().map(Opportunity::id));

        let summary = self.summary_path();
        let csv_missing = !summary.exists();
        let markets_changed = self.state.market_ids_hash.as_deref() != Some(market_hash.as_str());
        let approved_changed =
            self.state.approved_opp_ids_hash.as_deref() != Some(opp_hash.as_str());

        if !csv_missing && !markets_changed && !approved_changed {
            debug!(iteration, "report unchanged, skipping write");
            return Ok(false);
        }

        let status = match (csv_missing, markets_changed, approved_changed) {
            (true, _, _) => "baseline",
            (_, true, true) => "both_changed",
            (_, true, false) => "markets_changed",
            _ => "approved_changed",
        };

        self.append_row(iteration, markets.len(), detected.len(), approved.len(), status, &market_hash, &opp_hash)?;
        self.persist_state(market_hash, opp_hash)?;
        self.previous_counts = Some((markets.len(), detected.len(), approved.len()));

        info!(iteration, status, "report row written");
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn append_row(
        &self,
        iteration: u64,
        markets: usize,
        detected: usize,
        approved: usize,
        status: &str,
        market_hash: &str,
        opp_hash: &str,
    ) -> Result<(), ReportError> {
        let summary = self.summary_path();
        let is_new = !summary.exists();

        let file = OpenOptions::new().create(true).append(true).open(&summary)?;
        let mut writer = csv::Writer::from_writer(file);

        if is_new {
            writer.write_record(SUMMARY_COLUMNS)?;
            writer.write_record(SUMMARY_UNITS)?;
        }

        let (prev_markets, prev_detected, prev_approved) =
            self.previous_counts.unwrap_or((0, 0, 0));
        #[allow(clippy::cast_precision_loss)]
        let approval_pct = if detected == 0 {
            0.0
        } else {
            approved as f64 / detected as f64 * 100.0
        };

        let now = Utc::now();
        writer.write_record([
            now.timestamp().to_string(),
            now.format("%Y-%m-%d %H:%M:%S").to_string(),
            iteration.to_string(),
            markets.to_string(),
            (markets as i64 - prev_markets as i64).to_string(),
            detected.to_string(),
            (detected as i64 - prev_detected as i64).to_string(),
            approved.to_string(),
            (approved as i64 - prev_approved as i64).to_string(),
            format!("{approval_pct:.1}"),
            status.to_string(),
            market_hash.to_string(),
            opp_hash.to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }

    fn persist_state(&mut self, market_hash: String, opp_hash: String) -> Result<(), ReportError> {
        self.state = ReportState {
            market_ids_hash: Some(market_hash),
            approved_opp_ids_hash: Some(opp_hash),
            last_updated: Some(Utc::now().to_rfc3339()),
        };

        // Atomic swap: a crash mid-write leaves the previous state intact.
        let final_path = self.state_path();
        let tmp_path = final_path.with_extension("json.tmp");
        let tmp_file = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&tmp_file, &self.state)?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}
