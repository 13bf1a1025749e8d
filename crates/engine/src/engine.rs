//! The iteration loop.
//!
//! Fetch from every source under a timeout, run the detector pipeline over
//! the immutable snapshot, order candidates deterministically, gate each one
//! (strict A+B first in dual-venue mode, then the risk rules), execute
//! approvals against the paper broker, and report. Broker state advances
//! inside the loop, so each opportunity is judged against everything
//! approved before it in the same iteration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use paper_arb_broker::PaperBroker;
use paper_arb_core::{
    market_lookup, AppConfig, CoreError, Detector, Market, MarketLookup, MarketSource, Notifier,
    Opportunity,
};
use paper_arb_detectors::build_detectors;
use paper_arb_risk::{RiskGate, StrictAbValidator};

use crate::notify::{format_detector_error, format_iteration_summary, format_opportunity};
use crate::reporter::LiveReporter;
use crate::trace::{ExecutionTrace, ExecutionTraceLogger, RiskApproval, TraceStatus};

/// Counters from a single iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationOutcome {
    /// 1-based iteration number.
    pub iteration: u64,
    /// Markets in the merged snapshot.
    pub markets: usize,
    /// Opportunities emitted by all detectors.
    pub detected: usize,
    /// Opportunities approved and sent to the broker.
    pub approved: usize,
    /// Fills produced.
    pub fills: usize,
    /// Detectors that errored and were skipped.
    pub detector_failures: usize,
    /// Whether the reporter wrote a new row.
    pub report_written: bool,
}

/// The paper-trading arbitrage engine.
pub struct Engine {
    config: AppConfig,
    sources: Vec<Box<dyn MarketSource>>,
    notifier: Option<Box<dyn Notifier>>,
    detectors: Vec<Box<dyn Detector>>,
    validator: StrictAbValidator,
    risk: RiskGate,
    broker: PaperBroker,
    reporter: LiveReporter,
    trace: ExecutionTraceLogger,
    shutdown: Arc<AtomicBool>,
    iteration: u64,
}

impl Engine {
    /// Builds an engine with the detector set derived from configuration.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or an unusable reports directory -
    /// the two startup-fatal paths.
    pub fn new(
        config: AppConfig,
        sources: Vec<Box<dyn MarketSource>>,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Result<Self> {
        let detectors = build_detectors(&config);
        Self::with_detectors(config, sources, notifier, detectors)
    }

    /// Builds an engine with an explicit detector set.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or an unusable reports directory.
    pub fn with_detectors(
        config: AppConfig,
        sources: Vec<Box<dyn MarketSource>>,
        notifier: Option<Box<dyn Notifier>>,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Result<Self> {
        config.validate()?;
        let reporter = LiveReporter::new(&config.engine.report_path)?;
        let trace = ExecutionTraceLogger::new(&config.engine.report_path);

        Ok(Self {
            risk: RiskGate::new(config.risk.clone()),
            broker: PaperBroker::new(config.broker.clone()),
            validator: StrictAbValidator::new(),
            config,
            sources,
            notifier,
            detectors,
            reporter,
            trace,
            shutdown: Arc::new(AtomicBool::new(false)),
            iteration: 0,
        })
    }

    /// Flag that aborts the run at the next iteration boundary. The current
    /// broker execution and report always complete first.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The broker, for inspection after a run.
    #[must_use]
    pub const fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    async fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            let bound = Duration::from_secs(self.config.engine.fetch_timeout_secs);
            if tokio::time::timeout(bound, notifier.send(text)).await.is_err() {
                warn!("notifier timed out, continuing");
            }
        }
    }

    /// Fetches and merges all sources. Transient failures and timeouts
    /// contribute empty data and the iteration continues.
    async fn fetch_markets(&mut self) -> Vec<Market> {
        let bound = Duration::from_secs(self.config.engine.fetch_timeout_secs);
        let mut markets = Vec::new();

        for source in &mut self.sources {
            let venue = source.metadata().venue;
            match tokio::time::timeout(bound, source.fetch()).await {
                Ok(Ok(batch)) => {
                    info!(venue = %venue, markets = batch.len(), "fetched snapshot");
                    markets.extend(batch);
                }
                Ok(Err(e)) => {
                    warn!(venue = %venue, error = %e, "source fetch failed, continuing with empty data");
                }
                Err(_) => {
                    warn!(venue = %venue, timeout_secs = bound.as_secs(), "source fetch timed out");
                }
            }
        }

        markets
    }

    /// Runs every detector in isolation over the snapshot.
    fn run_detectors(&mut self, markets: &[Market]) -> (Vec<(&'static str, Opportunity)>, Vec<(String, String)>) {
        let mut detected = Vec::new();
        let mut failures = Vec::new();

        for detector in &mut self.detectors {
            let name = detector.name();
            match detector.detect(markets) {
                Ok(opportunities) => {
                    for opp in opportunities {
                        detected.push((name, opp));
                    }
                }
                Err(e) => {
                    error!(detector = name, error = %e, "detector failed, skipping for this iteration");
                    failures.push((name.to_string(), e.to_string()));
                }
            }
        }

        (detected, failures)
    }

    /// Runs one full iteration.
    ///
    /// # Errors
    ///
    /// Only reporter disk failures propagate; every other failure class is
    /// contained inside the iteration.
    pub async fn run_once(&mut self) -> Result<IterationOutcome> {
        self.iteration += 1;
        let iteration = self.iteration;

        let markets = self.fetch_markets().await;
        let lookup = market_lookup(&markets);

        let (mut detected, failures) = self.run_detectors(&markets);
        // Deterministic gating order regardless of detector scheduling.
        detected.sort_by_cached_key(|(_, opp)| opp.id());

        let mut approved: Vec<Opportunity> = Vec::new();
        let mut fills_total = 0usize;
        let mut notifications: Vec<String> = failures
            .iter()
            .map(|(name, error)| format_detector_error(name, error))
            .collect();

        for (detector_name, opp) in &detected {
            // Opportunities referencing markets outside the snapshot are
            // inconsistent data; drop them.
            let unknown = opp
                .market_ids
                .iter()
                .find(|id| !lookup.contains_key(id.as_str()));
            if let Some(market_id) = unknown {
                let inconsistency = CoreError::UnknownMarket {
                    market_id: market_id.clone(),
                };
                warn!(kind = %opp.kind, error = %inconsistency, "dropping opportunity");
                continue;
            }

            let started = Instant::now();

            if self.config.engine.dual_venue {
                let verdict = self.validator.validate(opp, &lookup, self.broker.positions());
                if !verdict.is_valid {
                    let reason = verdict.rejection.map(|r| r.as_str().to_string());
                    self.record_trace(detector_name, opp, &lookup, false, reason, &[], started);
                    continue;
                }
            }

            let verdict = self.risk.approve(
                &lookup,
                opp,
                self.broker.positions(),
                self.broker.cash(),
            );
            if let Err(rejection) = verdict {
                self.record_trace(
                    detector_name,
                    opp,
                    &lookup,
                    false,
                    Some(rejection.code().to_string()),
                    &[],
                    started,
                );
                continue;
            }

            let fills = self.broker.execute(&lookup, opp);
            fills_total += fills.len();
            self.record_trace(detector_name, opp, &lookup, true, None, &fills, started);

            notifications.push(format_opportunity(opp));
            approved.push(opp.clone());
        }

        let detected_plain: Vec<Opportunity> =
            detected.iter().map(|(_, opp)| opp.clone()).collect();
        let report_written =
            self.reporter
                .report(iteration, &markets, &detected_plain, &approved)?;

        notifications.push(format_iteration_summary(
            iteration,
            markets.len(),
            detected.len(),
            approved.len(),
        ));
        for text in &notifications {
            self.notify(text).await;
        }

        Ok(IterationOutcome {
            iteration,
            markets: markets.len(),
            detected: detected.len(),
            approved: approved.len(),
            fills: fills_total,
            detector_failures: failures.len(),
            report_written,
        })
    }

    /// Runs the configured number of iterations, sleeping `refresh_seconds`
    /// between them. Stops early when the shutdown flag is raised.
    ///
    /// # Errors
    ///
    /// Propagates reporter disk failures.
    pub async fn run(&mut self) -> Result<()> {
        let iterations = self.config.engine.iterations;
        for i in 1..=iterations {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, stopping before iteration {i}");
                break;
            }

            let outcome = self.run_once().await?;
            info!(
                iteration = outcome.iteration,
                markets = outcome.markets,
                detected = outcome.detected,
                approved = outcome.approved,
                fills = outcome.fills,
                "iteration complete"
            );

            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, reporter flushed, stopping");
                break;
            }
            if i < iterations {
                tokio::time::sleep(Duration::from_secs_f64(self.config.engine.refresh_seconds))
                    .await;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_trace(
        &self,
        detector: &str,
        opp: &Opportunity,
        lookup: &MarketLookup<'_>,
        allowed: bool,
        reason: Option<String>,
        fills: &[paper_arb_core::Trade],
        started: Instant,
    ) {
        let mut prices_before = BTreeMap::new();
        for action in &opp.actions {
            if let Some(market) = lookup.get(action.market_id.as_str()) {
                if let Some(outcome) = market.outcomes.iter().find(|o| o.id == action.outcome_id) {
                    prices_before.insert(
                        format!("{}:{}", action.market_id, action.outcome_id),
                        outcome.price,
                    );
                }
            }
        }

        let status = if allowed {
            ExecutionTrace::status_of(&opp.actions, fills)
        } else {
            TraceStatus::Cancelled
        };
        let realized_pnl: Decimal = fills.iter().map(|f| f.realized_pnl).sum();

        let record = ExecutionTrace {
            trace_id: ExecutionTrace::derive_trace_id(opp, detector),
            timestamp_utc: Utc::now(),
            opportunity_id: opp.id(),
            detector: detector.to_string(),
            markets: opp.market_ids.clone(),
            prices_before,
            intended_actions: opp.actions.clone(),
            risk_approval: RiskApproval { allowed, reason },
            executions: fills.to_vec(),
            hedge: None,
            status,
            realized_pnl,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        if let Err(e) = self.trace.append(&record) {
            warn!(error = %e, "trace log append failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use paper_arb_core::{
        Opportunity, OpportunityKind, Outcome, Side, SourceMetadata, TradeAction, Venue,
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    struct StaticSource {
        venue: Venue,
        markets: Vec<Market>,
    }

    #[async_trait]
    impl MarketSource for StaticSource {
        async fn fetch(&mut self) -> Result<Vec<Market>> {
            Ok(self.markets.clone())
        }

        fn metadata(&self) -> SourceMetadata {
            SourceMetadata {
                venue: self.venue,
                fee_bps: dec!(10),
                tick_size: dec!(0.01),
                supports_orderbook: false,
            }
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MarketSource for FailingSource {
        async fn fetch(&mut self) -> Result<Vec<Market>> {
            Err(anyhow!("venue unreachable"))
        }

        fn metadata(&self) -> SourceMetadata {
            SourceMetadata {
                venue: Venue::Kalshi,
                fee_bps: dec!(10),
                tick_size: dec!(0.01),
                supports_orderbook: false,
            }
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _markets: &[Market]) -> Result<Vec<Opportunity>> {
            Err(anyhow!("internal detector bug"))
        }
    }

    struct GhostDetector;

    impl Detector for GhostDetector {
        fn name(&self) -> &'static str {
            "ghost"
        }

        fn detect(&mut self, _markets: &[Market]) -> Result<Vec<Opportunity>> {
            Ok(vec![Opportunity {
                kind: OpportunityKind::Parity,
                market_ids: vec!["missing".to_string()],
                description: "references a market outside the snapshot".to_string(),
                net_edge: dec!(0.10),
                actions: vec![TradeAction::new("missing", "y", Side::Buy, dec!(1), dec!(0.4))],
                metadata: Default::default(),
            }])
        }
    }

    fn parity_market(id: &str, venue: Venue) -> Market {
        Market {
            id: id.to_string(),
            question: "Will the index settle higher this quarter?".to_string(),
            outcomes: vec![
                Outcome::new("y", "Yes", dec!(0.45)),
                Outcome::new("n", "No", dec!(0.45)),
            ],
            end_date: Some(Utc::now() + chrono::Duration::days(30)),
            liquidity: dec!(10000),
            volume: dec!(5000),
            tags: vec![],
            description: None,
            comparator: None,
            threshold: None,
            asset: None,
            resolution_source: None,
            venue,
        }
    }

    fn test_config(dir: &TempDir) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.engine.report_path = dir.path().to_string_lossy().to_string();
        cfg.engine.iterations = 1;
        cfg
    }

    fn engine_with(
        cfg: AppConfig,
        markets: Vec<Market>,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Engine {
        let source = StaticSource {
            venue: Venue::Polymarket,
            markets,
        };
        Engine::with_detectors(cfg, vec![Box::new(source)], None, detectors).unwrap()
    }

    #[tokio::test]
    async fn test_parity_flows_through_to_fills() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir);
        let mut engine = Engine::new(
            cfg,
            vec![Box::new(StaticSource {
                venue: Venue::Polymarket,
                markets: vec![parity_market("polymarket:m1", Venue::Polymarket)],
            })],
            None,
        )
        .unwrap();

        let outcome = engine.run_once().await.unwrap();
        assert_eq!(outcome.markets, 1);
        assert!(outcome.detected >= 1);
        assert_eq!(outcome.approved, 1);
        assert_eq!(outcome.fills, 2);
        assert!(outcome.report_written);
        assert!(engine.broker().cash() < dec!(10000));
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_writes_one_report_row() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config(&dir);
        // Freeze approvals to keep the approved-set hash stable: with the
        // default cap the same parity market approves every iteration.
        cfg.risk.max_open_positions = 50;
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            build_detectors(&AppConfig::default()),
        );

        let first = engine.run_once().await.unwrap();
        let second = engine.run_once().await.unwrap();
        assert!(first.report_written);
        assert!(!second.report_written);
    }

    #[tokio::test]
    async fn test_failing_detector_is_isolated() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir);
        let mut detectors = build_detectors(&AppConfig::default());
        detectors.insert(0, Box::new(FailingDetector));
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            detectors,
        );

        let outcome = engine.run_once().await.unwrap();
        assert_eq!(outcome.detector_failures, 1);
        // The parity detector still ran and its opportunity still executed.
        assert_eq!(outcome.approved, 1);
    }

    #[tokio::test]
    async fn test_failing_source_yields_empty_iteration() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir);
        let mut engine = Engine::new(cfg, vec![Box::new(FailingSource)], None).unwrap();

        let outcome = engine.run_once().await.unwrap();
        assert_eq!(outcome.markets, 0);
        assert_eq!(outcome.detected, 0);
    }

    #[tokio::test]
    async fn test_unknown_market_opportunity_dropped() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir);
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            vec![Box::new(GhostDetector)],
        );

        let outcome = engine.run_once().await.unwrap();
        assert_eq!(outcome.detected, 1);
        assert_eq!(outcome.approved, 0);
        assert_eq!(outcome.fills, 0);
    }

    #[tokio::test]
    async fn test_dual_venue_mode_blocks_single_venue_opportunities() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config(&dir);
        cfg.engine.dual_venue = true;
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            build_detectors(&AppConfig::default()),
        );

        let outcome = engine.run_once().await.unwrap();
        // The parity opportunity is single-venue; strict A+B rejects it
        // before the risk gate.
        assert!(outcome.detected >= 1);
        assert_eq!(outcome.approved, 0);
        assert_eq!(outcome.fills, 0);
    }

    #[tokio::test]
    async fn test_trace_log_written_for_gated_opportunities() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir);
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            build_detectors(&AppConfig::default()),
        );

        engine.run_once().await.unwrap();

        let trace_path = dir.path().join("opportunity_logs.jsonl");
        let raw = std::fs::read_to_string(trace_path).unwrap();
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["detector"], "parity");
        assert_eq!(first["risk_approval"]["allowed"], true);
        assert_eq!(first["status"], "success");
    }

    #[tokio::test]
    async fn test_run_respects_shutdown_flag() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config(&dir);
        cfg.engine.iterations = 1000;
        cfg.engine.refresh_seconds = 0.001;
        let mut engine = engine_with(
            cfg,
            vec![parity_market("polymarket:m1", Venue::Polymarket)],
            build_detectors(&AppConfig::default()),
        );

        // Raised before the run: the loop exits on the first boundary check.
        engine.shutdown_handle().store(true, Ordering::Relaxed);
        engine.run().await.unwrap();
        assert_eq!(engine.broker().trades().len(), 0);
    }

    #[tokio::test]
    async fn test_deterministic_opportunity_ordering() {
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();
        let markets = vec![
            parity_market("polymarket:m1", Venue::Polymarket),
            parity_market("polymarket:m2", Venue::Polymarket),
            parity_market("polymarket:m3", Venue::Polymarket),
        ];

        let mut engine1 = engine_with(
            test_config(&dir1),
            markets.clone(),
            build_detectors(&AppConfig::default()),
        );
        let mut engine2 = engine_with(
            test_config(&dir2),
            markets,
            build_detectors(&AppConfig::default()),
        );

        engine1.run_once().await.unwrap();
        engine2.run_once().await.unwrap();

        let sequence = |engine: &Engine| {
            engine
                .broker()
                .trades()
                .iter()
                .map(|t| format!("{}:{}:{}", t.market_id, t.outcome_id, t.side))
                .collect::<Vec<_>>()
        };
        assert_eq!(sequence(&engine1), sequence(&engine2));
    }
}
