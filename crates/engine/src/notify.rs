//! Notification sinks and message formatting.
//!
//! Transport adapters (chat bots, webhooks) live outside the core; in-tree
//! sinks either log through `tracing` or swallow messages for tests. Per
//! the `Notifier` contract, nothing here can fail the caller.

use async_trait::async_trait;
use tracing::info;

use paper_arb_core::{Notifier, Opportunity};

/// Notifier that writes every message to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, text: &str) {
        info!(target: "paper_arb::notify", "{text}");
    }
}

/// Notifier that drops every message. Useful in tests and benchmarks.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _text: &str) {}
}

/// Renders the standard opportunity notification.
#[must_use]
pub fn format_opportunity(opp: &Opportunity) -> String {
    format!(
        "Opportunity {}\nMarkets: {}\nEdge: {:.4}\nDetails: {}",
        opp.kind,
        opp.market_ids.join(", "),
        opp.net_edge,
        opp.description
    )
}

/// Renders the end-of-iteration summary notification.
#[must_use]
pub fn format_iteration_summary(
    iteration: u64,
    markets: usize,
    detected: usize,
    executed: usize,
) -> String {
    format!(
        "Iteration {iteration}: {markets} markets scanned, {detected} opportunities detected, {executed} executed."
    )
}

/// Renders a detector failure notification.
#[must_use]
pub fn format_detector_error(detector: &str, error: &str) -> String {
    format!("Error in detector {detector}: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_arb_core::{OpportunityKind, Side, TradeAction};
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_opportunity_mentions_kind_and_edge() {
        let opp = Opportunity {
            kind: OpportunityKind::Ladder,
            market_ids: vec!["m1".to_string(), "m2".to_string()],
            description: "threshold inversion".to_string(),
            net_edge: dec!(0.05),
            actions: vec![TradeAction::new("m1", "y", Side::Buy, dec!(1), dec!(0.4))],
            metadata: Default::default(),
        };
        let text = format_opportunity(&opp);
        assert!(text.contains("LADDER"));
        assert!(text.contains("m1, m2"));
        assert!(text.contains("0.0500"));
    }

    #[test]
    fn test_format_iteration_summary() {
        let text = format_iteration_summary(3, 42, 5, 2);
        assert!(text.contains("Iteration 3"));
        assert!(text.contains("42 markets"));
        assert!(text.contains("2 executed"));
    }

    #[tokio::test]
    async fn test_notifiers_never_fail() {
        TracingNotifier.send("hello").await;
        NullNotifier.send("hello").await;
    }
}
