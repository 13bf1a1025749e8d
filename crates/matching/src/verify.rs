//! Optional verification of related-market groups.
//!
//! Grouping is heuristic; deployments can bolt an external verifier (a
//! human review queue, an LLM, a rules service) behind [`GroupVerifier`] to
//! split each group into confirmed sub-groups. Without a verifier every
//! group passes through as a single sub-group.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::warn;

use paper_arb_core::{FailMode, Market};

/// Splits a heuristic group into verified sub-groups.
pub trait GroupVerifier: Send + Sync {
    /// Whether verification should run at all.
    fn enabled(&self) -> bool {
        true
    }

    /// Partitions a group into sub-groups of market ids that truly share an
    /// event. Ids not mentioned in the result are dropped from the group.
    ///
    /// # Errors
    ///
    /// Errors are handled per the configured [`FailMode`].
    fn verify(&self, group: &[&Market]) -> Result<Vec<Vec<String>>>;
}

/// Applies an optional verifier to grouped markets.
///
/// With no verifier (or a disabled one) each group becomes its single
/// sub-group. On verifier failure, `FailOpen` keeps the original group and
/// `FailClosed` drops it.
#[must_use]
pub fn verify_groups<'a>(
    groups: &BTreeMap<String, Vec<&'a Market>>,
    verifier: Option<&dyn GroupVerifier>,
    fail_mode: FailMode,
) -> BTreeMap<String, Vec<Vec<&'a Market>>> {
    let mut verified: BTreeMap<String, Vec<Vec<&Market>>> = BTreeMap::new();

    for (group_id, members) in groups {
        let passthrough = || vec![members.clone()];

        let active = verifier.filter(|v| v.enabled());
        let Some(v) = active else {
            verified.insert(group_id.clone(), passthrough());
            continue;
        };

        if members.len() < 2 {
            verified.insert(group_id.clone(), passthrough());
            continue;
        }

        match v.verify(members) {
            Ok(subgroup_ids) => {
                let subgroups: Vec<Vec<&Market>> = subgroup_ids
                    .iter()
                    .map(|ids| {
                        members
                            .iter()
                            .filter(|m| ids.contains(&m.id))
                            .copied()
                            .collect::<Vec<_>>()
                    })
                    .filter(|sg: &Vec<&Market>| !sg.is_empty())
                    .collect();
                verified.insert(group_id.clone(), subgroups);
            }
            Err(e) => match fail_mode {
                FailMode::FailOpen => {
                    warn!(group = %group_id, error = %e, "group verification failed, keeping heuristic group");
                    verified.insert(group_id.clone(), passthrough());
                }
                FailMode::FailClosed => {
                    warn!(group = %group_id, error = %e, "group verification failed, dropping group");
                    verified.insert(group_id.clone(), Vec::new());
                }
            },
        }
    }

    verified
}
