//! Entitlement convergence
//!
//! The delta between the current and desired entitlement sets is computed
//! from membership alone and applied removals first, so at no point does a
//! pool hold more than `max(|current|, |desired|)` entitlements. When a batch
//! fails the caller learns exactly which deltas the service confirmed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::inventory::InventoryService;
use crate::models::EntitlementSet;
use crate::{Error, Result};

/// Minimal changes taking a pool from its current to its desired entitlements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementPlan {
    pub pool_id: String,
    pub to_add: EntitlementSet,
    pub to_remove: EntitlementSet,
}

impl EntitlementPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn reconcile(
    pool_id: &str,
    current: &EntitlementSet,
    desired: &EntitlementSet,
) -> EntitlementPlan {
    EntitlementPlan {
        pool_id: pool_id.to_string(),
        to_add: desired.difference(current),
        to_remove: current.difference(desired),
    }
}

/// Which batch was running when convergence stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Removal,
    Addition,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Removal => f.write_str("removal"),
            Phase::Addition => f.write_str("addition"),
        }
    }
}

/// Deltas the service confirmed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub pool_id: String,
    pub removed: EntitlementSet,
    pub added: EntitlementSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergeReport {
    pub plan: EntitlementPlan,
    pub applied: ApplyReport,
    /// Entitlements after applying; read back from the service when
    /// `verified`, otherwise derived from the confirmed deltas
    pub observed: EntitlementSet,
    pub verified: bool,
    pub converged: bool,
}

/// A batch stopped part way. Everything in `removed` and `added` was
/// confirmed by the service; nothing else should be assumed applied.
#[derive(Debug, Error)]
#[error(
    "entitlements of pool {pool_id} partially converged, {phase} failed ({}); removed {removed}, added {added}, not attempted {not_attempted}",
    describe_failure(.cause, .failed)
)]
pub struct PartialConvergence {
    pub pool_id: String,
    pub phase: Phase,
    pub removed: EntitlementSet,
    pub added: EntitlementSet,
    /// Identities of the failing batch that were not confirmed, with the reason
    pub failed: BTreeMap<String, String>,
    /// Additions never sent because an earlier step failed
    pub not_attempted: EntitlementSet,
    /// Error of the failing call; `None` when the call went through but the
    /// service refused individual identities
    #[source]
    pub cause: Option<Box<Error>>,
}

fn describe_failure(cause: &Option<Box<Error>>, failed: &BTreeMap<String, String>) -> String {
    match cause {
        Some(cause) => cause.to_string(),
        None => {
            let rejected: Vec<String> = failed
                .iter()
                .map(|(identity, reason)| format!("{identity}: {reason}"))
                .collect();
            format!("rejected {}", rejected.join(", "))
        }
    }
}

impl PartialConvergence {
    /// What the service holds now, given what it held before the attempt
    pub fn believed_current(&self, previous: &EntitlementSet) -> EntitlementSet {
        previous.difference(&self.removed).union(&self.added)
    }
}

/// Applies entitlement plans against an inventory service
#[derive(Clone)]
pub struct EntitlementReconciler {
    inventory: Arc<dyn InventoryService>,
}

impl EntitlementReconciler {
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self { inventory }
    }

    pub async fn current(&self, pool_id: &str, cancel: &CancelSignal) -> Result<EntitlementSet> {
        cancel.run(self.inventory.get_entitlements(pool_id)).await
    }

    /// Fetch the current set and compute the plan, without applying it
    pub async fn plan(
        &self,
        pool_id: &str,
        desired: &EntitlementSet,
        cancel: &CancelSignal,
    ) -> Result<EntitlementPlan> {
        let current = self.current(pool_id, cancel).await?;
        Ok(reconcile(pool_id, &current, desired))
    }

    /// Apply removals, then additions. Empty batches are skipped and the
    /// additions are never sent once the removals have failed.
    pub async fn apply(&self, plan: &EntitlementPlan, cancel: &CancelSignal) -> Result<ApplyReport> {
        let pool_id = plan.pool_id.as_str();
        let mut report = ApplyReport {
            pool_id: plan.pool_id.clone(),
            ..Default::default()
        };

        if !plan.to_remove.is_empty() {
            let outcome = cancel
                .run(self.inventory.bulk_remove_entitlements(pool_id, &plan.to_remove))
                .await?;
            report.removed = outcome.applied;
            tracing::info!(pool = %pool_id, removed = report.removed.len(), "removed entitlements");

            if !outcome.rejected.is_empty() {
                tracing::warn!(pool = %pool_id, rejected = outcome.rejected.len(), "removal batch partially rejected");
                return Err(PartialConvergence {
                    pool_id: plan.pool_id.clone(),
                    phase: Phase::Removal,
                    removed: report.removed,
                    added: EntitlementSet::new(),
                    failed: outcome.rejected,
                    not_attempted: plan.to_add.clone(),
                    cause: None,
                }
                .into());
            }
        }

        if plan.to_add.is_empty() {
            return Ok(report);
        }

        let cancelled_before = cancel.is_cancelled();
        match cancel
            .run(self.inventory.bulk_add_entitlements(pool_id, &plan.to_add))
            .await
        {
            Ok(outcome) => {
                report.added = outcome.applied;
                tracing::info!(pool = %pool_id, added = report.added.len(), "added entitlements");

                if outcome.rejected.is_empty() {
                    return Ok(report);
                }
                tracing::warn!(pool = %pool_id, rejected = outcome.rejected.len(), "addition batch partially rejected");
                Err(PartialConvergence {
                    pool_id: plan.pool_id.clone(),
                    phase: Phase::Addition,
                    removed: report.removed,
                    added: report.added,
                    failed: outcome.rejected,
                    not_attempted: EntitlementSet::new(),
                    cause: None,
                }
                .into())
            }
            // nothing confirmed yet, so nothing to account for
            Err(err) if report.removed.is_empty() => Err(err),
            Err(err) => {
                tracing::warn!(pool = %pool_id, error = %err, "addition batch failed after removals");
                let (failed, not_attempted) = if cancelled_before {
                    (BTreeMap::new(), plan.to_add.clone())
                } else {
                    let reason = err.to_string();
                    let failed = plan
                        .to_add
                        .iter()
                        .map(|identity| (identity.to_string(), reason.clone()))
                        .collect();
                    (failed, EntitlementSet::new())
                };
                Err(PartialConvergence {
                    pool_id: plan.pool_id.clone(),
                    phase: Phase::Addition,
                    removed: report.removed,
                    added: EntitlementSet::new(),
                    failed,
                    not_attempted,
                    cause: Some(Box::new(err)),
                }
                .into())
            }
        }
    }

    /// Fetch, plan, apply and read back
    pub async fn converge(
        &self,
        pool_id: &str,
        desired: &EntitlementSet,
        cancel: &CancelSignal,
    ) -> Result<ConvergeReport> {
        let current = self.current(pool_id, cancel).await?;
        let plan = reconcile(pool_id, &current, desired);
        tracing::info!(
            pool = %pool_id,
            add = plan.to_add.len(),
            remove = plan.to_remove.len(),
            "entitlement plan"
        );

        if plan.is_empty() {
            return Ok(ConvergeReport {
                applied: ApplyReport {
                    pool_id: pool_id.to_string(),
                    ..Default::default()
                },
                plan,
                observed: current,
                verified: true,
                converged: true,
            });
        }

        let applied = self.apply(&plan, cancel).await?;
        let (observed, verified) = match self.current(pool_id, cancel).await {
            Ok(observed) => (observed, true),
            Err(err) => {
                tracing::warn!(pool = %pool_id, error = %err, "could not read entitlements back");
                let believed = current.difference(&applied.removed).union(&applied.added);
                (believed, false)
            }
        };

        Ok(ConvergeReport {
            converged: &observed == desired,
            plan,
            applied,
            observed,
            verified,
        })
    }

    /// Converge to no entitlements at all
    pub async fn clear(&self, pool_id: &str, cancel: &CancelSignal) -> Result<ConvergeReport> {
        self.converge(pool_id, &EntitlementSet::new(), cancel).await
    }
}
