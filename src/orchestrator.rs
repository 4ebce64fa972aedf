//! Orchestrator driving pool lifecycle and entitlement convergence

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::builder;
use crate::cancel::CancelSignal;
use crate::entitlements::{ConvergeReport, EntitlementPlan, EntitlementReconciler};
use crate::inventory::InventoryService;
use crate::models::{DesktopPoolSpec, EntitlementSet, PoolState};
use crate::projector;
use crate::validate::validate;
use crate::{Error, Result};

/// Result of an update: the pool as read back, and what had to change
#[derive(Debug, Clone, Serialize)]
pub struct PoolUpdate {
    pub state: PoolState,
    pub changed: Vec<&'static str>,
}

/// Converges declared pools and entitlements against one inventory service
pub struct Orchestrator {
    inventory: Arc<dyn InventoryService>,
    entitlements: EntitlementReconciler,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self::with_config(inventory, OrchestratorConfig::default())
    }

    pub fn with_config(inventory: Arc<dyn InventoryService>, config: OrchestratorConfig) -> Self {
        Self {
            entitlements: EntitlementReconciler::new(Arc::clone(&inventory)),
            inventory,
            config,
        }
    }

    /// The caller's signal, bounded by the default call timeout unless it
    /// already carries one
    fn signal(&self, cancel: &CancelSignal) -> CancelSignal {
        match (cancel.timeout(), self.config.call_timeout) {
            (None, Some(limit)) => cancel.clone().with_timeout(limit),
            _ => cancel.clone(),
        }
    }

    /// Validate, create, then read the pool back.
    ///
    /// An invalid declaration never reaches the service. If the read-back
    /// fails the error still carries the id the service assigned.
    pub async fn create_pool(&self, spec: &DesktopPoolSpec, cancel: &CancelSignal) -> Result<PoolState> {
        let valid = validate(spec)?;
        let request = builder::build(&valid);
        let cancel = self.signal(cancel);

        let created = cancel.run(self.inventory.create_pool(&request)).await?;
        tracing::info!(pool = %spec.name, id = %created.id, "created desktop pool");

        self.read_pool(&created.id, &cancel)
            .await
            .map_err(|source| Error::ReadBack {
                id: created.id.clone(),
                source: Box::new(source),
            })
    }

    pub async fn read_pool(&self, id: &str, cancel: &CancelSignal) -> Result<PoolState> {
        let remote = self.signal(cancel).run(self.inventory.get_pool(id)).await?;
        Ok(projector::state(&remote))
    }

    /// Bring an existing pool in line with `spec`.
    ///
    /// Changes to fields fixed at creation fail with
    /// [`Error::RequiresReplacement`] before anything is sent. No update is
    /// sent when nothing has drifted.
    pub async fn update_pool(
        &self,
        id: &str,
        spec: &DesktopPoolSpec,
        cancel: &CancelSignal,
    ) -> Result<PoolUpdate> {
        let valid = validate(spec)?;
        let cancel = self.signal(cancel);
        let current = self.read_pool(id, &cancel).await?;

        let immutable = projector::immutable_changes(&current.spec, spec);
        if !immutable.is_empty() {
            tracing::warn!(pool = %spec.name, id = %id, fields = ?immutable, "pool requires replacement");
            return Err(Error::RequiresReplacement(immutable));
        }

        let changed = projector::drift(spec, &current.spec);
        if changed.is_empty() {
            tracing::info!(pool = %spec.name, id = %id, "desktop pool already converged");
            return Ok(PoolUpdate {
                state: current,
                changed,
            });
        }

        tracing::info!(pool = %spec.name, id = %id, fields = ?changed, "updating desktop pool");
        let request = builder::build_update(&valid);
        cancel.run(self.inventory.update_pool(id, &request)).await?;

        let state = self
            .read_pool(id, &cancel)
            .await
            .map_err(|source| Error::ReadBack {
                id: id.to_string(),
                source: Box::new(source),
            })?;
        Ok(PoolUpdate { state, changed })
    }

    /// Delete a pool. A pool that is already gone counts as deleted.
    pub async fn delete_pool(&self, id: &str, cancel: &CancelSignal) -> Result<()> {
        match self.signal(cancel).run(self.inventory.delete_pool(id)).await {
            Ok(()) => {
                tracing::info!(id = %id, "deleted desktop pool");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(id = %id, "desktop pool already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn read_entitlements(&self, pool_id: &str, cancel: &CancelSignal) -> Result<EntitlementSet> {
        self.entitlements.current(pool_id, &self.signal(cancel)).await
    }

    pub async fn plan_entitlements(
        &self,
        pool_id: &str,
        desired: &EntitlementSet,
        cancel: &CancelSignal,
    ) -> Result<EntitlementPlan> {
        self.entitlements
            .plan(pool_id, desired, &self.signal(cancel))
            .await
    }

    pub async fn reconcile_entitlements(
        &self,
        pool_id: &str,
        desired: &EntitlementSet,
        cancel: &CancelSignal,
    ) -> Result<ConvergeReport> {
        self.entitlements
            .converge(pool_id, desired, &self.signal(cancel))
            .await
    }

    pub async fn clear_entitlements(&self, pool_id: &str, cancel: &CancelSignal) -> Result<ConvergeReport> {
        self.entitlements.clear(pool_id, &self.signal(cancel)).await
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Applied to every remote call unless the caller's signal sets its own
    pub call_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InMemoryInventory, InventoryCall, MockInventoryService};
    use crate::models::{fixtures, CreatedPool};

    fn test_orchestrator() -> (Orchestrator, InMemoryInventory) {
        let inventory = InMemoryInventory::new();
        let orch = Orchestrator::new(Arc::new(inventory.clone()));
        (orch, inventory)
    }

    fn never() -> CancelSignal {
        CancelSignal::never()
    }

    #[tokio::test]
    async fn test_create_pool() {
        let (orch, inventory) = test_orchestrator();
        let spec = fixtures::instant_clone();

        let state = orch.create_pool(&spec, &never()).await.unwrap();

        assert_eq!(state.spec.name, "eng-desktops");
        assert_eq!(state.spec.display_name.as_deref(), Some("eng-desktops"));
        assert!(projector::drift(&spec, &state.spec).is_empty());
        assert_eq!(state.status.user_group_count, Some(0));
        assert_eq!(inventory.pool_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_makes_no_calls() {
        let (orch, inventory) = test_orchestrator();
        let mut spec = fixtures::instant_clone();
        spec.automatic_user_assignment = Some(true);

        let err = orch.create_pool(&spec, &never()).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(inventory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_back_failure_keeps_id() {
        let mut mock = MockInventoryService::new();
        mock.expect_create_pool().times(1).returning(|_| {
            Ok(CreatedPool {
                id: "pool-42".into(),
            })
        });
        mock.expect_get_pool()
            .times(1)
            .returning(|_| Err(Error::Transport("connection reset".into())));

        let orch = Orchestrator::new(Arc::new(mock));
        let err = orch
            .create_pool(&fixtures::full_clone(), &never())
            .await
            .unwrap_err();

        match err {
            Error::ReadBack { id, source } => {
                assert_eq!(id, "pool-42");
                assert!(matches!(*source, Error::Transport(_)));
            }
            other => panic!("expected read-back error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_rejects_immutable_change() {
        let (orch, inventory) = test_orchestrator();
        let mut spec = fixtures::instant_clone();
        let id = orch.create_pool(&spec, &never()).await.unwrap().id;
        inventory.clear_calls();

        spec.vcenter_id = "vc-2".into();
        let err = orch.update_pool(&id, &spec, &never()).await.unwrap_err();

        assert!(matches!(&err, Error::RequiresReplacement(fields) if fields == &vec!["vcenter_id"]));
        assert_eq!(inventory.calls(), vec![InventoryCall::GetPool(id)]);
    }

    #[tokio::test]
    async fn test_update_without_drift_sends_nothing() {
        let (orch, inventory) = test_orchestrator();
        let spec = fixtures::instant_clone();
        let id = orch.create_pool(&spec, &never()).await.unwrap().id;
        inventory.clear_calls();

        let update = orch.update_pool(&id, &spec, &never()).await.unwrap();

        assert!(update.changed.is_empty());
        assert!(!inventory
            .calls()
            .iter()
            .any(|c| matches!(c, InventoryCall::UpdatePool(_))));
    }

    #[tokio::test]
    async fn test_update_tolerates_unreported_virtual_tpm() {
        let (orch, inventory) = test_orchestrator();
        let mut spec = fixtures::instant_clone();
        spec.provisioning_settings.add_virtual_tpm = Some(false);
        let id = orch.create_pool(&spec, &never()).await.unwrap().id;

        inventory
            .modify_pool(&id, |pool| pool.provisioning_settings.add_virtual_tpm = None)
            .unwrap();
        inventory.clear_calls();

        let update = orch.update_pool(&id, &spec, &never()).await.unwrap();
        assert!(update.changed.is_empty());
        assert!(!inventory
            .calls()
            .iter()
            .any(|c| matches!(c, InventoryCall::UpdatePool(_))));
    }

    #[tokio::test]
    async fn test_update_applies_drift() {
        let (orch, _inventory) = test_orchestrator();
        let mut spec = fixtures::instant_clone();
        let id = orch.create_pool(&spec, &never()).await.unwrap().id;

        spec.description = Some("moved to the new cluster".into());
        spec.provisioning_settings.host_or_cluster_id = "cluster-8".into();
        let update = orch.update_pool(&id, &spec, &never()).await.unwrap();

        assert_eq!(
            update.changed,
            vec!["description", "provisioning_settings.host_or_cluster_id"]
        );
        assert_eq!(
            update.state.spec.provisioning_settings.host_or_cluster_id,
            "cluster-8"
        );
        assert!(projector::drift(&spec, &update.state.spec).is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_pool_succeeds() {
        let (orch, inventory) = test_orchestrator();
        let id = orch
            .create_pool(&fixtures::full_clone(), &never())
            .await
            .unwrap()
            .id;

        orch.delete_pool(&id, &never()).await.unwrap();
        orch.delete_pool(&id, &never()).await.unwrap();
        assert_eq!(inventory.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_entitlements_converge_and_clear() {
        let (orch, _inventory) = test_orchestrator();
        let id = orch
            .create_pool(&fixtures::full_clone(), &never())
            .await
            .unwrap()
            .id;

        let desired: EntitlementSet = ["SID-1", "SID-2"].into_iter().collect();
        let report = orch.reconcile_entitlements(&id, &desired, &never()).await.unwrap();
        assert!(report.converged);
        assert_eq!(orch.read_entitlements(&id, &never()).await.unwrap(), desired);

        let plan = orch.plan_entitlements(&id, &desired, &never()).await.unwrap();
        assert!(plan.is_empty());

        let report = orch.clear_entitlements(&id, &never()).await.unwrap();
        assert_eq!(report.applied.removed, desired);
        assert!(orch.read_entitlements(&id, &never()).await.unwrap().is_empty());
    }

    #[test]
    fn test_default_timeout_applies_only_when_unset() {
        let orch = Orchestrator::new(Arc::new(InMemoryInventory::new()));
        assert_eq!(
            orch.signal(&never()).timeout(),
            Some(Duration::from_secs(60))
        );

        let own = never().with_timeout(Duration::from_secs(5));
        assert_eq!(orch.signal(&own).timeout(), Some(Duration::from_secs(5)));

        let orch = Orchestrator::with_config(
            Arc::new(InMemoryInventory::new()),
            OrchestratorConfig::new().call_timeout(None),
        );
        assert_eq!(orch.signal(&never()).timeout(), None);
    }
}
