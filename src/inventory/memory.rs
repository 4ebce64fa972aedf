//! Process-local inventory for dry runs and tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::InventoryService;
use crate::models::{
    BulkOutcome, CreatedPool, EntitlementSet, RemoteCreateRequest, RemotePool,
    RemoteUpdateRequest, SessionType,
};
use crate::{Error, Result};

/// One call as it reached the inventory, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCall {
    CreatePool(String),
    GetPool(String),
    UpdatePool(String),
    DeletePool(String),
    GetEntitlements(String),
    BulkAdd(String, EntitlementSet),
    BulkRemove(String, EntitlementSet),
}

#[derive(Debug, Clone)]
struct StoredPool {
    pool: RemotePool,
    entitlements: EntitlementSet,
}

/// Inventory service backed by shared in-process maps.
///
/// Clones share state. Applies the same server-side defaults as Horizon for
/// display name, enablement and session type.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    pools: Arc<RwLock<HashMap<String, StoredPool>>>,
    rejected: Arc<RwLock<BTreeMap<String, String>>>,
    calls: Arc<RwLock<Vec<InventoryCall>>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every future add or remove of `identity` with `reason`
    pub fn reject_identity(&self, identity: impl Into<String>, reason: impl Into<String>) {
        self.rejected.write().insert(identity.into(), reason.into());
    }

    pub fn accept_identity(&self, identity: &str) {
        self.rejected.write().remove(identity);
    }

    /// Replace a pool's entitlements directly, as an out-of-band change would
    pub fn set_entitlements(&self, pool_id: &str, entitlements: EntitlementSet) -> Result<()> {
        let mut pools = self.pools.write();
        let stored = pools
            .get_mut(pool_id)
            .ok_or_else(|| Error::NotFound(format!("desktop pool {pool_id}")))?;
        stored.entitlements = entitlements;
        Ok(())
    }

    /// Edit a stored pool directly, as an out-of-band change would
    pub fn modify_pool<F>(&self, pool_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut RemotePool),
    {
        let mut pools = self.pools.write();
        let stored = pools
            .get_mut(pool_id)
            .ok_or_else(|| Error::NotFound(format!("desktop pool {pool_id}")))?;
        f(&mut stored.pool);
        Ok(())
    }

    pub fn pool_count(&self) -> usize {
        self.pools.read().len()
    }

    pub fn calls(&self) -> Vec<InventoryCall> {
        self.calls.read().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    fn record(&self, call: InventoryCall) {
        self.calls.write().push(call);
    }

    fn bulk<F>(&self, pool_id: &str, refs: &EntitlementSet, mut apply: F) -> Result<BulkOutcome>
    where
        F: FnMut(&mut EntitlementSet, &str),
    {
        let rejected = self.rejected.read();
        let mut pools = self.pools.write();
        let stored = pools
            .get_mut(pool_id)
            .ok_or_else(|| Error::NotFound(format!("desktop pool {pool_id}")))?;

        let mut outcome = BulkOutcome::default();
        for identity in refs.iter() {
            match rejected.get(identity) {
                Some(reason) => {
                    outcome.rejected.insert(identity.to_string(), reason.clone());
                }
                None => {
                    apply(&mut stored.entitlements, identity);
                    outcome.applied.insert(identity);
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn create_pool(&self, request: &RemoteCreateRequest) -> Result<CreatedPool> {
        self.record(InventoryCall::CreatePool(request.name.clone()));

        let mut pools = self.pools.write();
        if pools.values().any(|p| p.pool.name == request.name) {
            return Err(Error::rejection(
                409,
                format!("a desktop pool named {} already exists", request.name),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut pool = RemotePool::from_request(&id, request);
        pool.display_name.get_or_insert_with(|| request.name.clone());
        pool.enabled.get_or_insert(true);
        pool.session_type.get_or_insert(SessionType::Desktop);
        pool.delete_in_progress = Some(false);
        pool.image_source = Some(request.source.to_string());

        pools.insert(
            id.clone(),
            StoredPool {
                pool,
                entitlements: EntitlementSet::new(),
            },
        );
        tracing::debug!(pool = %request.name, id = %id, "stored desktop pool");
        Ok(CreatedPool { id })
    }

    async fn get_pool(&self, id: &str) -> Result<RemotePool> {
        self.record(InventoryCall::GetPool(id.to_string()));

        let pools = self.pools.read();
        let stored = pools
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("desktop pool {id}")))?;
        let mut pool = stored.pool.clone();
        pool.user_group_count = i32::try_from(stored.entitlements.len()).ok();
        Ok(pool)
    }

    async fn update_pool(&self, id: &str, request: &RemoteUpdateRequest) -> Result<()> {
        self.record(InventoryCall::UpdatePool(id.to_string()));

        let mut pools = self.pools.write();
        let stored = pools
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("desktop pool {id}")))?;
        stored.pool.apply_update(request);
        Ok(())
    }

    async fn delete_pool(&self, id: &str) -> Result<()> {
        self.record(InventoryCall::DeletePool(id.to_string()));

        match self.pools.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("desktop pool {id}"))),
        }
    }

    async fn get_entitlements(&self, pool_id: &str) -> Result<EntitlementSet> {
        self.record(InventoryCall::GetEntitlements(pool_id.to_string()));

        self.pools
            .read()
            .get(pool_id)
            .map(|stored| stored.entitlements.clone())
            .ok_or_else(|| Error::NotFound(format!("desktop pool {pool_id}")))
    }

    async fn bulk_add_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome> {
        self.record(InventoryCall::BulkAdd(pool_id.to_string(), refs.clone()));
        self.bulk(pool_id, refs, |set, identity| {
            set.insert(identity);
        })
    }

    async fn bulk_remove_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome> {
        self.record(InventoryCall::BulkRemove(pool_id.to_string(), refs.clone()));
        self.bulk(pool_id, refs, |set, identity| {
            set.remove(identity);
        })
    }
}
