//! The remote inventory service the reconciler converges
//!
//! Everything above this module talks to an `Arc<dyn InventoryService>`.
//! [`HorizonClient`] speaks the Horizon REST API; [`InMemoryInventory`] keeps
//! pools in process for dry runs and tests.

mod memory;
mod rest;

pub use memory::{InMemoryInventory, InventoryCall};
pub use rest::HorizonClient;

use async_trait::async_trait;

use crate::models::{
    BulkOutcome, CreatedPool, EntitlementSet, RemoteCreateRequest, RemotePool,
    RemoteUpdateRequest,
};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn create_pool(&self, request: &RemoteCreateRequest) -> Result<CreatedPool>;

    /// Fails with [`crate::Error::NotFound`] for an unknown id
    async fn get_pool(&self, id: &str) -> Result<RemotePool>;

    async fn update_pool(&self, id: &str, request: &RemoteUpdateRequest) -> Result<()>;

    /// May report [`crate::Error::NotFound`]; callers decide whether that matters
    async fn delete_pool(&self, id: &str) -> Result<()>;

    async fn get_entitlements(&self, pool_id: &str) -> Result<EntitlementSet>;

    /// Entitle every identity in `refs`. An `Ok` may still carry
    /// per-identity rejections.
    async fn bulk_add_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome>;

    async fn bulk_remove_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome>;
}
