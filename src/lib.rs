//! Horizon Desktop Pool Reconciler
//!
//! Converges a VMware Horizon inventory to a declared set of automated
//! desktop pools and the identities entitled to use them.
//!
//! # Key Features
//!
//! - **Validated before sent** - every cross-field rule is checked up front
//!   and all violations are reported together
//! - **Minimal entitlement deltas** - removals before additions, with exact
//!   accounting when a batch fails part way
//! - **Pluggable inventory** - REST client for Horizon, in-memory service for
//!   dry runs and tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use horizon_pools::{CancelSignal, DesktopPoolSpec, InMemoryInventory, Orchestrator};
//!
//! # async fn run() -> horizon_pools::Result<()> {
//! let orchestrator = Orchestrator::new(Arc::new(InMemoryInventory::new()));
//! let spec = DesktopPoolSpec::load("pools/engineering.json")?;
//!
//! let cancel = CancelSignal::never();
//! let state = orchestrator.create_pool(&spec, &cancel).await?;
//!
//! let desired = ["S-1-5-21-1004"].into_iter().collect();
//! orchestrator.reconcile_entitlements(&state.id, &desired, &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cancel;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod inventory;
pub mod models;
pub mod orchestrator;
pub mod projector;
pub mod validate;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::ProviderConfig;
pub use entitlements::{EntitlementPlan, EntitlementReconciler, PartialConvergence};
pub use error::{Error, Result};
pub use inventory::{HorizonClient, InMemoryInventory, InventoryService};
pub use models::{DesktopPoolSpec, EntitlementSet, PoolState};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use validate::{validate, ValidPoolSpec, Violation, Violations};
