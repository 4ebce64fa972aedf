//! Declared desktop pool model

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Pool classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolType {
    #[default]
    Automated,
    Manual,
    Rds,
}

/// Where the machines of the pool come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    /// Machines forked from a parent VM snapshot
    InstantClone,
    /// Full clones of a vCenter template
    VirtualCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NamingMethod {
    Specified,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAssignment {
    /// A user returns to the same machine at each session
    Dedicated,
    /// A user may land on any available machine
    Floating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningTime {
    #[default]
    UpFront,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Desktop,
    Application,
    DesktopAndApplication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortcutLocation {
    StartMenu,
    Desktop,
}

/// Level at which ESXi shares identical memory pages between machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageSharingScope {
    Vm,
    DesktopPool,
    Pod,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayProtocol {
    Rdp,
    Pcoip,
    Blast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorResolution {
    WsxgaPlus,
    Wuxga,
    Wqxga,
    Uhd,
    #[serde(rename = "UHD_5K")]
    Uhd5k,
    #[serde(rename = "UHD_8K")]
    Uhd8k,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Renderer3d {
    ManageByVsphereClient,
    Automatic,
    Software,
    Hardware,
    Disabled,
}

impl Renderer3d {
    /// Renderers that reserve video memory on the machine
    pub fn uses_vram(&self) -> bool {
        matches!(self, Self::Automatic | Self::Software | Self::Hardware)
    }
}

macro_rules! wire_name {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Name as sent on the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_name!(PoolType { Automated => "AUTOMATED", Manual => "MANUAL", Rds => "RDS" });
wire_name!(Source { InstantClone => "INSTANT_CLONE", VirtualCenter => "VIRTUAL_CENTER" });
wire_name!(NamingMethod { Specified => "SPECIFIED", Pattern => "PATTERN" });
wire_name!(UserAssignment { Dedicated => "DEDICATED", Floating => "FLOATING" });
wire_name!(ProvisioningTime { UpFront => "UP_FRONT", OnDemand => "ON_DEMAND" });
wire_name!(DisplayProtocol { Rdp => "RDP", Pcoip => "PCOIP", Blast => "BLAST" });
wire_name!(Renderer3d {
    ManageByVsphereClient => "MANAGE_BY_VSPHERE_CLIENT",
    Automatic => "AUTOMATIC",
    Software => "SOFTWARE",
    Hardware => "HARDWARE",
    Disabled => "DISABLED",
});

/// Declared configuration of an automated desktop pool.
///
/// Optional fields left as `None` are not sent to the inventory service, which
/// then applies its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesktopPoolSpec {
    pub name: String,
    pub access_group_id: String,
    #[serde(default)]
    pub pool_type: PoolType,
    pub source: Source,
    pub naming_method: NamingMethod,
    pub user_assignment: UserAssignment,
    pub vcenter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_provisioning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_provisioning_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_folder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_locations: Option<BTreeSet<ShortcutLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_managed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_assigned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_user_assignment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_multiple_user_assignments: Option<bool>,
    /// Dedicated pools only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_assigned_machine_name: Option<bool>,
    /// Dedicated pools only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_machine_alias: Option<bool>,
    /// Connection server restriction tags. Unset means every server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs_restriction_tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_client_restrictions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_page_sharing_scope: Option<PageSharingScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_naming_settings: Option<PatternNamingSettings>,
    pub provisioning_settings: ProvisioningSettings,
    /// Instant clone only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_prep_settings: Option<ClonePrepSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_protocol_settings: Option<DisplayProtocolSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_settings: Option<StorageSettings>,
}

/// ClonePrep guest customization of instant clones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClonePrepSettings {
    /// Instant clone engine domain account used to join machines
    pub instant_clone_domain_account_id: String,
    /// e.g. `OU=Desktops,OU=Engineering`
    pub ad_container_rdn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_pre_existing_accounts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priming_computer_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_synchronization_script_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_synchronization_script_parameters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_off_script_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_off_script_parameters: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayProtocolSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_users_to_choose_protocol: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_display_protocol: Option<DisplayProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_vgpus_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_monitors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resolution_of_any_one_monitor: Option<MonitorResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer_3d: Option<Renderer3d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_collaboration_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vram_size_mb: Option<u32>,
}

/// Virtual center placement of the pool's machines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningSettings {
    pub host_or_cluster_id: String,
    pub resource_pool_id: String,
    pub vm_folder_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_virtual_tpm: Option<bool>,
    /// Instant clone only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_vm_id: Option<String>,
    /// Instant clone only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot_id: Option<String>,
    /// Full clone only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_template_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternNamingSettings {
    /// e.g. `vm-{n:fixed=3}-sales`
    pub naming_pattern: String,
    #[serde(default)]
    pub provisioning_time: ProvisioningTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_machines: Option<u32>,
    /// Only meaningful with `ON_DEMAND` provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_number_of_machines: Option<u32>,
    /// Only meaningful with `ON_DEMAND` provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_spare_machines: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    pub datastores: Vec<Datastore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_vm_disk_space: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclamation_threshold_mb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_separate_datastores_replica_and_os_disks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_disk_datastore_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_vsan: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Datastore {
    pub datastore_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdrs_cluster: Option<bool>,
}

/// The two user-assignment flags, viewed together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentPolicy {
    pub automatic_user_assignment: Option<bool>,
    pub allow_multiple_user_assignments: Option<bool>,
}

impl AssignmentPolicy {
    pub fn is_unset(&self) -> bool {
        self.automatic_user_assignment.is_none() && self.allow_multiple_user_assignments.is_none()
    }

    pub fn both_enabled(&self) -> bool {
        self.automatic_user_assignment == Some(true)
            && self.allow_multiple_user_assignments == Some(true)
    }
}

/// Source-dependent half of the provisioning settings, resolved by validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneSource {
    InstantClone {
        parent_vm_id: String,
        base_snapshot_id: String,
    },
    FullClone {
        vm_template_id: String,
    },
}

/// Read-only attributes the inventory service computes for a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub delete_in_progress: Option<bool>,
    pub image_source: Option<String>,
    pub user_group_count: Option<u32>,
}

/// A pool as last observed on the inventory service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub id: String,
    pub spec: DesktopPoolSpec,
    pub status: PoolStatus,
}

impl DesktopPoolSpec {
    /// Load a pool declaration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn assignment(&self) -> AssignmentPolicy {
        AssignmentPolicy {
            automatic_user_assignment: self.automatic_user_assignment,
            allow_multiple_user_assignments: self.allow_multiple_user_assignments,
        }
    }
}
