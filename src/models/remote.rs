//! Request and entity shapes exchanged with the inventory service

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entitlement::EntitlementSet;
use super::pool::{
    DisplayProtocol, MonitorResolution, NamingMethod, PageSharingScope, PoolType,
    ProvisioningTime, Renderer3d, SessionType, ShortcutLocation, Source, UserAssignment,
};

/// Body of a create-pool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCreateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub source: Source,
    pub naming_method: NamingMethod,
    pub user_assignment: UserAssignment,
    pub vcenter_id: String,
    #[serde(flatten)]
    pub settings: RemoteMutableSettings,
    pub provisioning_settings: RemoteProvisioningSettings,
}

/// Body of an update-pool call.
///
/// Carries no name, source, naming method, user assignment, vCenter, VM
/// folder or virtual TPM: the service fixes those at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUpdateRequest {
    #[serde(flatten)]
    pub settings: RemoteMutableSettings,
    pub provisioning_settings: RemoteProvisioningUpdate,
}

/// Attributes accepted both at create and on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteMutableSettings {
    pub access_group_id: String,
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
    pub shortcut_locations_v2: Option<Vec<ShortcutLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_managed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_assigned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_user_assignment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_multiple_user_assignments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_assigned_machine_name: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_machine_alias: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs_restriction_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_client_restrictions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_page_sharing_scope: Option<PageSharingScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_naming_settings: Option<RemotePatternNaming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_settings: Option<RemoteStorageSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_settings: Option<RemoteCustomizationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_protocol_settings: Option<RemoteDisplayProtocolSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePatternNaming {
    pub naming_pattern: String,
    pub provisioning_time: ProvisioningTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_machines: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_number_of_machines: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_spare_machines: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProvisioningSettings {
    pub host_or_cluster_id: String,
    pub resource_pool_id: String,
    pub vm_folder_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_virtual_tpm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_template_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProvisioningUpdate {
    pub host_or_cluster_id: String,
    pub resource_pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_template_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStorageSettings {
    pub datastores: Vec<RemoteDatastore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_vm_disk_space: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclamation_threshold_mb: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_separate_datastores_replica_and_os_disks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_disk_datastore_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_vsan: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDatastore {
    pub datastore_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdrs_cluster: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomizationType {
    ClonePrep,
    QuickPrep,
    SysPrep,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCustomizationSettings {
    pub customization_type: CustomizationType,
    #[serde(default)]
    pub ad_container_rdn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_pre_existing_accounts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloneprep_customization_settings: Option<RemoteClonePrepSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteClonePrepSettings {
    pub instant_clone_domain_account_id: String,
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
pub struct RemoteDisplayProtocolSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_users_to_choose_protocol: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_display_protocol: Option<DisplayProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_vgpus_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_monitors: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resolution_of_any_one_monitor: Option<MonitorResolution>,
    #[serde(rename = "renderer3d", default, skip_serializing_if = "Option::is_none")]
    pub renderer_3d: Option<Renderer3d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_collaboration_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vram_size_mb: Option<i32>,
}

/// Identifier the service assigns on create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPool {
    pub id: String,
}

/// A pool as reported by the inventory service.
///
/// Identity fields and the provisioning block are required, since every
/// projection needs them. Everything else may be missing from a response and
/// stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePool {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub access_group_id: String,
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
    pub shortcut_locations_v2: Option<Vec<ShortcutLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_managed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_assigned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_user_assignment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_multiple_user_assignments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_assigned_machine_name: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_machine_alias: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs_restriction_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_client_restrictions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_page_sharing_scope: Option<PageSharingScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_naming_settings: Option<RemotePatternNaming>,
    pub provisioning_settings: RemoteProvisioningSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_settings: Option<RemoteStorageSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_settings: Option<RemoteCustomizationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_protocol_settings: Option<RemoteDisplayProtocolSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_in_progress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_group_count: Option<i32>,
}

impl RemotePool {
    /// The entity a service stores for `request` under `id`, before any
    /// server-side defaults are applied
    pub fn from_request(id: impl Into<String>, request: &RemoteCreateRequest) -> Self {
        let settings = &request.settings;
        Self {
            id: id.into(),
            name: request.name.clone(),
            pool_type: request.pool_type,
            access_group_id: settings.access_group_id.clone(),
            source: request.source,
            naming_method: request.naming_method,
            user_assignment: request.user_assignment,
            vcenter_id: request.vcenter_id.clone(),
            display_name: settings.display_name.clone(),
            description: settings.description.clone(),
            enabled: settings.enabled,
            enable_provisioning: settings.enable_provisioning,
            stop_provisioning_on_error: settings.stop_provisioning_on_error,
            session_type: settings.session_type,
            category_folder_name: settings.category_folder_name.clone(),
            shortcut_locations_v2: settings.shortcut_locations_v2.clone(),
            cloud_managed: settings.cloud_managed,
            cloud_assigned: settings.cloud_assigned,
            automatic_user_assignment: settings.automatic_user_assignment,
            allow_multiple_user_assignments: settings.allow_multiple_user_assignments,
            display_assigned_machine_name: settings.display_assigned_machine_name,
            display_machine_alias: settings.display_machine_alias,
            cs_restriction_tags: settings.cs_restriction_tags.clone(),
            enable_client_restrictions: settings.enable_client_restrictions,
            transparent_page_sharing_scope: settings.transparent_page_sharing_scope,
            pattern_naming_settings: settings.pattern_naming_settings.clone(),
            provisioning_settings: request.provisioning_settings.clone(),
            storage_settings: settings.storage_settings.clone(),
            customization_settings: settings.customization_settings.clone(),
            display_protocol_settings: settings.display_protocol_settings.clone(),
            delete_in_progress: None,
            image_source: None,
            user_group_count: None,
        }
    }

    /// Overwrite the mutable attributes with those of `update`. Fields the
    /// update leaves unset keep their stored value.
    pub fn apply_update(&mut self, update: &RemoteUpdateRequest) {
        let settings = &update.settings;
        self.access_group_id = settings.access_group_id.clone();

        macro_rules! merge {
            ($target:expr, $source:expr; $($field:ident),+ $(,)?) => {
                $(if $source.$field.is_some() {
                    $target.$field = $source.$field.clone();
                })+
            };
        }
        merge!(
            self, settings;
            display_name,
            description,
            enabled,
            enable_provisioning,
            stop_provisioning_on_error,
            session_type,
            category_folder_name,
            shortcut_locations_v2,
            cloud_managed,
            cloud_assigned,
            automatic_user_assignment,
            allow_multiple_user_assignments,
            display_assigned_machine_name,
            display_machine_alias,
            cs_restriction_tags,
            enable_client_restrictions,
            transparent_page_sharing_scope,
            pattern_naming_settings,
            storage_settings,
            customization_settings,
            display_protocol_settings,
        );

        let incoming = &update.provisioning_settings;
        let stored = &mut self.provisioning_settings;
        stored.host_or_cluster_id = incoming.host_or_cluster_id.clone();
        stored.resource_pool_id = incoming.resource_pool_id.clone();
        if incoming.datacenter_id.is_some() {
            stored.datacenter_id = incoming.datacenter_id.clone();
        }
        stored.parent_vm_id = incoming.parent_vm_id.clone();
        stored.base_snapshot_id = incoming.base_snapshot_id.clone();
        stored.vm_template_id = incoming.vm_template_id.clone();
    }
}

/// Per-identity result of a bulk entitlement call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Identities the service confirmed
    pub applied: EntitlementSet,
    /// Identities the service refused, with its reason
    pub rejected: BTreeMap<String, String>,
}

impl BulkOutcome {
    /// Every identity in the batch went through
    pub fn all_applied(refs: &EntitlementSet) -> Self {
        Self {
            applied: refs.clone(),
            rejected: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_pool_tolerates_missing_optionals() {
        let pool: RemotePool = serde_json::from_value(serde_json::json!({
            "id": "pool-1",
            "name": "eng",
            "type": "AUTOMATED",
            "access_group_id": "ag-root",
            "source": "VIRTUAL_CENTER",
            "naming_method": "SPECIFIED",
            "user_assignment": "DEDICATED",
            "vcenter_id": "vc-1",
            "provisioning_settings": {
                "host_or_cluster_id": "cluster-2",
                "resource_pool_id": "rp-2",
                "vm_folder_id": "folder-9"
            }
        }))
        .unwrap();

        assert_eq!(pool.pool_type, PoolType::Automated);
        assert!(pool.enabled.is_none());
        assert!(pool.provisioning_settings.add_virtual_tpm.is_none());
        assert!(pool.customization_settings.is_none());
        assert!(pool.user_group_count.is_none());
    }

    #[test]
    fn test_remote_pool_requires_provisioning_block() {
        let err = serde_json::from_value::<RemotePool>(serde_json::json!({
            "id": "pool-1",
            "name": "eng",
            "type": "AUTOMATED",
            "access_group_id": "ag-root",
            "source": "VIRTUAL_CENTER",
            "naming_method": "SPECIFIED",
            "user_assignment": "DEDICATED",
            "vcenter_id": "vc-1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("provisioning_settings"));
    }

    #[test]
    fn test_renderer_uses_wire_key() {
        let settings = RemoteDisplayProtocolSettings {
            renderer_3d: Some(Renderer3d::Hardware),
            vram_size_mb: Some(256),
            ..Default::default()
        };
        let body = serde_json::to_value(&settings).unwrap();
        assert_eq!(body["renderer3d"], "HARDWARE");
        assert!(!body.as_object().unwrap().contains_key("renderer_3d"));
    }

    #[test]
    fn test_bulk_outcome() {
        let refs: EntitlementSet = ["SID-1", "SID-2"].into_iter().collect();
        let outcome = BulkOutcome::all_applied(&refs);
        assert!(outcome.is_complete());
        assert_eq!(outcome.applied, refs);
    }
}
