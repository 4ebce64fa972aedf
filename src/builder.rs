//! Maps a validated declaration onto the inventory service's request shapes

use crate::models::{
    ClonePrepSettings, CloneSource, CustomizationType, Datastore, DesktopPoolSpec,
    DisplayProtocolSettings, PatternNamingSettings, RemoteClonePrepSettings, RemoteCreateRequest,
    RemoteCustomizationSettings, RemoteDatastore, RemoteDisplayProtocolSettings,
    RemoteMutableSettings, RemotePatternNaming, RemoteProvisioningSettings,
    RemoteProvisioningUpdate, RemoteStorageSettings, RemoteUpdateRequest, StorageSettings,
};
use crate::validate::ValidPoolSpec;

/// Fields the service fixes at creation. A pool must be replaced to change
/// any of them.
pub const IMMUTABLE_FIELDS: &[&str] = &[
    "name",
    "source",
    "naming_method",
    "user_assignment",
    "vcenter_id",
    "provisioning_settings.vm_folder_id",
    "provisioning_settings.add_virtual_tpm",
];

pub fn build(valid: &ValidPoolSpec) -> RemoteCreateRequest {
    let spec = valid.spec();
    let provisioning = &spec.provisioning_settings;
    let clone = CloneIds::from(valid.clone_source());

    RemoteCreateRequest {
        name: spec.name.clone(),
        pool_type: spec.pool_type,
        source: spec.source,
        naming_method: spec.naming_method,
        user_assignment: spec.user_assignment,
        vcenter_id: spec.vcenter_id.clone(),
        settings: mutable_settings(spec),
        provisioning_settings: RemoteProvisioningSettings {
            host_or_cluster_id: provisioning.host_or_cluster_id.clone(),
            resource_pool_id: provisioning.resource_pool_id.clone(),
            vm_folder_id: provisioning.vm_folder_id.clone(),
            datacenter_id: provisioning.datacenter_id.clone(),
            add_virtual_tpm: provisioning.add_virtual_tpm,
            parent_vm_id: clone.parent_vm_id,
            base_snapshot_id: clone.base_snapshot_id,
            vm_template_id: clone.vm_template_id,
        },
    }
}

/// Same mapping as [`build`], minus the fields in [`IMMUTABLE_FIELDS`]
pub fn build_update(valid: &ValidPoolSpec) -> RemoteUpdateRequest {
    let spec = valid.spec();
    let provisioning = &spec.provisioning_settings;
    let clone = CloneIds::from(valid.clone_source());

    RemoteUpdateRequest {
        settings: mutable_settings(spec),
        provisioning_settings: RemoteProvisioningUpdate {
            host_or_cluster_id: provisioning.host_or_cluster_id.clone(),
            resource_pool_id: provisioning.resource_pool_id.clone(),
            datacenter_id: provisioning.datacenter_id.clone(),
            parent_vm_id: clone.parent_vm_id,
            base_snapshot_id: clone.base_snapshot_id,
            vm_template_id: clone.vm_template_id,
        },
    }
}

/// Counts are unsigned in a declaration but 32-bit signed on the wire.
/// Validation rejects every count above `i32::MAX`, so this never saturates
/// for a `ValidPoolSpec`.
fn narrow(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn mutable_settings(spec: &DesktopPoolSpec) -> RemoteMutableSettings {
    RemoteMutableSettings {
        access_group_id: spec.access_group_id.clone(),
        display_name: spec.display_name.clone(),
        description: spec.description.clone(),
        enabled: spec.enabled,
        enable_provisioning: spec.enable_provisioning,
        stop_provisioning_on_error: spec.stop_provisioning_on_error,
        session_type: spec.session_type,
        category_folder_name: spec.category_folder_name.clone(),
        shortcut_locations_v2: spec
            .shortcut_locations
            .as_ref()
            .map(|locations| locations.iter().copied().collect()),
        cloud_managed: spec.cloud_managed,
        cloud_assigned: spec.cloud_assigned,
        automatic_user_assignment: spec.automatic_user_assignment,
        allow_multiple_user_assignments: spec.allow_multiple_user_assignments,
        display_assigned_machine_name: spec.display_assigned_machine_name,
        display_machine_alias: spec.display_machine_alias,
        cs_restriction_tags: spec
            .cs_restriction_tags
            .as_ref()
            .map(|tags| tags.iter().cloned().collect()),
        enable_client_restrictions: spec.enable_client_restrictions,
        transparent_page_sharing_scope: spec.transparent_page_sharing_scope,
        pattern_naming_settings: spec.pattern_naming_settings.as_ref().map(pattern_naming),
        storage_settings: spec.storage_settings.as_ref().map(storage),
        customization_settings: spec.clone_prep_settings.as_ref().map(customization),
        display_protocol_settings: spec.display_protocol_settings.as_ref().map(display_protocol),
    }
}

fn customization(settings: &ClonePrepSettings) -> RemoteCustomizationSettings {
    RemoteCustomizationSettings {
        customization_type: CustomizationType::ClonePrep,
        ad_container_rdn: settings.ad_container_rdn.clone(),
        reuse_pre_existing_accounts: settings.reuse_pre_existing_accounts,
        cloneprep_customization_settings: Some(RemoteClonePrepSettings {
            instant_clone_domain_account_id: settings.instant_clone_domain_account_id.clone(),
            priming_computer_account: settings.priming_computer_account.clone(),
            post_synchronization_script_name: settings.post_synchronization_script_name.clone(),
            post_synchronization_script_parameters: settings
                .post_synchronization_script_parameters
                .clone(),
            power_off_script_name: settings.power_off_script_name.clone(),
            power_off_script_parameters: settings.power_off_script_parameters.clone(),
        }),
    }
}

fn display_protocol(settings: &DisplayProtocolSettings) -> RemoteDisplayProtocolSettings {
    RemoteDisplayProtocolSettings {
        allow_users_to_choose_protocol: settings.allow_users_to_choose_protocol,
        default_display_protocol: settings.default_display_protocol,
        grid_vgpus_enabled: settings.grid_vgpus_enabled,
        max_number_of_monitors: settings.max_number_of_monitors.map(narrow),
        max_resolution_of_any_one_monitor: settings.max_resolution_of_any_one_monitor,
        renderer_3d: settings.renderer_3d,
        session_collaboration_enabled: settings.session_collaboration_enabled,
        vram_size_mb: settings.vram_size_mb.map(narrow),
    }
}

fn pattern_naming(settings: &PatternNamingSettings) -> RemotePatternNaming {
    RemotePatternNaming {
        naming_pattern: settings.naming_pattern.clone(),
        provisioning_time: settings.provisioning_time,
        max_number_of_machines: settings.max_number_of_machines.map(narrow),
        min_number_of_machines: settings.min_number_of_machines.map(narrow),
        number_of_spare_machines: settings.number_of_spare_machines.map(narrow),
    }
}

fn storage(settings: &StorageSettings) -> RemoteStorageSettings {
    RemoteStorageSettings {
        datastores: settings.datastores.iter().map(datastore).collect(),
        reclaim_vm_disk_space: settings.reclaim_vm_disk_space,
        reclamation_threshold_mb: settings.reclamation_threshold_mb.map(narrow),
        use_separate_datastores_replica_and_os_disks: settings
            .use_separate_datastores_replica_and_os_disks,
        replica_disk_datastore_id: settings.replica_disk_datastore_id.clone(),
        use_vsan: settings.use_vsan,
    }
}

fn datastore(datastore: &Datastore) -> RemoteDatastore {
    RemoteDatastore {
        datastore_id: datastore.datastore_id.clone(),
        sdrs_cluster: datastore.sdrs_cluster,
    }
}

#[derive(Default)]
struct CloneIds {
    parent_vm_id: Option<String>,
    base_snapshot_id: Option<String>,
    vm_template_id: Option<String>,
}

impl From<&CloneSource> for CloneIds {
    fn from(clone: &CloneSource) -> Self {
        match clone {
            CloneSource::InstantClone {
                parent_vm_id,
                base_snapshot_id,
            } => Self {
                parent_vm_id: Some(parent_vm_id.clone()),
                base_snapshot_id: Some(base_snapshot_id.clone()),
                ..Default::default()
            },
            CloneSource::FullClone { vm_template_id } => Self {
                vm_template_id: Some(vm_template_id.clone()),
                ..Default::default()
            },
        }
    }
}
