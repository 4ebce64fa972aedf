//! Projects inventory entities back into the declared shape
//!
//! Projection is total: anything the service leaves out of a response stays
//! unset in the result, never a zero value, so the next comparison does not
//! report differences the declaration never asked for.

use crate::models::{
    ClonePrepSettings, CustomizationType, Datastore, DesktopPoolSpec, DisplayProtocolSettings,
    PatternNamingSettings, PoolState, PoolStatus, ProvisioningSettings,
    RemoteCustomizationSettings, RemoteDisplayProtocolSettings, RemotePatternNaming, RemotePool,
    RemoteProvisioningSettings, RemoteStorageSettings, StorageSettings,
};

pub fn project(remote: &RemotePool) -> DesktopPoolSpec {
    DesktopPoolSpec {
        name: remote.name.clone(),
        access_group_id: remote.access_group_id.clone(),
        pool_type: remote.pool_type,
        source: remote.source,
        naming_method: remote.naming_method,
        user_assignment: remote.user_assignment,
        vcenter_id: remote.vcenter_id.clone(),
        display_name: remote.display_name.clone(),
        description: remote.description.clone(),
        enabled: remote.enabled,
        enable_provisioning: remote.enable_provisioning,
        stop_provisioning_on_error: remote.stop_provisioning_on_error,
        session_type: remote.session_type,
        category_folder_name: remote.category_folder_name.clone(),
        shortcut_locations: remote
            .shortcut_locations_v2
            .as_ref()
            .map(|locations| locations.iter().copied().collect()),
        cloud_managed: remote.cloud_managed,
        cloud_assigned: remote.cloud_assigned,
        automatic_user_assignment: remote.automatic_user_assignment,
        allow_multiple_user_assignments: remote.allow_multiple_user_assignments,
        display_assigned_machine_name: remote.display_assigned_machine_name,
        display_machine_alias: remote.display_machine_alias,
        cs_restriction_tags: remote
            .cs_restriction_tags
            .as_ref()
            .map(|tags| tags.iter().cloned().collect()),
        enable_client_restrictions: remote.enable_client_restrictions,
        transparent_page_sharing_scope: remote.transparent_page_sharing_scope,
        pattern_naming_settings: remote.pattern_naming_settings.as_ref().map(pattern_naming),
        provisioning_settings: provisioning(&remote.provisioning_settings),
        clone_prep_settings: remote.customization_settings.as_ref().and_then(clone_prep),
        display_protocol_settings: remote.display_protocol_settings.as_ref().map(display_protocol),
        storage_settings: remote.storage_settings.as_ref().map(storage),
    }
}

/// Computed attributes the service reports alongside the pool
pub fn status(remote: &RemotePool) -> PoolStatus {
    PoolStatus {
        delete_in_progress: remote.delete_in_progress,
        image_source: remote.image_source.clone(),
        user_group_count: widen(remote.user_group_count),
    }
}

pub fn state(remote: &RemotePool) -> PoolState {
    PoolState {
        id: remote.id.clone(),
        spec: project(remote),
        status: status(remote),
    }
}

/// Fields set in `declared` whose value differs from `observed`.
///
/// A field the declaration leaves unset accepts whatever the service chose
/// for it, so a remote default never counts as drift.
pub fn drift(declared: &DesktopPoolSpec, observed: &DesktopPoolSpec) -> Vec<&'static str> {
    let mut drifted = Vec::new();
    let mut check = |field: &'static str, changed: bool| {
        if changed {
            drifted.push(field);
        }
    };

    check("name", declared.name != observed.name);
    check("access_group_id", declared.access_group_id != observed.access_group_id);
    check("pool_type", declared.pool_type != observed.pool_type);
    check("source", declared.source != observed.source);
    check("naming_method", declared.naming_method != observed.naming_method);
    check("user_assignment", declared.user_assignment != observed.user_assignment);
    check("vcenter_id", declared.vcenter_id != observed.vcenter_id);
    check("display_name", differs(&declared.display_name, &observed.display_name));
    check("description", differs(&declared.description, &observed.description));
    check("enabled", differs(&declared.enabled, &observed.enabled));
    check(
        "enable_provisioning",
        differs(&declared.enable_provisioning, &observed.enable_provisioning),
    );
    check(
        "stop_provisioning_on_error",
        differs(&declared.stop_provisioning_on_error, &observed.stop_provisioning_on_error),
    );
    check("session_type", differs(&declared.session_type, &observed.session_type));
    check(
        "category_folder_name",
        differs(&declared.category_folder_name, &observed.category_folder_name),
    );
    check(
        "shortcut_locations",
        differs(&declared.shortcut_locations, &observed.shortcut_locations),
    );
    check("cloud_managed", differs(&declared.cloud_managed, &observed.cloud_managed));
    check("cloud_assigned", differs(&declared.cloud_assigned, &observed.cloud_assigned));
    check(
        "automatic_user_assignment",
        differs(&declared.automatic_user_assignment, &observed.automatic_user_assignment),
    );
    check(
        "allow_multiple_user_assignments",
        differs(
            &declared.allow_multiple_user_assignments,
            &observed.allow_multiple_user_assignments,
        ),
    );
    check(
        "display_assigned_machine_name",
        differs(
            &declared.display_assigned_machine_name,
            &observed.display_assigned_machine_name,
        ),
    );
    check(
        "display_machine_alias",
        differs(&declared.display_machine_alias, &observed.display_machine_alias),
    );
    check(
        "cs_restriction_tags",
        differs(&declared.cs_restriction_tags, &observed.cs_restriction_tags),
    );
    check(
        "enable_client_restrictions",
        differs(&declared.enable_client_restrictions, &observed.enable_client_restrictions),
    );
    check(
        "transparent_page_sharing_scope",
        differs(
            &declared.transparent_page_sharing_scope,
            &observed.transparent_page_sharing_scope,
        ),
    );

    match (&declared.pattern_naming_settings, &observed.pattern_naming_settings) {
        (Some(_), None) => check("pattern_naming_settings", true),
        (Some(d), Some(o)) => {
            check("pattern_naming_settings.naming_pattern", d.naming_pattern != o.naming_pattern);
            check(
                "pattern_naming_settings.provisioning_time",
                d.provisioning_time != o.provisioning_time,
            );
            check(
                "pattern_naming_settings.max_number_of_machines",
                differs(&d.max_number_of_machines, &o.max_number_of_machines),
            );
            check(
                "pattern_naming_settings.min_number_of_machines",
                differs(&d.min_number_of_machines, &o.min_number_of_machines),
            );
            check(
                "pattern_naming_settings.number_of_spare_machines",
                differs(&d.number_of_spare_machines, &o.number_of_spare_machines),
            );
        }
        (None, _) => {}
    }

    let (d, o) = (&declared.provisioning_settings, &observed.provisioning_settings);
    check(
        "provisioning_settings.host_or_cluster_id",
        d.host_or_cluster_id != o.host_or_cluster_id,
    );
    check(
        "provisioning_settings.resource_pool_id",
        d.resource_pool_id != o.resource_pool_id,
    );
    check("provisioning_settings.vm_folder_id", d.vm_folder_id != o.vm_folder_id);
    check(
        "provisioning_settings.datacenter_id",
        differs(&d.datacenter_id, &o.datacenter_id),
    );
    // never sent on update, so only a reported value can disagree
    check(
        "provisioning_settings.add_virtual_tpm",
        conflicts(&d.add_virtual_tpm, &o.add_virtual_tpm),
    );
    check(
        "provisioning_settings.parent_vm_id",
        differs(&d.parent_vm_id, &o.parent_vm_id),
    );
    check(
        "provisioning_settings.base_snapshot_id",
        differs(&d.base_snapshot_id, &o.base_snapshot_id),
    );
    check(
        "provisioning_settings.vm_template_id",
        differs(&d.vm_template_id, &o.vm_template_id),
    );

    match (&declared.clone_prep_settings, &observed.clone_prep_settings) {
        (Some(_), None) => check("clone_prep_settings", true),
        (Some(d), Some(o)) => {
            check(
                "clone_prep_settings.instant_clone_domain_account_id",
                d.instant_clone_domain_account_id != o.instant_clone_domain_account_id,
            );
            check(
                "clone_prep_settings.ad_container_rdn",
                d.ad_container_rdn != o.ad_container_rdn,
            );
            check(
                "clone_prep_settings.reuse_pre_existing_accounts",
                differs(&d.reuse_pre_existing_accounts, &o.reuse_pre_existing_accounts),
            );
            check(
                "clone_prep_settings.priming_computer_account",
                differs(&d.priming_computer_account, &o.priming_computer_account),
            );
            check(
                "clone_prep_settings.post_synchronization_script_name",
                differs(
                    &d.post_synchronization_script_name,
                    &o.post_synchronization_script_name,
                ),
            );
            check(
                "clone_prep_settings.post_synchronization_script_parameters",
                differs(
                    &d.post_synchronization_script_parameters,
                    &o.post_synchronization_script_parameters,
                ),
            );
            check(
                "clone_prep_settings.power_off_script_name",
                differs(&d.power_off_script_name, &o.power_off_script_name),
            );
            check(
                "clone_prep_settings.power_off_script_parameters",
                differs(&d.power_off_script_parameters, &o.power_off_script_parameters),
            );
        }
        (None, _) => {}
    }

    match (&declared.display_protocol_settings, &observed.display_protocol_settings) {
        (Some(_), None) => check("display_protocol_settings", true),
        (Some(d), Some(o)) => {
            check(
                "display_protocol_settings.allow_users_to_choose_protocol",
                differs(&d.allow_users_to_choose_protocol, &o.allow_users_to_choose_protocol),
            );
            check(
                "display_protocol_settings.default_display_protocol",
                differs(&d.default_display_protocol, &o.default_display_protocol),
            );
            check(
                "display_protocol_settings.grid_vgpus_enabled",
                differs(&d.grid_vgpus_enabled, &o.grid_vgpus_enabled),
            );
            check(
                "display_protocol_settings.max_number_of_monitors",
                differs(&d.max_number_of_monitors, &o.max_number_of_monitors),
            );
            check(
                "display_protocol_settings.max_resolution_of_any_one_monitor",
                differs(
                    &d.max_resolution_of_any_one_monitor,
                    &o.max_resolution_of_any_one_monitor,
                ),
            );
            check(
                "display_protocol_settings.renderer_3d",
                differs(&d.renderer_3d, &o.renderer_3d),
            );
            check(
                "display_protocol_settings.session_collaboration_enabled",
                differs(&d.session_collaboration_enabled, &o.session_collaboration_enabled),
            );
            check(
                "display_protocol_settings.vram_size_mb",
                differs(&d.vram_size_mb, &o.vram_size_mb),
            );
        }
        (None, _) => {}
    }

    match (&declared.storage_settings, &observed.storage_settings) {
        (Some(_), None) => check("storage_settings", true),
        (Some(d), Some(o)) => {
            check("storage_settings.datastores", d.datastores != o.datastores);
            check(
                "storage_settings.reclaim_vm_disk_space",
                differs(&d.reclaim_vm_disk_space, &o.reclaim_vm_disk_space),
            );
            check(
                "storage_settings.reclamation_threshold_mb",
                differs(&d.reclamation_threshold_mb, &o.reclamation_threshold_mb),
            );
            check(
                "storage_settings.use_separate_datastores_replica_and_os_disks",
                differs(
                    &d.use_separate_datastores_replica_and_os_disks,
                    &o.use_separate_datastores_replica_and_os_disks,
                ),
            );
            check(
                "storage_settings.replica_disk_datastore_id",
                differs(&d.replica_disk_datastore_id, &o.replica_disk_datastore_id),
            );
            check("storage_settings.use_vsan", differs(&d.use_vsan, &o.use_vsan));
        }
        (None, _) => {}
    }

    drifted
}

/// Immutable fields whose declared value differs from the stored pool.
///
/// An optional immutable field the service does not report cannot be
/// compared and is not a change.
pub fn immutable_changes(observed: &DesktopPoolSpec, declared: &DesktopPoolSpec) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if observed.name != declared.name {
        changed.push("name");
    }
    if observed.source != declared.source {
        changed.push("source");
    }
    if observed.naming_method != declared.naming_method {
        changed.push("naming_method");
    }
    if observed.user_assignment != declared.user_assignment {
        changed.push("user_assignment");
    }
    if observed.vcenter_id != declared.vcenter_id {
        changed.push("vcenter_id");
    }

    let (o, d) = (&observed.provisioning_settings, &declared.provisioning_settings);
    if o.vm_folder_id != d.vm_folder_id {
        changed.push("provisioning_settings.vm_folder_id");
    }
    if conflicts(&d.add_virtual_tpm, &o.add_virtual_tpm) {
        changed.push("provisioning_settings.add_virtual_tpm");
    }
    changed
}

/// Declared and either unreported or reported with another value
fn differs<T: PartialEq>(declared: &Option<T>, observed: &Option<T>) -> bool {
    declared
        .as_ref()
        .is_some_and(|value| observed.as_ref() != Some(value))
}

/// Declared and reported with another value
fn conflicts<T: PartialEq>(declared: &Option<T>, observed: &Option<T>) -> bool {
    matches!((declared, observed), (Some(d), Some(o)) if d != o)
}

/// Negative counts are not meaningful and project as unset
fn widen(count: Option<i32>) -> Option<u32> {
    count.and_then(|n| u32::try_from(n).ok())
}

fn pattern_naming(remote: &RemotePatternNaming) -> PatternNamingSettings {
    PatternNamingSettings {
        naming_pattern: remote.naming_pattern.clone(),
        provisioning_time: remote.provisioning_time,
        max_number_of_machines: widen(remote.max_number_of_machines),
        min_number_of_machines: widen(remote.min_number_of_machines),
        number_of_spare_machines: widen(remote.number_of_spare_machines),
    }
}

fn provisioning(remote: &RemoteProvisioningSettings) -> ProvisioningSettings {
    ProvisioningSettings {
        host_or_cluster_id: remote.host_or_cluster_id.clone(),
        resource_pool_id: remote.resource_pool_id.clone(),
        vm_folder_id: remote.vm_folder_id.clone(),
        datacenter_id: remote.datacenter_id.clone(),
        add_virtual_tpm: remote.add_virtual_tpm,
        parent_vm_id: remote.parent_vm_id.clone(),
        base_snapshot_id: remote.base_snapshot_id.clone(),
        vm_template_id: remote.vm_template_id.clone(),
    }
}

/// Only ClonePrep customization has a declared form
fn clone_prep(remote: &RemoteCustomizationSettings) -> Option<ClonePrepSettings> {
    if remote.customization_type != CustomizationType::ClonePrep {
        return None;
    }
    let clone_prep = remote.cloneprep_customization_settings.as_ref()?;
    Some(ClonePrepSettings {
        instant_clone_domain_account_id: clone_prep.instant_clone_domain_account_id.clone(),
        ad_container_rdn: remote.ad_container_rdn.clone(),
        reuse_pre_existing_accounts: remote.reuse_pre_existing_accounts,
        priming_computer_account: clone_prep.priming_computer_account.clone(),
        post_synchronization_script_name: clone_prep.post_synchronization_script_name.clone(),
        post_synchronization_script_parameters: clone_prep
            .post_synchronization_script_parameters
            .clone(),
        power_off_script_name: clone_prep.power_off_script_name.clone(),
        power_off_script_parameters: clone_prep.power_off_script_parameters.clone(),
    })
}

fn display_protocol(remote: &RemoteDisplayProtocolSettings) -> DisplayProtocolSettings {
    DisplayProtocolSettings {
        allow_users_to_choose_protocol: remote.allow_users_to_choose_protocol,
        default_display_protocol: remote.default_display_protocol,
        grid_vgpus_enabled: remote.grid_vgpus_enabled,
        max_number_of_monitors: widen(remote.max_number_of_monitors),
        max_resolution_of_any_one_monitor: remote.max_resolution_of_any_one_monitor,
        renderer_3d: remote.renderer_3d,
        session_collaboration_enabled: remote.session_collaboration_enabled,
        vram_size_mb: widen(remote.vram_size_mb),
    }
}

fn storage(remote: &RemoteStorageSettings) -> StorageSettings {
    StorageSettings {
        datastores: remote
            .datastores
            .iter()
            .map(|d| Datastore {
                datastore_id: d.datastore_id.clone(),
                sdrs_cluster: d.sdrs_cluster,
            })
            .collect(),
        reclaim_vm_disk_space: remote.reclaim_vm_disk_space,
        reclamation_threshold_mb: widen(remote.reclamation_threshold_mb),
        use_separate_datastores_replica_and_os_disks: remote
            .use_separate_datastores_replica_and_os_disks,
        replica_disk_datastore_id: remote.replica_disk_datastore_id.clone(),
        use_vsan: remote.use_vsan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::models::{
        fixtures, DisplayProtocol, MonitorResolution, PageSharingScope, Renderer3d,
        ShortcutLocation, UserAssignment,
    };
    use crate::validate::validate;

    fn stored(spec: &DesktopPoolSpec) -> RemotePool {
        let valid = validate(spec).unwrap();
        RemotePool::from_request("pool-1", &build(&valid))
    }

    #[test]
    fn test_round_trip_preserves_persisted_fields() {
        let mut spec = fixtures::instant_clone();
        spec.category_folder_name = Some(r"apps\eng".into());
        spec.shortcut_locations = Some([ShortcutLocation::Desktop].into_iter().collect());
        spec.provisioning_settings.add_virtual_tpm = Some(false);

        assert_eq!(project(&stored(&spec)), spec);

        let mut spec = fixtures::full_clone();
        spec.display_assigned_machine_name = Some(true);
        spec.display_machine_alias = Some(false);
        spec.cs_restriction_tags = Some(["dmz".to_string(), "internal".to_string()].into_iter().collect());
        spec.enable_client_restrictions = Some(true);
        spec.transparent_page_sharing_scope = Some(PageSharingScope::Global);
        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            allow_users_to_choose_protocol: Some(false),
            default_display_protocol: Some(DisplayProtocol::Pcoip),
            max_number_of_monitors: Some(2),
            max_resolution_of_any_one_monitor: Some(MonitorResolution::Uhd),
            renderer_3d: Some(Renderer3d::Hardware),
            vram_size_mb: Some(256),
            ..Default::default()
        });
        spec.storage_settings = Some(StorageSettings {
            datastores: vec![Datastore {
                datastore_id: "ds-1".into(),
                sdrs_cluster: None,
            }],
            reclaim_vm_disk_space: Some(true),
            reclamation_threshold_mb: Some(i32::MAX as u32),
            ..Default::default()
        });
        assert_eq!(project(&stored(&spec)), spec);
    }

    #[test]
    fn test_remote_defaults_are_not_drift() {
        let spec = fixtures::instant_clone();
        let mut remote = stored(&spec);
        remote.display_name = Some(remote.name.clone());
        remote.enable_provisioning = Some(true);
        remote.session_type = Some(crate::models::SessionType::Desktop);

        let observed = project(&remote);
        assert_ne!(observed, spec);
        assert!(drift(&spec, &observed).is_empty());
    }

    #[test]
    fn test_drift_reports_changed_fields() {
        let spec = fixtures::instant_clone();
        let mut remote = stored(&spec);
        remote.description = Some("changed out of band".into());
        if let Some(naming) = remote.pattern_naming_settings.as_mut() {
            naming.max_number_of_machines = Some(5);
        }
        remote.storage_settings = None;

        assert_eq!(
            drift(&spec, &project(&remote)),
            vec![
                "description",
                "pattern_naming_settings.max_number_of_machines",
                "storage_settings",
            ]
        );
    }

    #[test]
    fn test_absent_fields_project_as_unset() {
        let mut remote = stored(&fixtures::instant_clone());
        remote.pattern_naming_settings = Some(RemotePatternNaming {
            naming_pattern: "eng-{n}".into(),
            provisioning_time: crate::models::ProvisioningTime::OnDemand,
            max_number_of_machines: Some(4),
            min_number_of_machines: Some(-1),
            number_of_spare_machines: None,
        });
        remote.provisioning_settings.add_virtual_tpm = None;
        remote.enabled = None;
        remote.customization_settings = None;

        let spec = project(&remote);
        let naming = spec.pattern_naming_settings.unwrap();
        assert_eq!(naming.max_number_of_machines, Some(4));
        assert_eq!(naming.min_number_of_machines, None);
        assert_eq!(naming.number_of_spare_machines, None);
        assert_eq!(spec.enabled, None);
        assert_eq!(spec.provisioning_settings.add_virtual_tpm, None);
        assert_eq!(spec.provisioning_settings.host_or_cluster_id, "cluster-7");
        assert!(spec.clone_prep_settings.is_none());
    }

    #[test]
    fn test_other_customization_types_project_as_unset() {
        let mut remote = stored(&fixtures::full_clone());
        remote.customization_settings = Some(RemoteCustomizationSettings {
            customization_type: CustomizationType::SysPrep,
            ad_container_rdn: "OU=Finance".into(),
            reuse_pre_existing_accounts: None,
            cloneprep_customization_settings: None,
        });

        assert!(project(&remote).clone_prep_settings.is_none());
    }

    #[test]
    fn test_drift_in_new_blocks() {
        let mut spec = fixtures::instant_clone();
        spec.cs_restriction_tags = Some(["internal".to_string()].into_iter().collect());
        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            max_number_of_monitors: Some(2),
            ..Default::default()
        });
        let mut remote = stored(&spec);
        remote.cs_restriction_tags = Some(vec![]);
        if let Some(customization) = remote.customization_settings.as_mut() {
            customization.ad_container_rdn = "OU=Moved".into();
        }
        if let Some(display) = remote.display_protocol_settings.as_mut() {
            display.max_number_of_monitors = Some(4);
        }

        assert_eq!(
            drift(&spec, &project(&remote)),
            vec![
                "cs_restriction_tags",
                "clone_prep_settings.ad_container_rdn",
                "display_protocol_settings.max_number_of_monitors",
            ]
        );
    }

    #[test]
    fn test_unreported_virtual_tpm_is_not_a_change() {
        let mut spec = fixtures::instant_clone();
        spec.provisioning_settings.add_virtual_tpm = Some(true);
        let mut remote = stored(&spec);
        remote.provisioning_settings.add_virtual_tpm = None;

        let observed = project(&remote);
        assert!(immutable_changes(&observed, &spec).is_empty());
        assert!(drift(&spec, &observed).is_empty());

        // a reported value that disagrees still counts
        remote.provisioning_settings.add_virtual_tpm = Some(false);
        let observed = project(&remote);
        assert_eq!(
            immutable_changes(&observed, &spec),
            vec!["provisioning_settings.add_virtual_tpm"]
        );
        assert_eq!(drift(&spec, &observed), vec!["provisioning_settings.add_virtual_tpm"]);
    }

    #[test]
    fn test_unreported_mutable_field_is_drift() {
        let mut spec = fixtures::full_clone();
        spec.display_machine_alias = Some(true);
        let mut remote = stored(&spec);
        remote.display_machine_alias = None;

        assert_eq!(spec.user_assignment, UserAssignment::Dedicated);
        assert_eq!(drift(&spec, &project(&remote)), vec!["display_machine_alias"]);
    }

    #[test]
    fn test_status() {
        let mut remote = stored(&fixtures::full_clone());
        remote.delete_in_progress = Some(false);
        remote.image_source = Some("VIRTUAL_CENTER".into());
        remote.user_group_count = Some(3);

        let state = state(&remote);
        assert_eq!(state.id, "pool-1");
        assert_eq!(state.status.user_group_count, Some(3));
        assert_eq!(state.status.image_source.as_deref(), Some("VIRTUAL_CENTER"));

        remote.user_group_count = Some(-2);
        assert_eq!(status(&remote).user_group_count, None);
    }

    #[test]
    fn test_immutable_changes() {
        let observed = fixtures::instant_clone();
        let mut declared = observed.clone();
        declared.vcenter_id = "vc-2".into();
        declared.provisioning_settings.vm_folder_id = "folder-other".into();
        declared.description = Some("mutable".into());

        assert_eq!(
            immutable_changes(&observed, &declared),
            vec!["vcenter_id", "provisioning_settings.vm_folder_id"]
        );
        assert!(immutable_changes(&observed, &observed).is_empty());
    }
}
