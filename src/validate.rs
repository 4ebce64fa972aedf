//! Cross-field validation of declared pools
//!
//! Every rule runs on every declaration and all violations are reported
//! together, so an operator can fix a declaration in one pass. Nothing here
//! touches the inventory service.

use std::fmt;

use serde::Serialize;

use crate::models::{
    CloneSource, DesktopPoolSpec, DisplayProtocol, NamingMethod, PoolType, ProvisioningSettings,
    ProvisioningTime, Source, UserAssignment,
};
use crate::{Error, Result};

const MAX_FOLDER_NAME_LEN: usize = 64;
const MAX_FOLDER_DEPTH: usize = 4;
const REMOTE_COUNT_MAX: u32 = i32::MAX as u32;
const MAX_MONITORS: u32 = 4;
const VRAM_MB: std::ops::RangeInclusive<u32> = 64..=512;

/// A single broken rule, tied to the field path that breaks it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn required(field: &str, condition: impl fmt::Display) -> Self {
        Self::new(field, format!("is required when {condition}"))
    }

    fn forbidden(field: &str, condition: impl fmt::Display) -> Self {
        Self::new(field, format!("must be unset when {condition}"))
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every violation found in one declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Whether any violation names `field`
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// A declaration that passed every rule.
///
/// Only [`validate`] constructs one, so holding a `ValidPoolSpec` is proof
/// the declaration is internally consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPoolSpec {
    spec: DesktopPoolSpec,
    clone: CloneSource,
}

impl ValidPoolSpec {
    pub fn spec(&self) -> &DesktopPoolSpec {
        &self.spec
    }

    pub fn clone_source(&self) -> &CloneSource {
        &self.clone
    }

    pub fn into_inner(self) -> DesktopPoolSpec {
        self.spec
    }
}

type Rule = fn(&DesktopPoolSpec, &mut Vec<Violation>);

const RULES: &[Rule] = &[
    identity,
    pool_type,
    assignment,
    naming,
    provisioning,
    customization,
    cloud,
    restrictions,
    shortcuts,
    display_protocol,
    storage,
];

/// Run every rule and collect what they find. Empty means valid.
pub fn violations(spec: &DesktopPoolSpec) -> Vec<Violation> {
    let mut found = Vec::new();
    for rule in RULES {
        rule(spec, &mut found);
    }
    found
}

pub fn validate(spec: &DesktopPoolSpec) -> Result<ValidPoolSpec> {
    let found = violations(spec);
    if !found.is_empty() {
        tracing::debug!(pool = %spec.name, count = found.len(), "declaration rejected");
        return Err(Error::Configuration(found.into()));
    }

    let clone = clone_source(spec.source, &spec.provisioning_settings)
        .map_err(|found| Error::Configuration(found.into()))?;

    Ok(ValidPoolSpec {
        spec: spec.clone(),
        clone,
    })
}

/// Empty strings count as unset
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn identity(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    if spec.name.is_empty() {
        found.push(Violation::new("name", "must not be empty"));
    } else if !spec
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        found.push(Violation::new(
            "name",
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    if spec.access_group_id.is_empty() {
        found.push(Violation::new("access_group_id", "must not be empty"));
    }
    if spec.vcenter_id.is_empty() {
        found.push(Violation::new("vcenter_id", "must not be empty"));
    }
}

fn pool_type(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    if spec.pool_type != PoolType::Automated {
        found.push(Violation::new(
            "pool_type",
            format!("only AUTOMATED pools can be managed, got {}", spec.pool_type),
        ));
    }
}

fn assignment(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let policy = spec.assignment();

    if spec.user_assignment == UserAssignment::Floating {
        let condition = "user_assignment is FLOATING";
        if policy.automatic_user_assignment.is_some() {
            found.push(Violation::forbidden("automatic_user_assignment", condition));
        }
        if policy.allow_multiple_user_assignments.is_some() {
            found.push(Violation::forbidden(
                "allow_multiple_user_assignments",
                condition,
            ));
        }
    }

    if policy.both_enabled() {
        found.push(Violation::new(
            "allow_multiple_user_assignments",
            "cannot be true together with automatic_user_assignment",
        ));
    }

    if spec.user_assignment != UserAssignment::Dedicated {
        let dedicated_only = [
            ("display_assigned_machine_name", spec.display_assigned_machine_name),
            ("display_machine_alias", spec.display_machine_alias),
        ];
        for (field, flag) in dedicated_only {
            if flag == Some(true) {
                found.push(Violation::new(
                    field,
                    "can only be true when user_assignment is DEDICATED",
                ));
            }
        }
    }
}

fn naming(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let settings = match (spec.naming_method, &spec.pattern_naming_settings) {
        (NamingMethod::Pattern, None) => {
            found.push(Violation::required(
                "pattern_naming_settings",
                "naming_method is PATTERN",
            ));
            return;
        }
        (NamingMethod::Specified, Some(_)) => {
            found.push(Violation::forbidden(
                "pattern_naming_settings",
                "naming_method is SPECIFIED",
            ));
            return;
        }
        (_, None) => return,
        (_, Some(settings)) => settings,
    };

    if settings.naming_pattern.is_empty() {
        found.push(Violation::new(
            "pattern_naming_settings.naming_pattern",
            "must not be empty",
        ));
    }

    let counts = [
        ("max_number_of_machines", settings.max_number_of_machines),
        ("min_number_of_machines", settings.min_number_of_machines),
        ("number_of_spare_machines", settings.number_of_spare_machines),
    ];

    if settings.provisioning_time == ProvisioningTime::UpFront {
        for (name, count) in &counts[1..] {
            if count.is_some_and(|n| n > 0) {
                found.push(Violation::new(
                    format!("pattern_naming_settings.{name}"),
                    "must be unset or 0 when provisioning_time is UP_FRONT",
                ));
            }
        }
    }

    if let Some(max) = settings.max_number_of_machines {
        if max == 0 {
            found.push(Violation::new(
                "pattern_naming_settings.max_number_of_machines",
                "must be at least 1",
            ));
        }
        if let Some(min) = settings.min_number_of_machines {
            if min > max {
                found.push(Violation::new(
                    "pattern_naming_settings.min_number_of_machines",
                    format!("must not exceed max_number_of_machines ({max})"),
                ));
            }
        }
    }

    for (name, count) in counts {
        if count.is_some_and(|n| n > REMOTE_COUNT_MAX) {
            found.push(Violation::new(
                format!("pattern_naming_settings.{name}"),
                format!("must not exceed {REMOTE_COUNT_MAX}"),
            ));
        }
    }
}

fn provisioning(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let settings = &spec.provisioning_settings;
    let placement = [
        ("provisioning_settings.host_or_cluster_id", &settings.host_or_cluster_id),
        ("provisioning_settings.resource_pool_id", &settings.resource_pool_id),
        ("provisioning_settings.vm_folder_id", &settings.vm_folder_id),
    ];
    for (field, value) in placement {
        if value.is_empty() {
            found.push(Violation::new(field, "must not be empty"));
        }
    }

    if let Err(clone) = clone_source(spec.source, settings) {
        found.extend(clone);
    }
}

/// Resolve the source-dependent half of the provisioning settings, or report
/// one violation per missing or extra field.
fn clone_source(
    source: Source,
    settings: &ProvisioningSettings,
) -> std::result::Result<CloneSource, Vec<Violation>> {
    let parent = present(&settings.parent_vm_id);
    let snapshot = present(&settings.base_snapshot_id);
    let template = present(&settings.vm_template_id);
    let condition = format!("source is {source}");
    let mut found = Vec::new();

    match source {
        Source::InstantClone => {
            if parent.is_none() {
                found.push(Violation::required("provisioning_settings.parent_vm_id", &condition));
            }
            if snapshot.is_none() {
                found.push(Violation::required(
                    "provisioning_settings.base_snapshot_id",
                    &condition,
                ));
            }
            if template.is_some() {
                found.push(Violation::forbidden(
                    "provisioning_settings.vm_template_id",
                    &condition,
                ));
            }
            match (parent, snapshot) {
                (Some(parent), Some(snapshot)) if found.is_empty() => {
                    Ok(CloneSource::InstantClone {
                        parent_vm_id: parent.to_string(),
                        base_snapshot_id: snapshot.to_string(),
                    })
                }
                _ => Err(found),
            }
        }
        Source::VirtualCenter => {
            if template.is_none() {
                found.push(Violation::required(
                    "provisioning_settings.vm_template_id",
                    &condition,
                ));
            }
            if parent.is_some() {
                found.push(Violation::forbidden("provisioning_settings.parent_vm_id", &condition));
            }
            if snapshot.is_some() {
                found.push(Violation::forbidden(
                    "provisioning_settings.base_snapshot_id",
                    &condition,
                ));
            }
            match template {
                Some(template) if found.is_empty() => Ok(CloneSource::FullClone {
                    vm_template_id: template.to_string(),
                }),
                _ => Err(found),
            }
        }
    }
}

fn customization(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let Some(clone_prep) = &spec.clone_prep_settings else {
        return;
    };
    if spec.source != Source::InstantClone {
        found.push(Violation::forbidden(
            "clone_prep_settings",
            format!("source is {}", spec.source),
        ));
        return;
    }

    if clone_prep.instant_clone_domain_account_id.is_empty() {
        found.push(Violation::new(
            "clone_prep_settings.instant_clone_domain_account_id",
            "must not be empty",
        ));
    }
    if clone_prep.ad_container_rdn.is_empty() {
        found.push(Violation::new(
            "clone_prep_settings.ad_container_rdn",
            "must not be empty",
        ));
    }

    let scripts = [
        (
            "post_synchronization_script",
            &clone_prep.post_synchronization_script_name,
            &clone_prep.post_synchronization_script_parameters,
        ),
        (
            "power_off_script",
            &clone_prep.power_off_script_name,
            &clone_prep.power_off_script_parameters,
        ),
    ];
    for (script, name, parameters) in scripts {
        if present(parameters).is_some() && present(name).is_none() {
            found.push(Violation::required(
                &format!("clone_prep_settings.{script}_name"),
                format!("{script}_parameters is set"),
            ));
        }
    }
}

fn cloud(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let managed = spec.cloud_managed == Some(true);
    if spec.cloud_assigned == Some(true) && !managed {
        found.push(Violation::new(
            "cloud_assigned",
            "requires cloud_managed to be true",
        ));
    }
    if managed && spec.enabled == Some(false) {
        found.push(Violation::new(
            "cloud_managed",
            "cannot be true for a disabled pool",
        ));
    }
}

fn restrictions(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let Some(tags) = &spec.cs_restriction_tags else {
        return;
    };
    if tags.iter().any(|tag| tag.trim().is_empty()) {
        found.push(Violation::new(
            "cs_restriction_tags",
            "tags must not be blank",
        ));
    }
}

fn shortcuts(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let Some(folder) = present(&spec.category_folder_name) else {
        return;
    };

    if spec.shortcut_locations.as_ref().map_or(true, |l| l.is_empty()) {
        found.push(Violation::required(
            "shortcut_locations",
            "category_folder_name is set",
        ));
    }
    if folder.chars().count() > MAX_FOLDER_NAME_LEN {
        found.push(Violation::new(
            "category_folder_name",
            format!("must be at most {MAX_FOLDER_NAME_LEN} characters"),
        ));
    }
    if folder.split('\\').count() > MAX_FOLDER_DEPTH {
        found.push(Violation::new(
            "category_folder_name",
            format!("must have at most {MAX_FOLDER_DEPTH} levels"),
        ));
    }
    if folder.starts_with('\\') || folder.ends_with('\\') || folder.contains("\\\\") {
        found.push(Violation::new(
            "category_folder_name",
            "must not begin or end with a backslash or contain consecutive backslashes",
        ));
    }
}

fn display_protocol(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let Some(display) = &spec.display_protocol_settings else {
        return;
    };

    if display
        .max_number_of_monitors
        .is_some_and(|n| n == 0 || n > MAX_MONITORS)
    {
        found.push(Violation::new(
            "display_protocol_settings.max_number_of_monitors",
            format!("must be between 1 and {MAX_MONITORS}"),
        ));
    }
    if display.vram_size_mb.is_some_and(|mb| !VRAM_MB.contains(&mb)) {
        found.push(Violation::new(
            "display_protocol_settings.vram_size_mb",
            format!("must be between {} and {}", VRAM_MB.start(), VRAM_MB.end()),
        ));
    }

    let Some(renderer) = display.renderer_3d.filter(|r| r.uses_vram()) else {
        return;
    };
    let condition = format!("renderer_3d is {renderer}");
    if display.vram_size_mb.is_none() {
        found.push(Violation::required(
            "display_protocol_settings.vram_size_mb",
            &condition,
        ));
    }
    if display.allow_users_to_choose_protocol != Some(false) {
        found.push(Violation::new(
            "display_protocol_settings.allow_users_to_choose_protocol",
            format!("must be false when {condition}"),
        ));
    }
    if let Some(protocol) = display
        .default_display_protocol
        .filter(|p| *p != DisplayProtocol::Pcoip)
    {
        found.push(Violation::new(
            "display_protocol_settings.default_display_protocol",
            format!("must be PCOIP when {condition}, got {protocol}"),
        ));
    }
}

fn storage(spec: &DesktopPoolSpec, found: &mut Vec<Violation>) {
    let Some(storage) = &spec.storage_settings else {
        return;
    };

    if storage.datastores.is_empty() {
        found.push(Violation::new(
            "storage_settings.datastores",
            "at least one datastore is required",
        ));
    }
    for (i, datastore) in storage.datastores.iter().enumerate() {
        if datastore.datastore_id.is_empty() {
            found.push(Violation::new(
                format!("storage_settings.datastores[{i}].datastore_id"),
                "must not be empty",
            ));
        }
    }

    if storage.reclaim_vm_disk_space == Some(true) && storage.reclamation_threshold_mb.is_none() {
        found.push(Violation::required(
            "storage_settings.reclamation_threshold_mb",
            "reclaim_vm_disk_space is true",
        ));
    }
    if storage
        .reclamation_threshold_mb
        .is_some_and(|mb| mb > REMOTE_COUNT_MAX)
    {
        found.push(Violation::new(
            "storage_settings.reclamation_threshold_mb",
            format!("must not exceed {REMOTE_COUNT_MAX}"),
        ));
    }

    let separate = storage.use_separate_datastores_replica_and_os_disks == Some(true);
    match (separate, present(&storage.replica_disk_datastore_id)) {
        (true, None) => found.push(Violation::required(
            "storage_settings.replica_disk_datastore_id",
            "use_separate_datastores_replica_and_os_disks is true",
        )),
        (false, Some(_)) => found.push(Violation::new(
            "storage_settings.replica_disk_datastore_id",
            "requires use_separate_datastores_replica_and_os_disks to be true",
        )),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::models::{
        ClonePrepSettings, DisplayProtocolSettings, Renderer3d, ShortcutLocation, StorageSettings,
    };

    fn fields(spec: &DesktopPoolSpec) -> Vec<String> {
        violations(spec).into_iter().map(|v| v.field).collect()
    }

    #[test]
    fn test_fixtures_are_valid() {
        assert!(violations(&fixtures::instant_clone()).is_empty());
        assert!(violations(&fixtures::full_clone()).is_empty());
    }

    #[test]
    fn test_validate_resolves_clone_source() {
        let valid = validate(&fixtures::instant_clone()).unwrap();
        assert_eq!(
            valid.clone_source(),
            &CloneSource::InstantClone {
                parent_vm_id: "vm-golden".into(),
                base_snapshot_id: "snap-42".into(),
            }
        );

        let valid = validate(&fixtures::full_clone()).unwrap();
        assert_eq!(
            valid.clone_source(),
            &CloneSource::FullClone {
                vm_template_id: "tmpl-win11".into()
            }
        );
    }

    #[test]
    fn test_floating_rejects_each_assignment_flag() {
        let mut spec = fixtures::instant_clone();
        spec.automatic_user_assignment = Some(false);
        assert_eq!(fields(&spec), vec!["automatic_user_assignment"]);

        let mut spec = fixtures::instant_clone();
        spec.allow_multiple_user_assignments = Some(true);
        assert_eq!(fields(&spec), vec!["allow_multiple_user_assignments"]);
    }

    #[test]
    fn test_assignment_flags_not_both_true() {
        let mut spec = fixtures::full_clone();
        spec.allow_multiple_user_assignments = Some(true);

        let found = violations(&spec);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("automatic_user_assignment"));
    }

    #[test]
    fn test_instant_clone_accumulates_every_violation() {
        let mut spec = fixtures::instant_clone();
        spec.provisioning_settings.parent_vm_id = None;
        spec.provisioning_settings.base_snapshot_id = Some(String::new());
        spec.provisioning_settings.vm_template_id = Some("tmpl-1".into());

        assert_eq!(
            fields(&spec),
            vec![
                "provisioning_settings.parent_vm_id",
                "provisioning_settings.base_snapshot_id",
                "provisioning_settings.vm_template_id",
            ]
        );
    }

    #[test]
    fn test_virtual_center_requires_template() {
        let mut spec = fixtures::full_clone();
        spec.provisioning_settings.vm_template_id = None;
        spec.provisioning_settings.parent_vm_id = Some("vm-golden".into());

        assert_eq!(
            fields(&spec),
            vec![
                "provisioning_settings.vm_template_id",
                "provisioning_settings.parent_vm_id",
            ]
        );
    }

    #[test]
    fn test_up_front_with_minimum_is_single_violation() {
        let mut spec = fixtures::instant_clone();
        let naming = spec.pattern_naming_settings.as_mut().unwrap();
        naming.provisioning_time = ProvisioningTime::UpFront;
        naming.max_number_of_machines = None;
        naming.min_number_of_machines = Some(5);
        naming.number_of_spare_machines = None;

        let found = violations(&spec);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "pattern_naming_settings.min_number_of_machines");
    }

    #[test]
    fn test_up_front_accepts_zero_counts() {
        let mut spec = fixtures::instant_clone();
        let naming = spec.pattern_naming_settings.as_mut().unwrap();
        naming.provisioning_time = ProvisioningTime::UpFront;
        naming.min_number_of_machines = Some(0);
        naming.number_of_spare_machines = Some(0);

        assert!(violations(&spec).is_empty());
    }

    #[test]
    fn test_pattern_naming_presence() {
        let mut spec = fixtures::instant_clone();
        spec.pattern_naming_settings = None;
        assert_eq!(fields(&spec), vec!["pattern_naming_settings"]);

        let mut spec = fixtures::full_clone();
        spec.pattern_naming_settings = fixtures::instant_clone().pattern_naming_settings;
        assert_eq!(fields(&spec), vec!["pattern_naming_settings"]);
    }

    #[test]
    fn test_machine_count_bounds() {
        let mut spec = fixtures::instant_clone();
        let naming = spec.pattern_naming_settings.as_mut().unwrap();
        naming.max_number_of_machines = Some(3);
        naming.min_number_of_machines = Some(4);
        naming.number_of_spare_machines = Some(u32::MAX);

        assert_eq!(
            fields(&spec),
            vec![
                "pattern_naming_settings.min_number_of_machines",
                "pattern_naming_settings.number_of_spare_machines",
            ]
        );
    }

    #[test]
    fn test_identity_rules() {
        let mut spec = fixtures::instant_clone();
        spec.name = "eng desktops".into();
        spec.vcenter_id.clear();
        spec.pool_type = PoolType::Rds;

        assert_eq!(fields(&spec), vec!["name", "vcenter_id", "pool_type"]);
    }

    #[test]
    fn test_cloud_rules() {
        let mut spec = fixtures::instant_clone();
        spec.cloud_assigned = Some(true);
        assert_eq!(fields(&spec), vec!["cloud_assigned"]);

        spec.cloud_managed = Some(true);
        spec.enabled = Some(false);
        assert_eq!(fields(&spec), vec!["cloud_managed"]);
    }

    #[test]
    fn test_category_folder_rules() {
        let mut spec = fixtures::instant_clone();
        spec.category_folder_name = Some(r"a\b\c\d\e".into());
        assert_eq!(
            fields(&spec),
            vec!["shortcut_locations", "category_folder_name"]
        );

        spec.shortcut_locations = Some([ShortcutLocation::StartMenu].into_iter().collect());
        spec.category_folder_name = Some(r"\apps\".into());
        assert_eq!(fields(&spec), vec!["category_folder_name"]);

        spec.category_folder_name = Some(r"apps\engineering".into());
        assert!(violations(&spec).is_empty());
    }

    #[test]
    fn test_storage_rules() {
        let mut spec = fixtures::instant_clone();
        spec.storage_settings = Some(StorageSettings {
            datastores: vec![],
            reclaim_vm_disk_space: Some(true),
            replica_disk_datastore_id: Some("ds-replica".into()),
            ..Default::default()
        });

        assert_eq!(
            fields(&spec),
            vec![
                "storage_settings.datastores",
                "storage_settings.reclamation_threshold_mb",
                "storage_settings.replica_disk_datastore_id",
            ]
        );
    }

    #[test]
    fn test_reclamation_threshold_fits_remote_width() {
        let mut spec = fixtures::instant_clone();
        let storage = spec.storage_settings.as_mut().unwrap();
        storage.reclaim_vm_disk_space = Some(true);
        storage.reclamation_threshold_mb = Some(3_000_000_000);
        assert_eq!(fields(&spec), vec!["storage_settings.reclamation_threshold_mb"]);

        spec.storage_settings.as_mut().unwrap().reclamation_threshold_mb = Some(i32::MAX as u32);
        assert!(violations(&spec).is_empty());
    }

    #[test]
    fn test_clone_prep_rules() {
        let mut spec = fixtures::instant_clone();
        spec.clone_prep_settings = Some(ClonePrepSettings {
            power_off_script_parameters: Some("-force".into()),
            ..Default::default()
        });
        assert_eq!(
            fields(&spec),
            vec![
                "clone_prep_settings.instant_clone_domain_account_id",
                "clone_prep_settings.ad_container_rdn",
                "clone_prep_settings.power_off_script_name",
            ]
        );

        let mut spec = fixtures::full_clone();
        spec.clone_prep_settings = fixtures::instant_clone().clone_prep_settings;
        let found = violations(&spec);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "clone_prep_settings");
        assert!(found[0].message.contains("VIRTUAL_CENTER"));
    }

    #[test]
    fn test_machine_name_flags_need_dedicated() {
        let mut spec = fixtures::instant_clone();
        spec.display_assigned_machine_name = Some(true);
        spec.display_machine_alias = Some(false);
        assert_eq!(fields(&spec), vec!["display_assigned_machine_name"]);

        let mut spec = fixtures::full_clone();
        spec.display_assigned_machine_name = Some(true);
        spec.display_machine_alias = Some(true);
        assert!(violations(&spec).is_empty());
    }

    #[test]
    fn test_blank_restriction_tag() {
        let mut spec = fixtures::instant_clone();
        spec.cs_restriction_tags = Some(["dmz".to_string(), " ".to_string()].into_iter().collect());
        assert_eq!(fields(&spec), vec!["cs_restriction_tags"]);
    }

    #[test]
    fn test_display_protocol_rules() {
        let mut spec = fixtures::instant_clone();
        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            max_number_of_monitors: Some(6),
            vram_size_mb: Some(1024),
            ..Default::default()
        });
        assert_eq!(
            fields(&spec),
            vec![
                "display_protocol_settings.max_number_of_monitors",
                "display_protocol_settings.vram_size_mb",
            ]
        );

        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            default_display_protocol: Some(DisplayProtocol::Blast),
            renderer_3d: Some(Renderer3d::Hardware),
            ..Default::default()
        });
        assert_eq!(
            fields(&spec),
            vec![
                "display_protocol_settings.vram_size_mb",
                "display_protocol_settings.allow_users_to_choose_protocol",
                "display_protocol_settings.default_display_protocol",
            ]
        );

        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            allow_users_to_choose_protocol: Some(false),
            renderer_3d: Some(Renderer3d::Automatic),
            vram_size_mb: Some(96),
            ..Default::default()
        });
        assert!(violations(&spec).is_empty());

        // renderers without video memory carry no extra requirements
        spec.display_protocol_settings = Some(DisplayProtocolSettings {
            renderer_3d: Some(Renderer3d::Disabled),
            ..Default::default()
        });
        assert!(violations(&spec).is_empty());
    }

    #[test]
    fn test_validate_returns_configuration_error() {
        let mut spec = fixtures::full_clone();
        spec.access_group_id.clear();
        spec.provisioning_settings.vm_template_id = None;

        match validate(&spec) {
            Err(Error::Configuration(found)) => {
                assert_eq!(found.len(), 2);
                assert!(found.mentions("access_group_id"));
                assert!(found.mentions("provisioning_settings.vm_template_id"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
