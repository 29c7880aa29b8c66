/// `status_management.*` config surface (spec §6), read once at startup and
/// threaded through every `update` call.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    pub yaml_validation: bool,
    pub auto_backup: bool,
    pub timestamp_retention_days: u32,
    pub detailed_timestamp_tracking: bool,
    pub backup_before_status_update: bool,
    pub validate_yaml_before_update: bool,
    pub create_backup_on_yaml_error: bool,
    pub auto_repair_corrupted_headers: bool,
    pub fallback_to_backup_on_failure: bool,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        StatusPolicy {
            yaml_validation: true,
            auto_backup: true,
            timestamp_retention_days: 90,
            detailed_timestamp_tracking: true,
            backup_before_status_update: true,
            validate_yaml_before_update: true,
            create_backup_on_yaml_error: true,
            auto_repair_corrupted_headers: true,
            fallback_to_backup_on_failure: true,
        }
    }
}
