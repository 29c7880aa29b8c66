/// `workflows.organize.*` config surface (spec §6).
#[derive(Debug, Clone)]
pub struct OrganizePolicy {
    pub create_backup: bool,
    pub handle_duplicates: bool,
    pub update_yaml_header: bool,
}

impl Default for OrganizePolicy {
    fn default() -> Self {
        OrganizePolicy {
            create_backup: true,
            handle_duplicates: true,
            update_yaml_header: true,
        }
    }
}
