use crate::error::RestoreError;

/// The validated configuration for one restore run. Building
/// one of these — from argv, environment variables, or a config file — is
/// the "Options" collaborator's job; this struct is the shape the core
/// consumes once that collaborator is done.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Archive path, or `Some("-")` for an archive read from standard
    /// input. `None` means directory-format input via `dir`.
    pub archive: Option<String>,
    pub gzip: bool,
    /// Directory path, or `Some("-")` for the legacy single-collection
    /// stdin form (requires `collection`).
    pub dir: Option<String>,
    pub db: Option<String>,
    pub collection: Option<String>,
    pub ns_include: Vec<String>,
    pub ns_exclude: Vec<String>,
    pub ns_from: Vec<String>,
    pub ns_to: Vec<String>,
    pub drop: bool,
    pub dry_run: bool,
    pub oplog_replay: bool,
    pub oplog_limit: Option<(u32, u32)>,
    pub oplog_file: Option<String>,
    pub preserve_uuid: bool,
    pub keep_index_version: bool,
    pub convert_legacy_indexes: bool,
    pub fix_dotted_hashed_indexes: bool,
    pub no_index_restore: bool,
    pub no_options_restore: bool,
    pub bypass_document_validation: bool,
    pub maintain_insertion_order: bool,
    pub stop_on_error: bool,
    pub num_insertion_workers: usize,
    pub num_parallel_collections: usize,
    pub restore_db_users_and_roles: bool,
}

/// Rejects semantically impossible option combinations before the
/// orchestrator touches the server.
pub fn validate_options(options: &Options) -> Result<(), RestoreError> {
    let invalid = |msg: &str| RestoreError::OptionsInvalid(msg.to_string());

    if options.archive.is_none() && options.dir.is_none() {
        return Err(invalid("one of archive or dir must be set"));
    }
    if options.archive.is_some() && options.dir.is_some() {
        return Err(invalid("archive and dir are mutually exclusive"));
    }
    if options.ns_from.len() != options.ns_to.len() {
        return Err(invalid("nsFrom and nsTo must be paired lists of equal length"));
    }

    let has_filters = !options.ns_include.is_empty() || !options.ns_exclude.is_empty() || !options.ns_from.is_empty();
    if options.oplog_replay && has_filters {
        return Err(invalid("oplogReplay cannot be combined with nsInclude/nsExclude/nsFrom/nsTo"));
    }
    if options.preserve_uuid && !options.drop {
        return Err(invalid("preserveUUID requires drop"));
    }
    if options.oplog_file.is_some() && options.archive.is_some() {
        return Err(invalid("oplogFile cannot be combined with archive"));
    }
    if options.dir.as_deref() == Some("-") && options.archive.is_some() {
        return Err(invalid("stdin input cannot be combined with archive"));
    }
    if options.dir.as_deref() == Some("-") && options.collection.is_none() {
        return Err(invalid("stdin input requires collection"));
    }
    if !options.ns_exclude.is_empty() && options.collection.is_some() {
        return Err(invalid("nsExclude cannot be combined with an explicit collection"));
    }
    if options.restore_db_users_and_roles {
        match options.db.as_deref() {
            None => return Err(invalid("restoreDBUsersAndRoles requires db")),
            Some("admin") => return Err(invalid("restoreDBUsersAndRoles forbids db=admin")),
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Options {
        Options { dir: Some("/dump".into()), ..Default::default() }
    }

    #[test]
    fn requires_exactly_one_input_source() {
        assert!(validate_options(&Options::default()).is_err());
        let mut both = base();
        both.archive = Some("/a.archive".into());
        assert!(validate_options(&both).is_err());
        assert!(validate_options(&base()).is_ok());
    }

    #[test]
    fn oplog_replay_rejects_filters() {
        let mut o = base();
        o.oplog_replay = true;
        o.ns_include = vec!["db1.*".into()];
        assert!(validate_options(&o).is_err());
    }

    #[test]
    fn preserve_uuid_requires_drop() {
        let mut o = base();
        o.preserve_uuid = true;
        assert!(validate_options(&o).is_err());
        o.drop = true;
        assert!(validate_options(&o).is_ok());
    }

    #[test]
    fn oplog_file_rejects_archive() {
        let mut o = Options { archive: Some("/a.archive".into()), oplog_file: Some("/oplog.bson".into()), ..Default::default() };
        assert!(validate_options(&o).is_err());
        o.oplog_file = None;
        assert!(validate_options(&o).is_ok());
    }

    #[test]
    fn stdin_dir_requires_collection_and_forbids_archive() {
        let mut o = Options { dir: Some("-".into()), ..Default::default() };
        assert!(validate_options(&o).is_err());
        o.collection = Some("c1".into());
        assert!(validate_options(&o).is_ok());
    }

    #[test]
    fn exclude_rejects_explicit_collection() {
        let mut o = base();
        o.ns_exclude = vec!["db1.c1".into()];
        o.collection = Some("c1".into());
        assert!(validate_options(&o).is_err());
    }

    #[test]
    fn restore_users_and_roles_requires_db_and_forbids_admin() {
        let mut o = base();
        o.restore_db_users_and_roles = true;
        assert!(validate_options(&o).is_err());
        o.db = Some("admin".into());
        assert!(validate_options(&o).is_err());
        o.db = Some("app".into());
        assert!(validate_options(&o).is_ok());
    }
}
