/// A `MAJOR.MINOR.PATCH` server version, ordered the natural way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn parse(s: &str) -> Option<ServerVersion> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Some(ServerVersion::new(major, minor, patch))
    }

    pub fn major_minor_differs(self, other: ServerVersion) -> bool {
        self.major != other.major || self.minor != other.minor
    }
}

/// Servers on 3.6.0-3.6.8 or 4.0.0-4.0.2 require a `ui` on `createIndexes`;
/// when `preserveUUID` strips it, the command must be converted to a legacy
/// `system.indexes` insert instead.
pub fn requires_ui_for_create_indexes(version: ServerVersion) -> bool {
    let in_36_patch_range = version.major == 3 && version.minor == 6 && version.patch <= 8;
    let in_40_patch_range = version.major == 4 && version.minor == 0 && version.patch <= 2;
    in_36_patch_range || in_40_patch_range
}

/// `collMod`'s legacy `noPadding`/`usePowerOf2Sizes` options are dropped on
/// servers ≥ 4.1.11.
pub fn strips_legacy_coll_mod_options(version: ServerVersion) -> bool {
    version >= ServerVersion::new(4, 1, 11)
}
