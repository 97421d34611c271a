/// Namespaces the replayer silently drops.
const IGNORED_NAMESPACES: &[&str] = &[
    "config.system.sessions",
    "config.system.indexBuilds",
    "config.system.preimages",
    "config.transactions",
    "config.transaction_coordinators",
    "config.system.sharding_ddl_coordinators",
    "config.image_collection",
    "config.mongos",
];

const IGNORED_NAMESPACE_PREFIX: &str = "config.cache.";

pub fn is_ignored_namespace(ns: &str) -> bool {
    IGNORED_NAMESPACES.contains(&ns) || ns.starts_with(IGNORED_NAMESPACE_PREFIX)
}

/// Command names that are logged and skipped rather than dispatched.
const IGNORED_COMMANDS: &[&str] = &["startIndexBuild", "abortIndexBuild"];

pub fn is_ignored_command(name: &str) -> bool {
    IGNORED_COMMANDS.contains(&name)
}

/// Every `c`-op command name the replayer knows how to handle; anything
/// else is `OplogError::UnknownCommand`.
const KNOWN_COMMANDS: &[&str] = &[
    "renameCollection",
    "dropDatabase",
    "applyOps",
    "dbCheck",
    "create",
    "convertToCapped",
    "emptycapped",
    "drop",
    "createIndexes",
    "deleteIndex",
    "deleteIndexes",
    "dropIndex",
    "dropIndexes",
    "collMod",
    "commitIndexBuild",
];

pub fn is_known_command(name: &str) -> bool {
    KNOWN_COMMANDS.contains(&name)
}
