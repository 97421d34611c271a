use std::iter::Peekable;

use restorekit_core::Options;

/// Parses `argv[1..]` into an `Options`. No argument-parsing crate exists
/// anywhere in this workspace, so this stays a plain loop over
/// `std::env::args()` rather than introducing one.
pub fn parse<I: Iterator<Item = String>>(args: I) -> Result<Options, String> {
    let mut options =
        Options { num_insertion_workers: 1, num_parallel_collections: 1, ..Default::default() };
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--archive" => options.archive = Some(take_value(&flag, inline, &mut args)?),
            "--gzip" => options.gzip = true,
            "--dir" => options.dir = Some(take_value(&flag, inline, &mut args)?),
            "--db" => options.db = Some(take_value(&flag, inline, &mut args)?),
            "--collection" => options.collection = Some(take_value(&flag, inline, &mut args)?),
            "--nsInclude" => options.ns_include.push(take_value(&flag, inline, &mut args)?),
            "--nsExclude" => options.ns_exclude.push(take_value(&flag, inline, &mut args)?),
            "--nsFrom" => options.ns_from.push(take_value(&flag, inline, &mut args)?),
            "--nsTo" => options.ns_to.push(take_value(&flag, inline, &mut args)?),
            "--drop" => options.drop = true,
            "--dryRun" => options.dry_run = true,
            "--oplogReplay" => options.oplog_replay = true,
            "--oplogLimit" => options.oplog_limit = Some(parse_oplog_limit(&take_value(&flag, inline, &mut args)?)?),
            "--oplogFile" => options.oplog_file = Some(take_value(&flag, inline, &mut args)?),
            "--preserveUUID" => options.preserve_uuid = true,
            "--keepIndexVersion" => options.keep_index_version = true,
            "--convertLegacyIndexes" => options.convert_legacy_indexes = true,
            "--fixDottedHashedIndexes" => options.fix_dotted_hashed_indexes = true,
            "--noIndexRestore" => options.no_index_restore = true,
            "--noOptionsRestore" => options.no_options_restore = true,
            "--bypassDocumentValidation" => options.bypass_document_validation = true,
            "--maintainInsertionOrder" => options.maintain_insertion_order = true,
            "--stopOnError" => options.stop_on_error = true,
            "--numInsertionWorkers" => {
                options.num_insertion_workers = parse_usize(&flag, &take_value(&flag, inline, &mut args)?)?
            }
            "--numParallelCollections" => {
                options.num_parallel_collections = parse_usize(&flag, &take_value(&flag, inline, &mut args)?)?
            }
            "--restoreDBUsersAndRoles" => options.restore_db_users_and_roles = true,
            other => return Err(format!("unrecognized flag: {other}")),
        }
    }

    Ok(options)
}

fn take_value<I: Iterator<Item = String>>(
    flag: &str,
    inline: Option<String>,
    args: &mut Peekable<I>,
) -> Result<String, String> {
    inline.or_else(|| args.next()).ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_usize(flag: &str, raw: &str) -> Result<usize, String> {
    raw.parse().map_err(|_| format!("{flag} expects an integer, got '{raw}'"))
}

/// `T[:I]` — a BSON timestamp's seconds, optionally followed by its
/// ordinal. A missing ordinal defaults to 0.
fn parse_oplog_limit(raw: &str) -> Result<(u32, u32), String> {
    let mut parts = raw.splitn(2, ':');
    let t: u32 = parts
        .next()
        .ok_or_else(|| "oplogLimit requires T[:I]".to_string())?
        .parse()
        .map_err(|_| format!("oplogLimit seconds must be an integer, got '{raw}'"))?;
    let i: u32 = match parts.next() {
        Some(i) => i.parse().map_err(|_| format!("oplogLimit ordinal must be an integer, got '{raw}'"))?,
        None => 0,
    };
    Ok((t, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_a_directory_restore_with_filters() {
        let options = parse(args(&["--dir", "/dump", "--nsExclude", "db1.c1", "--drop"]).into_iter()).unwrap();
        assert_eq!(options.dir.as_deref(), Some("/dump"));
        assert_eq!(options.ns_exclude, vec!["db1.c1".to_string()]);
        assert!(options.drop);
    }

    #[test]
    fn parses_equals_form_and_oplog_limit() {
        let options = parse(args(&["--archive=/dump.archive", "--oplogLimit=1700000000:3"]).into_iter()).unwrap();
        assert_eq!(options.archive.as_deref(), Some("/dump.archive"));
        assert_eq!(options.oplog_limit, Some((1700000000, 3)));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse(args(&["--bogus"]).into_iter()).is_err());
    }

    #[test]
    fn rejects_missing_values() {
        assert!(parse(args(&["--dir"]).into_iter()).is_err());
    }

    #[test]
    fn repeatable_flags_accumulate() {
        let options =
            parse(args(&["--dir", "/d", "--nsFrom", "a.b", "--nsTo", "c.d", "--nsFrom", "e.f", "--nsTo", "g.h"]).into_iter())
                .unwrap();
        assert_eq!(options.ns_from, vec!["a.b".to_string(), "e.f".to_string()]);
        assert_eq!(options.ns_to, vec!["c.d".to_string(), "g.h".to_string()]);
    }
}
