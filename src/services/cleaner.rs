use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::table::cell::CellKey;
use crate::table::Table;

/// Drop rows with any missing value, then drop exact duplicate rows
///
/// Surviving rows keep their relative order; the first occurrence of a
/// duplicated row is the one kept.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn clean(mut table: Table) -> Table {
    let before = table.len();

    table.retain_rows(|row| !row.iter().any(|cell| cell.is_missing()));
    let incomplete = before - table.len();

    let complete = table.len();
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(complete);
    let keep: Vec<bool> = table
        .rows()
        .iter()
        .map(|row| seen.insert(row.iter().map(|cell| cell.key()).collect()))
        .collect();
    drop(seen);

    let mut flags = keep.into_iter();
    table.retain_rows(|_| flags.next().unwrap_or(false));
    let duplicates = complete - table.len();

    debug!(
        "Removed {} incomplete and {} duplicate rows",
        incomplete, duplicates
    );
    info!("Cleaned table: {} of {} rows kept", table.len(), before);
    table
}
