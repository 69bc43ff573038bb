//! Merging translated entries into an existing values file
//!
//! Merging is keyed by entry key. With overwrite enabled the destination is
//! replaced by the produced entries; otherwise everything already in the
//! destination is kept and only entries it lacks are appended.

use crate::resource::ResourceEntry;
use std::collections::HashSet;

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Final entries, in output order
    pub entries: Vec<ResourceEntry>,
    /// Destination entries kept as they were
    pub preserved: usize,
    /// Produced entries written to the output
    pub appended: usize,
}

/// Merge produced entries with the destination's existing entries
///
/// # Arguments
///
/// * `existing` - Entries already present in the destination, in file order
/// * `produced` - Newly produced entries, in source order
/// * `overwrite` - Replace the destination wholesale instead of merging
///
/// # Returns
///
/// With `overwrite` the output is exactly `produced`. Without it the output is
/// `existing` followed by every produced entry whose key `existing` does not
/// contain; duplicate keys inside `existing` are kept as they are.
pub fn merge_entries(
    existing: &[ResourceEntry],
    produced: Vec<ResourceEntry>,
    overwrite: bool,
) -> MergeOutcome {
    if overwrite {
        let appended = produced.len();
        return MergeOutcome {
            entries: produced,
            preserved: 0,
            appended,
        };
    }

    let existing_keys = existing_keys(existing);
    let missing: Vec<ResourceEntry> = produced
        .into_iter()
        .filter(|entry| !existing_keys.contains(entry.key()))
        .collect();

    let preserved = existing.len();
    let appended = missing.len();
    let mut entries = Vec::with_capacity(preserved + appended);
    entries.extend_from_slice(existing);
    entries.extend(missing);

    MergeOutcome {
        entries,
        preserved,
        appended,
    }
}

/// Keys present in `entries`
pub fn existing_keys(entries: &[ResourceEntry]) -> HashSet<&str> {
    entries.iter().map(ResourceEntry::key).collect()
}
