//! Frontier path reduction.

use std::collections::BTreeSet;

/// Collapse a set of tree paths to its deepest known paths.
///
/// Exact duplicates are removed (the same directory can be discovered via
/// multiple parents' responses), and any path that is a strict
/// path-segment prefix of another is dropped: when both `"src"` and
/// `"src/lib"` are present, the deeper path means `"src"`'s children are
/// already tracked more precisely, and expanding both would duplicate
/// work. Plain string prefixes across unrelated names are kept - `"a"`
/// survives next to `"ab"`. The empty path is the tree root and counts as
/// a prefix of every other path.
///
/// Output is lexically sorted for deterministic ordering.
pub fn reduce<I, P>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: Into<String>,
{
    let set: BTreeSet<String> = paths.into_iter().map(Into::into).collect();

    set.iter()
        .filter(|path| !has_descendant(&set, path))
        .cloned()
        .collect()
}

/// True when `set` holds a path strictly below `path`.
fn has_descendant(set: &BTreeSet<String>, path: &str) -> bool {
    if path.is_empty() {
        return set.iter().any(|other| !other.is_empty());
    }

    // Descendants of "a" sort contiguously from "a/": everything in
    // ["a/", "a0") starts with "a/", so one range probe suffices.
    let child_prefix = format!("{path}/");
    set.range(child_prefix.clone()..)
        .next()
        .is_some_and(|candidate| candidate.starts_with(&child_prefix))
}
