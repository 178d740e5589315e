//! Collision-safe entry naming
//!
//! Computes the final, pairwise-distinct names to store inside an archive
//! from an ordered list of logical names. Duplicates get a numeric suffix
//! before the extension: `a.txt`, `a (1).txt`, `a (2).txt`. Pure; no I/O.

use std::collections::HashMap;

/// Resolve an ordered list of logical names into final archive names.
///
/// The n-th occurrence of a name is suffixed with its zero-based duplicate
/// count: the first occurrence is kept as-is, later ones become
/// `"{stem} ({count}).{extension}"` (no extension, no trailing dot).
/// Counting is against the *original* names, so suffixes never nest, and
/// comparison is case-sensitive. Output order equals input order.
pub fn resolve_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut resolved = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref();
        let count = occurrences.entry(name).or_insert(0);
        if *count == 0 {
            resolved.push(name.to_string());
        } else {
            resolved.push(suffixed(name, *count));
        }
        *count += 1;
    }

    resolved
}

/// Append the duplicate counter before the extension.
///
/// The extension is everything after the last `.`; a name without a dot
/// gets the suffix appended directly.
fn suffixed(name: &str, count: usize) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{} ({}).{}", &name[..dot], count, &name[dot + 1..]),
        None => format!("{} ({})", name, count),
    }
}
