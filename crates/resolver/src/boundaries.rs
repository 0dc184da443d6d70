//! Sharing boundary analysis
//!
//! A part's required boundaries are its own sharing boundary, the ones it
//! declares, and everything its dependencies require, except boundaries a
//! factory import opens on the way:
//!
//! ```text
//! required(p) = declared(p) ∪ own(p)
//!             ∪ ⋃ { required(q) - created(i) | import i of p bound to q }
//! ```
//!
//! Each factory import that opens boundary `X` is a nesting path for `X`:
//! scopes created through it can see `required(owner) ∪ created(i)`.

use mosaic_core::{CreationPolicy, PartDescriptor};
use mosaic_runtime::ExportRef;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Fixpoint of required boundaries for live parts (dead parts get empty sets)
pub(crate) fn required_boundaries(
    parts: &[Arc<PartDescriptor>],
    live: &[bool],
    satisfying: &[Vec<Vec<ExportRef>>],
) -> Vec<BTreeSet<String>> {
    let mut required: Vec<BTreeSet<String>> = parts
        .iter()
        .enumerate()
        .map(|(p, part)| {
            if !live[p] {
                return BTreeSet::new();
            }
            let mut set: BTreeSet<String> = part.required_boundaries.iter().cloned().collect();
            if let Some(own) = part.creation_policy.boundary() {
                set.insert(own.to_string());
            }
            set
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (p, part) in parts.iter().enumerate() {
            if !live[p] {
                continue;
            }
            for (k, import) in part.imports.iter().enumerate() {
                let created = import.created_boundaries();
                for target in &satisfying[p][k] {
                    let inherited: Vec<String> = required[target.part]
                        .iter()
                        .filter(|b| !created.contains(b))
                        .cloned()
                        .collect();
                    for boundary in inherited {
                        changed |= required[p].insert(boundary);
                    }
                }
            }
        }
    }
    required
}

/// Boundary consistency problems, as `(part, reason)` pairs
pub(crate) fn check_boundaries(
    parts: &[Arc<PartDescriptor>],
    live: &[bool],
    required: &[BTreeSet<String>],
) -> Vec<(usize, String)> {
    // boundary -> boundaries visible in scopes opened for it, one entry per path
    let mut paths: BTreeMap<&str, Vec<BTreeSet<String>>> = BTreeMap::new();
    for (p, part) in parts.iter().enumerate() {
        if !live[p] {
            continue;
        }
        for import in &part.imports {
            let created = import.created_boundaries();
            for boundary in created {
                let mut visible = required[p].clone();
                visible.extend(created.iter().cloned());
                paths.entry(boundary.as_str()).or_default().push(visible);
            }
        }
    }

    let mut problems = Vec::new();
    for (p, part) in parts.iter().enumerate() {
        if !live[p] {
            continue;
        }

        if part.creation_policy == CreationPolicy::shared() && !required[p].is_empty() {
            problems.push((
                p,
                format!(
                    "shared at the root but requires boundaries {}",
                    join(&required[p])
                ),
            ));
        }

        for boundary in &required[p] {
            if !paths.contains_key(boundary.as_str()) {
                problems.push((
                    p,
                    format!(
                        "requires boundary '{}' which no factory import introduces",
                        boundary
                    ),
                ));
            }
        }

        let Some(own) = part.creation_policy.boundary() else {
            continue;
        };
        let Some(own_paths) = paths.get(own) else {
            continue;
        };
        let outer: BTreeSet<String> = required[p].iter().filter(|b| *b != own).cloned().collect();
        let satisfied: Vec<bool> = own_paths.iter().map(|v| outer.is_subset(v)).collect();
        if satisfied.iter().all(|s| !s) {
            problems.push((
                p,
                format!(
                    "requires boundaries {} that no path introducing '{}' provides",
                    join(&outer),
                    own
                ),
            ));
        } else if satisfied.iter().any(|s| !s) {
            problems.push((
                p,
                format!(
                    "nesting paths introducing '{}' disagree on boundaries {}",
                    own,
                    join(&outer)
                ),
            ));
        }
    }
    problems
}

fn join(set: &BTreeSet<String>) -> String {
    let names: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("{{{}}}", names.join(", "))
}
