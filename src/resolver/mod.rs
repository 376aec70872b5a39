// src/resolver/mod.rs

//! Dependency resolution
//!
//! Computes the closure of packages needed to satisfy an initial request by
//! fixpoint iteration over the repository index:
//!
//! 1. Every initial name must resolve to an index entry (directly or through
//!    `Provides`), otherwise resolution fails.
//! 2. The dependency groups of all selected packages are re-examined until an
//!    iteration adds nothing. Unsatisfied groups pull in their primary
//!    alternative, or the first fallback that exists in the index.
//! 3. A verification pass re-checks every group against the final set.
//!
//! Groups that cannot be satisfied become warnings in the
//! [`ResolutionReport`]; they never abort the run. All collections are
//! ordered, so the same index and request always give the same selection
//! and the same warnings in the same order.

pub mod conflict;

pub use conflict::{ResolutionReport, ResolutionWarning};

use crate::dependencies::{parse_depends, AlternativeGroup, DependencyAtom};
use crate::error::{Error, Result};
use crate::repository::{PackageIndex, PackageRecord};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Selected packages keyed by package name
pub type SelectedSet = BTreeMap<String, PackageRecord>;

/// Outcome of a resolution run
#[derive(Debug, Clone)]
pub struct Resolution {
    pub selected: SelectedSet,
    pub report: ResolutionReport,
}

impl Resolution {
    /// Selected package names in name order
    pub fn package_names(&self) -> Vec<&str> {
        self.selected.keys().map(String::as_str).collect()
    }
}

/// Resolver bound to one index snapshot
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a PackageIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a PackageIndex) -> Self {
        Self { index }
    }

    /// Find the index entry that best satisfies an atom
    ///
    /// An exact name match whose version meets the constraint wins; otherwise
    /// the first package providing the name is used. Provides are unversioned,
    /// so the atom's constraint does not apply to providers.
    pub fn find_best_package(&self, atom: &DependencyAtom) -> Option<&'a PackageRecord> {
        if let Some(record) = self.index.get(&atom.name)
            && atom.accepts_version(&record.version)
        {
            return Some(record);
        }
        self.index.find_provider(&atom.name)
    }

    /// Resolve the transitive closure of `initial_names`
    pub fn resolve<S: AsRef<str>>(&self, initial_names: &[S]) -> Result<Resolution> {
        let mut selected = SelectedSet::new();
        let mut report = ResolutionReport::new();

        for name in initial_names {
            let name = name.as_ref();
            let record = self
                .find_best_package(&DependencyAtom::new(name, None))
                .ok_or_else(|| {
                    Error::NotFoundError(format!("Initial package not found: {}", name))
                })?;
            if record.name != name {
                debug!("Initial package {} provided by {}", name, record.name);
            }
            selected.insert(record.name.clone(), record.clone());
        }

        // Groups reported unresolvable, with the package that first required them
        let mut unresolved: BTreeMap<AlternativeGroup, String> = BTreeMap::new();
        let mut iteration = 0;

        loop {
            iteration += 1;
            let mut changed = false;

            for (required_by, group) in collect_groups(&selected) {
                if group_satisfied(&group, &selected) || unresolved.contains_key(&group) {
                    continue;
                }

                match self.pick_alternative(&group) {
                    Some(candidate) => {
                        if !selected.contains_key(&candidate.name) {
                            debug!(
                                "Selected {} {} for '{}' (required by {})",
                                candidate.name, candidate.version, group, required_by
                            );
                            selected.insert(candidate.name.clone(), candidate.clone());
                            changed = true;
                        }
                    }
                    None => {
                        debug!("No candidate for '{}' (required by {})", group, required_by);
                        report.push(ResolutionWarning::Unresolved {
                            required_by: required_by.clone(),
                            group: group.clone(),
                        });
                        unresolved.insert(group, required_by);
                    }
                }
            }

            if !changed {
                break;
            }
        }

        debug!(
            "Dependency fixpoint reached after {} iterations ({} packages)",
            iteration,
            selected.len()
        );

        verify_selection(&selected, &unresolved, &mut report);

        info!(
            "Resolved {} packages with {} warnings",
            selected.len(),
            report.len()
        );

        Ok(Resolution { selected, report })
    }

    /// Primary alternative first, then fallbacks in declaration order
    fn pick_alternative(&self, group: &AlternativeGroup) -> Option<&'a PackageRecord> {
        group
            .atoms
            .iter()
            .find_map(|atom| self.find_best_package(atom))
    }
}

/// Resolve `initial_names` against `index`
pub fn resolve<S: AsRef<str>>(index: &PackageIndex, initial_names: &[S]) -> Result<Resolution> {
    Resolver::new(index).resolve(initial_names)
}

/// Ordered, de-duplicated dependency groups of every selected package
fn collect_groups(selected: &SelectedSet) -> Vec<(String, AlternativeGroup)> {
    let mut seen = BTreeSet::new();
    let mut groups = Vec::new();

    for package in selected.values() {
        for expr in parse_depends(package.depends.as_deref()) {
            for group in expr.groups {
                if seen.insert(group.clone()) {
                    groups.push((package.name.clone(), group));
                }
            }
        }
    }

    groups
}

fn atom_satisfied(atom: &DependencyAtom, selected: &SelectedSet) -> bool {
    if let Some(record) = selected.get(&atom.name)
        && atom.accepts_version(&record.version)
    {
        return true;
    }
    selected.values().any(|p| p.provides_name(&atom.name))
}

/// A group holds when any alternative is selected at an acceptable version,
/// or some selected package provides it
pub fn group_satisfied(group: &AlternativeGroup, selected: &SelectedSet) -> bool {
    group.atoms.iter().any(|atom| atom_satisfied(atom, selected))
}

/// Re-check every dependency of the final selection
///
/// Groups already reported as unresolved are skipped whichever package
/// depends on them, so a missing name yields exactly one warning. Anything
/// else that fails here is a group the index could satisfy but the final
/// set does not.
fn verify_selection(
    selected: &SelectedSet,
    unresolved: &BTreeMap<AlternativeGroup, String>,
    report: &mut ResolutionReport,
) {
    for package in selected.values() {
        for expr in parse_depends(package.depends.as_deref()) {
            for group in &expr.groups {
                if group_satisfied(group, selected) {
                    continue;
                }
                if unresolved.contains_key(group) {
                    continue;
                }
                let primary = group.primary();
                report.push(ResolutionWarning::Conflict {
                    package: package.name.clone(),
                    requirement: primary.name.clone(),
                    constraint: primary.constraint.clone(),
                });
            }
        }
    }
}
