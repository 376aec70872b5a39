// src/resolver/conflict.rs

//! Warning types for dependency resolution
//!
//! Resolution problems below the initial package list never abort a run;
//! they are collected in a [`ResolutionReport`] and shown to the user with
//! the final status.

use crate::dependencies::{AlternativeGroup, VersionConstraint};

/// A non-fatal problem found while resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// No alternative of a dependency group exists in the index
    Unresolved {
        required_by: String,
        group: AlternativeGroup,
    },
    /// A dependency of a selected package is not met by the final set
    Conflict {
        package: String,
        requirement: String,
        constraint: Option<VersionConstraint>,
    },
}

impl ResolutionWarning {
    /// Name of the package whose dependency failed
    pub fn dependent(&self) -> &str {
        match self {
            ResolutionWarning::Unresolved { required_by, .. } => required_by,
            ResolutionWarning::Conflict { package, .. } => package,
        }
    }
}

impl std::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionWarning::Unresolved { required_by, group } => write!(
                f,
                "Warning: Could not resolve dependency: {} (required by {})",
                group, required_by
            ),
            ResolutionWarning::Conflict {
                package,
                requirement,
                constraint,
            } => {
                write!(f, "Conflict detected: Package '{}' depends on '{}", package, requirement)?;
                if let Some(c) = constraint {
                    write!(f, " {}", c)?;
                }
                write!(
                    f,
                    "', which could not be satisfied by the selected package set."
                )
            }
        }
    }
}

/// Ordered warnings accumulated during one resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    warnings: Vec<ResolutionWarning>,
}

impl ResolutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ResolutionWarning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Rendered warning lines in encounter order
    pub fn messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}
