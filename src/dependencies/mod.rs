// src/dependencies/mod.rs

//! Dependency field parsing and constraint evaluation
//!
//! Parses Debian-style `Depends:` and `Provides:` fields:
//!
//! ```text
//! Depends: libc++ (>= 25b), zlib | zlib-ng, libandroid-support
//! ```
//!
//! Comma-separated groups must all be satisfied; `|`-separated atoms inside a
//! group are alternatives, the first one being the primary choice. Parsing is
//! total: malformed atoms are dropped and the rest of the field survives.

use crate::version::compare_versions;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Relational operator of a version constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintOp {
    /// `=`
    Equal,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
    /// `>>`
    StrictlyGreater,
    /// `<<`
    StrictlyLess,
}

impl ConstraintOp {
    /// Parse an operator token
    ///
    /// The deprecated single-character forms `<` and `>` mean `<=` and `>=`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Equal),
            ">=" | ">" => Some(Self::GreaterOrEqual),
            "<=" | "<" => Some(Self::LessOrEqual),
            ">>" => Some(Self::StrictlyGreater),
            "<<" => Some(Self::StrictlyLess),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::StrictlyGreater => ">>",
            Self::StrictlyLess => "<<",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::GreaterOrEqual => ordering != Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
            Self::StrictlyGreater => ordering == Ordering::Greater,
            Self::StrictlyLess => ordering == Ordering::Less,
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version requirement such as `(>= 1.2)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionConstraint {
    pub op: ConstraintOp,
    pub version: String,
}

impl VersionConstraint {
    pub fn new(op: ConstraintOp, version: impl Into<String>) -> Self {
        Self {
            op,
            version: version.into(),
        }
    }

    /// Parse the inside of a parenthesised constraint, e.g. `>= 1.2`
    ///
    /// Returns `None` for an unknown operator or a missing version.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let op_len = s
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(s.len());
        let (op, version) = s.split_at(op_len);
        let version = version.trim();
        if version.is_empty() || version.contains(char::is_whitespace) {
            return None;
        }
        ConstraintOp::parse(op).map(|op| Self::new(op, version))
    }

    /// Check whether a candidate version satisfies this constraint
    pub fn is_satisfied_by(&self, candidate: &str) -> bool {
        self.op.accepts(compare_versions(candidate, &self.version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {})", self.op, self.version)
    }
}

/// Evaluate an optional constraint; an absent constraint is always satisfied
pub fn is_satisfied(constraint: Option<&VersionConstraint>, candidate: &str) -> bool {
    constraint.is_none_or(|c| c.is_satisfied_by(candidate))
}

/// One named requirement with an optional version constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyAtom {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl DependencyAtom {
    pub fn new(name: impl Into<String>, constraint: Option<VersionConstraint>) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Parse a single atom such as `libc++ (>= 25b)` or `python:any`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (name_part, rest) = match s.find('(') {
            Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
            None => (s, None),
        };

        let name = name_part.split_whitespace().next()?;
        // Multiarch qualifier: "foo:any" names the package "foo"
        let name = name.split(':').next().unwrap_or(name);
        if name.is_empty() || !name.chars().all(is_name_char) {
            debug!("Skipping malformed dependency atom: {:?}", s);
            return None;
        }

        let constraint = rest.and_then(|r| {
            let inner = r.split(')').next().unwrap_or(r);
            let parsed = VersionConstraint::parse(inner);
            if parsed.is_none() {
                debug!("Ignoring unparsable constraint in {:?}", s);
            }
            parsed
        });

        Some(Self::new(name, constraint))
    }

    /// Check a candidate version against this atom's constraint
    pub fn accepts_version(&self, version: &str) -> bool {
        is_satisfied(self.constraint.as_ref(), version)
    }
}

impl fmt::Display for DependencyAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{} {}", self.name, c),
            None => f.write_str(&self.name),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_')
}

/// An ordered list of alternatives; satisfied when any atom is satisfied
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlternativeGroup {
    pub atoms: Vec<DependencyAtom>,
}

impl AlternativeGroup {
    /// The preferred alternative
    pub fn primary(&self) -> &DependencyAtom {
        &self.atoms[0]
    }

    /// Alternatives after the primary, in declaration order
    pub fn fallbacks(&self) -> &[DependencyAtom] {
        &self.atoms[1..]
    }
}

impl fmt::Display for AlternativeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}

/// A dependency expression: all groups must hold
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyExpr {
    pub groups: Vec<AlternativeGroup>,
}

impl DependencyExpr {
    pub fn single(group: AlternativeGroup) -> Self {
        Self {
            groups: vec![group],
        }
    }
}

impl fmt::Display for DependencyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", group)?;
        }
        Ok(())
    }
}

/// Parse one `|`-separated group, dropping malformed atoms
fn parse_group(s: &str) -> Option<AlternativeGroup> {
    let atoms: Vec<DependencyAtom> = s.split('|').filter_map(DependencyAtom::parse).collect();
    if atoms.is_empty() {
        None
    } else {
        Some(AlternativeGroup { atoms })
    }
}

/// Parse a `Depends:` field into dependency expressions
///
/// Each comma-separated group becomes one expression, in declaration order.
/// Groups naming the same package are all kept, so a range such as
/// `lib (>= 2), lib (<< 3)` checks both bounds; only exact repeats are
/// dropped. An absent or empty field yields nothing.
pub fn parse_depends(field: Option<&str>) -> Vec<DependencyExpr> {
    let Some(field) = field else {
        return Vec::new();
    };

    let mut exprs: Vec<DependencyExpr> = Vec::new();
    for group in field.split(',').filter_map(parse_group) {
        let expr = DependencyExpr::single(group);
        if !exprs.contains(&expr) {
            exprs.push(expr);
        }
    }
    exprs
}

/// Parse a `Provides:` field into the set of virtual names it declares
///
/// Version qualifiers on provides are accepted by the grammar but ignored.
pub fn parse_provides(field: Option<&str>) -> BTreeSet<String> {
    field
        .map(|f| {
            f.split(',')
                .flat_map(|g| g.split('|'))
                .filter_map(DependencyAtom::parse)
                .map(|atom| atom.name)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple_depends() {
        let deps = parse_depends(Some("libc++, zlib"));
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].groups[0].primary().name, "libc++");
        assert_eq!(deps[1].groups[0].primary().name, "zlib");
        assert!(deps[0].groups[0].primary().constraint.is_none());
    }

    #[test]
    fn test_parse_constraint_and_alternatives() {
        let deps = parse_depends(Some("  glib (>= 2.80.0) |  glib-static ,libandroid-shmem"));
        assert_eq!(deps.len(), 2);

        let group = &deps[0].groups[0];
        assert_eq!(group.atoms.len(), 2);
        assert_eq!(
            group.primary().constraint,
            Some(VersionConstraint::new(ConstraintOp::GreaterOrEqual, "2.80.0"))
        );
        assert_eq!(group.fallbacks()[0].name, "glib-static");
    }

    #[test]
    fn test_parse_all_operators() {
        for (text, op) in [
            ("=", ConstraintOp::Equal),
            (">=", ConstraintOp::GreaterOrEqual),
            ("<=", ConstraintOp::LessOrEqual),
            (">>", ConstraintOp::StrictlyGreater),
            ("<<", ConstraintOp::StrictlyLess),
        ] {
            let atom = DependencyAtom::parse(&format!("pkg ({} 1.0)", text)).unwrap();
            assert_eq!(atom.constraint.unwrap().op, op);
        }
    }

    #[test]
    fn test_constraint_without_space() {
        let atom = DependencyAtom::parse("pkg (>=1.0-2)").unwrap();
        assert_eq!(
            atom.constraint,
            Some(VersionConstraint::new(ConstraintOp::GreaterOrEqual, "1.0-2"))
        );
    }

    #[test]
    fn test_unknown_operator_is_unconstrained() {
        let atom = DependencyAtom::parse("pkg (~= 1.0)").unwrap();
        assert_eq!(atom.name, "pkg");
        assert!(atom.constraint.is_none());
    }

    #[test]
    fn test_multiarch_qualifier_stripped() {
        let atom = DependencyAtom::parse("python:any (>= 3.11)").unwrap();
        assert_eq!(atom.name, "python");
    }

    #[test]
    fn test_malformed_atoms_are_skipped() {
        let deps = parse_depends(Some("good, (>= 1.0), , | , also-good | ???"));
        let names: Vec<_> = deps.iter().map(|d| d.groups[0].primary().name.as_str()).collect();
        assert_eq!(names, vec!["good", "also-good"]);
        assert_eq!(deps[1].groups[0].atoms.len(), 1);
    }

    #[test]
    fn test_empty_and_absent_fields() {
        assert!(parse_depends(None).is_empty());
        assert!(parse_depends(Some("")).is_empty());
        assert!(parse_depends(Some("   ")).is_empty());
        assert!(parse_provides(None).is_empty());
    }

    #[test]
    fn test_range_dependency_keeps_both_bounds() {
        let deps = parse_depends(Some("lib (>= 2), b, lib (<< 3), b"));
        assert_eq!(deps.len(), 3);

        let lower = deps[0].groups[0].primary();
        assert_eq!(lower.name, "lib");
        assert_eq!(lower.constraint.as_ref().unwrap().version, "2");
        assert_eq!(deps[1].groups[0].primary().name, "b");
        let upper = deps[2].groups[0].primary();
        assert_eq!(upper.name, "lib");
        assert_eq!(upper.constraint.as_ref().unwrap().version, "3");
    }

    #[test]
    fn test_parse_provides_ignores_versions() {
        let provides = parse_provides(Some("libgcc (= 1.0), virtual-shell, awk"));
        let expected: BTreeSet<String> =
            ["libgcc", "virtual-shell", "awk"].iter().map(|s| s.to_string()).collect();
        assert_eq!(provides, expected);
    }

    #[test]
    fn test_constraint_satisfaction() {
        let c = VersionConstraint::new(ConstraintOp::GreaterOrEqual, "1.2");
        assert!(c.is_satisfied_by("1.2"));
        assert!(c.is_satisfied_by("1.10"));
        assert!(!c.is_satisfied_by("1.2~rc1"));

        let c = VersionConstraint::new(ConstraintOp::StrictlyLess, "2:0");
        assert!(c.is_satisfied_by("1:99"));
        assert!(!c.is_satisfied_by("2:0"));

        let c = VersionConstraint::new(ConstraintOp::StrictlyGreater, "1.0");
        assert!(c.is_satisfied_by("1.0.1"));
        assert!(!c.is_satisfied_by("1.0"));

        let c = VersionConstraint::new(ConstraintOp::Equal, "1.0-1");
        assert!(c.is_satisfied_by("0:1.0-1"));
        assert!(!c.is_satisfied_by("1.0-2"));

        assert!(is_satisfied(None, ""));
    }

    #[test]
    fn test_display_round_trip_text() {
        let deps = parse_depends(Some("a (>= 1.0) | b"));
        assert_eq!(deps[0].to_string(), "a (>= 1.0) | b");
    }

    proptest! {
        #[test]
        fn test_parse_depends_is_total(field in ".{0,64}") {
            let _ = parse_depends(Some(&field));
            let _ = parse_provides(Some(&field));
        }

        #[test]
        fn test_parsed_groups_are_never_empty(field in "[a-z(),|<>= .0-9]{0,48}") {
            for expr in parse_depends(Some(&field)) {
                prop_assert!(!expr.groups.is_empty());
                for group in &expr.groups {
                    prop_assert!(!group.atoms.is_empty());
                }
            }
        }
    }
}
