// src/version/mod.rs

//! Version handling for Debian/Termux package versions
//!
//! Versions follow the dpkg format `[epoch:]upstream[-revision]` and are
//! ordered with the dpkg comparison algorithm:
//! - epochs compare numerically and dominate everything else
//! - upstream and revision are compared as alternating non-digit and digit runs
//! - `~` sorts before anything, including the end of the string, so
//!   `1.0~rc1 < 1.0`
//!
//! Empty version strings sort below every non-empty version.

use std::cmp::Ordering;
use std::fmt;

/// A parsed Debian version with epoch, upstream and revision components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebVersion {
    /// Epoch digits with leading zeros stripped ("" means 0)
    pub epoch: String,
    pub upstream: String,
    pub revision: Option<String>,
}

impl DebVersion {
    /// Parse a Debian version string
    ///
    /// Parsing never fails. A non-numeric prefix before `:` is treated as part
    /// of the upstream version rather than as an epoch.
    ///
    /// Examples:
    /// - "1.2.3" → epoch=0, upstream="1.2.3", revision=None
    /// - "2:1.2.3" → epoch=2, upstream="1.2.3", revision=None
    /// - "1.2.3-4" → epoch=0, upstream="1.2.3", revision=Some("4")
    /// - "1:2.3.4-5~bpo1" → epoch=1, upstream="2.3.4", revision=Some("5~bpo1")
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) if e.bytes().all(|b| b.is_ascii_digit()) => {
                (e.trim_start_matches('0').to_string(), r)
            }
            _ => (String::new(), s),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((u, r)) => (u.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        Self {
            epoch,
            upstream,
            revision,
        }
    }

    fn is_empty(&self) -> bool {
        self.epoch.is_empty() && self.upstream.is_empty() && self.revision.is_none()
    }

    /// Compare two Debian versions
    pub fn compare(&self, other: &DebVersion) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        match compare_digit_runs(self.epoch.as_bytes(), other.epoch.as_bytes()) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match compare_fragment(&self.upstream, &other.upstream) {
            Ordering::Equal => {}
            ord => return ord,
        }

        compare_fragment(
            self.revision.as_deref().unwrap_or(""),
            other.revision.as_deref().unwrap_or(""),
        )
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.epoch.is_empty() {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if let Some(ref revision) = self.revision {
            write!(f, "-{}", revision)?;
        }
        Ok(())
    }
}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two raw version strings in Debian order
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    DebVersion::parse(a).compare(&DebVersion::parse(b))
}

/// Sort weight of one byte inside a non-digit run.
///
/// `None` is the end of the string. Digits and the end weigh 0, `~` weighs
/// below zero, letters weigh their code point, everything else sorts after
/// all letters.
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

/// Compare two digit sequences numerically without parsing them into integers
fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let strip = |s: &[u8]| {
        let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
        s[start..].to_vec()
    };
    let (a, b) = (strip(a), strip(b));
    a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
}

/// dpkg's `verrevcmp` over one version fragment (upstream or revision)
fn compare_fragment(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        let a_start = i;
        while i < a.len() && a[i].is_ascii_digit() {
            i += 1;
        }
        let b_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }

        match compare_digit_runs(&a[a_start..i], &b[b_start..j]) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deb_version_parse_simple() {
        let v = DebVersion::parse("1.2.3");
        assert_eq!(v.epoch, "");
        assert_eq!(v.upstream, "1.2.3");
        assert_eq!(v.revision, None);
    }

    #[test]
    fn test_deb_version_parse_full() {
        let v = DebVersion::parse("1:2.3.4-5~bpo1");
        assert_eq!(v.epoch, "1");
        assert_eq!(v.upstream, "2.3.4");
        assert_eq!(v.revision, Some("5~bpo1".to_string()));
    }

    #[test]
    fn test_deb_version_parse_revision_splits_on_last_dash() {
        let v = DebVersion::parse("1.0-beta-2");
        assert_eq!(v.upstream, "1.0-beta");
        assert_eq!(v.revision, Some("2".to_string()));
    }

    #[test]
    fn test_non_numeric_epoch_is_upstream() {
        let v = DebVersion::parse("abc:1.0");
        assert_eq!(v.epoch, "");
        assert_eq!(v.upstream, "abc:1.0");
    }

    #[test]
    fn test_shorter_version_sorts_first() {
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.1", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_epoch_dominates() {
        assert_eq!(compare_versions("2:1.0", "1:9.9"), Ordering::Greater);
        assert_eq!(compare_versions("1:0.1", "9.9"), Ordering::Greater);
        assert_eq!(compare_versions("0:1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_huge_epoch_does_not_overflow() {
        assert_eq!(
            compare_versions("99999999999999999999999:1.0", "99999999999999999999998:1.0"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_tilde_sorts_before_release() {
        assert_eq!(compare_versions("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0~~", "1.0~"), Ordering::Less);
        assert_eq!(compare_versions("1.0~rc1", "1.0~rc2"), Ordering::Less);
    }

    #[test]
    fn test_letters_sort_before_punctuation() {
        assert_eq!(compare_versions("1.0a", "1.0+"), Ordering::Less);
        assert_eq!(compare_versions("1.0a", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_numeric_runs_ignore_leading_zeros() {
        assert_eq!(compare_versions("1.002", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_revision_comparison() {
        assert_eq!(compare_versions("8.2.0-1", "8.2.0-2"), Ordering::Less);
        assert_eq!(compare_versions("8.2.0", "8.2.0-0"), Ordering::Equal);
        assert_eq!(compare_versions("8.2.0-10", "8.2.0-9"), Ordering::Greater);
    }

    #[test]
    fn test_empty_sorts_lowest() {
        assert_eq!(compare_versions("", ""), Ordering::Equal);
        assert_eq!(compare_versions("", "~"), Ordering::Less);
        assert_eq!(compare_versions("0", ""), Ordering::Greater);
    }

    #[test]
    fn test_deb_version_display() {
        assert_eq!(DebVersion::parse("1.2.3").to_string(), "1.2.3");
        assert_eq!(DebVersion::parse("2:1.2.3-4").to_string(), "2:1.2.3-4");
    }

    fn version_string() -> impl Strategy<Value = String> {
        "([0-9]{1,2}:)?[0-9a-z.+~]{0,6}(-[0-9a-z.~]{1,3})?"
    }

    proptest! {
        #[test]
        fn test_compare_is_antisymmetric(a in version_string(), b in version_string()) {
            prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
        }

        #[test]
        fn test_equality_is_transitive(
            a in version_string(),
            b in version_string(),
            c in version_string(),
        ) {
            if compare_versions(&a, &b) == Ordering::Equal
                && compare_versions(&b, &c) == Ordering::Equal
            {
                prop_assert_eq!(compare_versions(&a, &c), Ordering::Equal);
            }
        }

        #[test]
        fn test_compare_is_reflexive(a in version_string()) {
            prop_assert_eq!(compare_versions(&a, &a), Ordering::Equal);
        }
    }
}
