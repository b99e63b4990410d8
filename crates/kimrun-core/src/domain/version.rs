//! Version numbers and version-range constraints.
//!
//! Constraint grammar: comma-separated clauses `OP VERSION` where `OP` is one
//! of `>=`, `>`, `<=`, `<`, `=`, or absent. A bare `X.Y` means
//! `>= X.Y.0, < (X+1).0.0`. Every constraint denotes a single interval.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::MetadataError;

/// `major[.minor[.patch]]`, missing components are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    fn next_major(&self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }
}

impl FromStr for Version {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if trimmed.is_empty() || parts.len() > 3 {
            return Err(MetadataError::InvalidVersion(s.to_string()));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| MetadataError::InvalidVersion(s.to_string()))?;
        }
        Ok(Version::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for Version {
    type Error = MetadataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Unbounded,
    Included(Version),
    Excluded(Version),
}

impl Bound {
    fn version(&self) -> Option<Version> {
        match self {
            Bound::Unbounded => None,
            Bound::Included(v) | Bound::Excluded(v) => Some(*v),
        }
    }

    /// The more restrictive of two lower bounds.
    fn tighter_lower(self, other: Bound) -> Bound {
        match (self.version(), other.version()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) => match a.cmp(&b) {
                Ordering::Greater => self,
                Ordering::Less => other,
                Ordering::Equal if matches!(other, Bound::Excluded(_)) => other,
                Ordering::Equal => self,
            },
        }
    }

    /// The more restrictive of two upper bounds.
    fn tighter_upper(self, other: Bound) -> Bound {
        match (self.version(), other.version()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) => match a.cmp(&b) {
                Ordering::Less => self,
                Ordering::Greater => other,
                Ordering::Equal if matches!(other, Bound::Excluded(_)) => other,
                Ordering::Equal => self,
            },
        }
    }
}

fn non_empty(lower: Bound, upper: Bound) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Included(a), Bound::Included(b)) => a <= b,
        (Bound::Included(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => a < b,
    }
}

/// A version range such as `2.1` or `>=2.0, <3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionConstraint {
    raw: String,
    lower: Bound,
    upper: Bound,
}

impl VersionConstraint {
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let invalid = |reason: &str| MetadataError::InvalidConstraint {
            constraint: text.to_string(),
            reason: reason.to_string(),
        };

        let mut lower = Bound::Unbounded;
        let mut upper = Bound::Unbounded;
        let mut clauses = 0;

        for clause in text.split(',').map(str::trim) {
            if clause.is_empty() {
                return Err(invalid("empty clause"));
            }
            clauses += 1;

            let (op, rest) = split_operator(clause);
            let version: Version = rest
                .parse()
                .map_err(|_| invalid(&format!("bad version in '{clause}'")))?;

            match op {
                ">=" => lower = lower.tighter_lower(Bound::Included(version)),
                ">" => lower = lower.tighter_lower(Bound::Excluded(version)),
                "<=" => upper = upper.tighter_upper(Bound::Included(version)),
                "<" => upper = upper.tighter_upper(Bound::Excluded(version)),
                "=" => {
                    lower = lower.tighter_lower(Bound::Included(version));
                    upper = upper.tighter_upper(Bound::Included(version));
                }
                _ => {
                    lower = lower.tighter_lower(Bound::Included(version));
                    upper = upper.tighter_upper(Bound::Excluded(version.next_major()));
                }
            }
        }

        if clauses == 0 {
            return Err(invalid("no clauses"));
        }
        if !non_empty(lower, upper) {
            return Err(invalid("empty range"));
        }

        Ok(Self {
            raw: text.trim().to_string(),
            lower,
            upper,
        })
    }

    /// Whether `version` lies inside the range.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        let above = match self.lower {
            Bound::Unbounded => true,
            Bound::Included(v) => *version >= v,
            Bound::Excluded(v) => *version > v,
        };
        let below = match self.upper {
            Bound::Unbounded => true,
            Bound::Included(v) => *version <= v,
            Bound::Excluded(v) => *version < v,
        };
        above && below
    }

    /// Whether some version satisfies both constraints.
    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        let lower = self.lower.tighter_lower(other.lower);
        let upper = self.upper.tighter_upper(other.upper);
        non_empty(lower, upper)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn split_operator(clause: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "="] {
        if let Some(rest) = clause.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("", clause)
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = MetadataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        VersionConstraint::parse(&s)
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        VersionConstraint::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_pads_components() {
        assert_eq!(v("2"), Version::new(2, 0, 0));
        assert_eq!(v("2.1"), Version::new(2, 1, 0));
        assert_eq!(v("2.1.3"), Version::new(2, 1, 3));
        assert!("".parse::<Version>().is_err());
        assert!("2.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn test_bare_version_is_compatible_range() {
        let range = c("2.1");
        assert!(range.satisfied_by(&v("2.1")));
        assert!(range.satisfied_by(&v("2.9.9")));
        assert!(!range.satisfied_by(&v("2.0.9")));
        assert!(!range.satisfied_by(&v("3.0")));
    }

    #[test]
    fn test_explicit_clauses() {
        let range = c(">=2.0, <2.2");
        assert!(range.satisfied_by(&v("2.1.5")));
        assert!(!range.satisfied_by(&v("2.2")));

        let exact = c("=1.6.3");
        assert!(exact.satisfied_by(&v("1.6.3")));
        assert!(!exact.satisfied_by(&v("1.6.4")));

        let open = c(">1.0");
        assert!(!open.satisfied_by(&v("1.0")));
        assert!(open.satisfied_by(&v("17.0")));
    }

    #[test]
    fn test_overlap() {
        assert!(c("2.1").overlaps(&c(">=2.0")));
        assert!(c("2").overlaps(&c("2.2")));
        assert!(!c("2.1").overlaps(&c(">=2.0, <2.1")));
        assert!(!c("1.6").overlaps(&c("2.0")));
        assert!(c("<=2.0").overlaps(&c(">=2.0")));
        assert!(!c("<2.0").overlaps(&c(">=2.0")));
    }

    #[test]
    fn test_invalid_constraints() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse(">=2.0,").is_err());
        assert!(VersionConstraint::parse(">=abc").is_err());
        let err = VersionConstraint::parse(">=3, <2").unwrap_err();
        assert!(err.to_string().contains("empty range"));
    }

    #[test]
    fn test_display_keeps_raw_text() {
        assert_eq!(c(" >=2.0, <3 ").to_string(), ">=2.0, <3");
    }
}
