//! Versions and version constraints.
//!
//! Versions are bare `major.minor.patch` triples (`semver::Version` with
//! pre-release and build metadata rejected at every parse boundary).
//! Constraints are closed/open intervals rendered as `"1.0.0 <= v < 2.0.0"`.

use semver::Version;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The version of the running compiler. Outlines declaring anything else are
/// rejected by the details engine.
#[must_use]
pub fn compiler_version() -> Version {
    Version::new(0, 19, 1)
}

/// Invalid version spelling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version '{text}': expected MAJOR.MINOR.PATCH")]
pub struct BadVersion {
    pub text: String,
}

/// Parse a bare `major.minor.patch` version, rejecting pre-release and build
/// metadata.
pub fn parse_version(text: &str) -> Result<Version, BadVersion> {
    let bad = || BadVersion {
        text: text.to_owned(),
    };
    let version = Version::parse(text).map_err(|_| bad())?;
    if version.pre.is_empty() && version.build.is_empty() {
        Ok(version)
    } else {
        Err(bad())
    }
}

/// A bound operator: `v < bound` or `v <= bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    Less,
    LessOrEqual,
}

impl Op {
    fn render(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

/// An interval of versions: `lower  lower_op  v  upper_op  upper`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constraint {
    pub lower: Version,
    pub lower_op: Op,
    pub upper_op: Op,
    pub upper: Version,
}

impl Constraint {
    /// The constraint admitting exactly one version.
    #[must_use]
    pub fn exactly(version: Version) -> Self {
        Self {
            lower: version.clone(),
            lower_op: Op::LessOrEqual,
            upper_op: Op::LessOrEqual,
            upper: version,
        }
    }

    /// The constraint admitting every version from 1.0.0 up.
    #[must_use]
    pub fn anything() -> Self {
        Self {
            lower: Version::new(1, 0, 0),
            lower_op: Op::LessOrEqual,
            upper_op: Op::LessOrEqual,
            upper: Version::new(u64::MAX, u64::MAX, u64::MAX),
        }
    }

    /// The conventional range for a fresh dependency on `version`: up to but
    /// excluding the next major.
    #[must_use]
    pub fn until_next_major(version: &Version) -> Self {
        Self {
            lower: version.clone(),
            lower_op: Op::LessOrEqual,
            upper_op: Op::Less,
            upper: Version::new(version.major + 1, 0, 0),
        }
    }

    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        let above = match self.lower_op {
            Op::Less => *version > self.lower,
            Op::LessOrEqual => *version >= self.lower,
        };
        let below = match self.upper_op {
            Op::Less => *version < self.upper,
            Op::LessOrEqual => *version <= self.upper,
        };
        above && below
    }

    /// Whether this constraint admits the running compiler.
    #[must_use]
    pub fn admits_compiler(&self) -> bool {
        self.satisfies(&compiler_version())
    }

    /// Intersect two constraints, or `None` when the result is empty.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        // Larger lower bound wins; at equal versions the strict op is
        // stricter for a lower bound.
        let (lower, lower_op) = match self.lower.cmp(&other.lower) {
            std::cmp::Ordering::Greater => (self.lower.clone(), self.lower_op),
            std::cmp::Ordering::Less => (other.lower.clone(), other.lower_op),
            std::cmp::Ordering::Equal => (self.lower.clone(), self.lower_op.min(other.lower_op)),
        };
        let (upper, upper_op) = match self.upper.cmp(&other.upper) {
            std::cmp::Ordering::Less => (self.upper.clone(), self.upper_op),
            std::cmp::Ordering::Greater => (other.upper.clone(), other.upper_op),
            std::cmp::Ordering::Equal => (self.upper.clone(), self.upper_op.min(other.upper_op)),
        };
        let non_empty = lower < upper
            || (lower == upper && lower_op == Op::LessOrEqual && upper_op == Op::LessOrEqual);
        non_empty.then_some(Self {
            lower,
            lower_op,
            upper_op,
            upper,
        })
    }
}

/// Invalid constraint spelling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid constraint '{text}': expected something like \"1.0.0 <= v < 2.0.0\"")]
pub struct BadConstraint {
    pub text: String,
}

fn parse_op(text: &str) -> Option<Op> {
    match text {
        "<" => Some(Op::Less),
        "<=" => Some(Op::LessOrEqual),
        _ => None,
    }
}

impl FromStr for Constraint {
    type Err = BadConstraint;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || BadConstraint {
            text: text.to_owned(),
        };
        let parts: Vec<&str> = text.split_ascii_whitespace().collect();
        let [lower, lower_op, "v", upper_op, upper] = parts[..] else {
            return Err(bad());
        };
        Ok(Self {
            lower: parse_version(lower).map_err(|_| bad())?,
            lower_op: parse_op(lower_op).ok_or_else(bad)?,
            upper_op: parse_op(upper_op).ok_or_else(bad)?,
            upper: parse_version(upper).map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} v {} {}",
            self.lower,
            self.lower_op.render(),
            self.upper_op.render(),
            self.upper
        )
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConstraintVisitor;

        impl Visitor<'_> for ConstraintVisitor {
            type Value = Constraint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a constraint like \"1.0.0 <= v < 2.0.0\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Constraint, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(ConstraintVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn v(major: u64, minor: u64, patch: u64) -> Version {
        Version::new(major, minor, patch)
    }

    #[test]
    fn parse_rejects_prerelease() {
        assert!(parse_version("1.0.0").is_ok());
        assert!(parse_version("1.0.0-alpha").is_err());
        assert!(parse_version("1.0.0+build").is_err());
    }

    #[test]
    fn constraint_roundtrip() {
        let text = "1.0.0 <= v < 2.0.0";
        let constraint: Constraint = text.parse().unwrap();
        assert_eq!(constraint.to_string(), text);
    }

    #[test]
    fn satisfies_respects_bounds() {
        let constraint: Constraint = "1.0.0 <= v < 2.0.0".parse().unwrap();
        assert!(constraint.satisfies(&v(1, 0, 0)));
        assert!(constraint.satisfies(&v(1, 9, 3)));
        assert!(!constraint.satisfies(&v(2, 0, 0)));
        assert!(!constraint.satisfies(&v(0, 19, 1)));
    }

    #[test]
    fn exactly_admits_only_itself() {
        let constraint = Constraint::exactly(v(1, 2, 3));
        assert!(constraint.satisfies(&v(1, 2, 3)));
        assert!(!constraint.satisfies(&v(1, 2, 4)));
    }

    #[test]
    fn intersect_narrows() {
        let a: Constraint = "1.0.0 <= v < 3.0.0".parse().unwrap();
        let b: Constraint = "2.0.0 <= v < 4.0.0".parse().unwrap();
        let merged = a.intersect(&b).unwrap();
        assert_eq!(merged.to_string(), "2.0.0 <= v < 3.0.0");
    }

    #[test]
    fn intersect_detects_empty() {
        let a: Constraint = "1.0.0 <= v < 2.0.0".parse().unwrap();
        let b: Constraint = "2.0.0 <= v < 3.0.0".parse().unwrap();
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn intersect_at_single_point() {
        let a: Constraint = "1.0.0 <= v <= 2.0.0".parse().unwrap();
        let b: Constraint = "2.0.0 <= v < 3.0.0".parse().unwrap();
        let merged = a.intersect(&b).unwrap();
        assert!(merged.satisfies(&v(2, 0, 0)));
        assert!(!merged.satisfies(&v(2, 0, 1)));
    }

    proptest! {
        #[test]
        fn prop_intersection_is_conjunction(
            major in 0u64..6, minor in 0u64..6, patch in 0u64..6
        ) {
            let version = v(major, minor, patch);
            let a: Constraint = "1.0.0 <= v < 4.0.0".parse().unwrap();
            let b: Constraint = "2.1.0 <= v <= 5.0.0".parse().unwrap();
            let both = a.satisfies(&version) && b.satisfies(&version);
            match a.intersect(&b) {
                Some(merged) => prop_assert_eq!(merged.satisfies(&version), both),
                None => prop_assert!(!both),
            }
        }

        #[test]
        fn prop_constraint_display_roundtrip(
            lo_major in 0u64..4, hi_bump in 1u64..4
        ) {
            let constraint = Constraint {
                lower: v(lo_major, 0, 0),
                lower_op: Op::LessOrEqual,
                upper_op: Op::Less,
                upper: v(lo_major + hi_bump, 0, 0),
            };
            let back: Constraint = constraint.to_string().parse().unwrap();
            prop_assert_eq!(constraint, back);
        }
    }
}
