//! Package names.

use crate::name::Name;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A registry package name: `author/project`.
///
/// Ordering is case-sensitive, author first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PkgName {
    pub author: Name,
    pub project: Name,
}

/// Authors whose packages may contain kernel (host-runtime) modules.
const KERNEL_AUTHORS: [&str; 2] = ["elm", "elm-explorations"];

impl PkgName {
    pub fn new(author: impl Into<Name>, project: impl Into<Name>) -> Self {
        Self {
            author: author.into(),
            project: project.into(),
        }
    }

    /// Whether this package is allowed to ship `Elm.Kernel.*` modules.
    #[must_use]
    pub fn is_kernel(self) -> bool {
        KERNEL_AUTHORS.contains(&self.author.as_str())
    }
}

/// Invalid `author/project` spelling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid package name '{text}': expected author/project")]
pub struct BadPkgName {
    pub text: String,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromStr for PkgName {
    type Err = BadPkgName;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || BadPkgName {
            text: text.to_owned(),
        };
        let (author, project) = text.split_once('/').ok_or_else(bad)?;
        if !valid_segment(author) || !valid_segment(project) {
            return Err(bad());
        }
        Ok(Self::new(author, project))
    }
}

impl fmt::Display for PkgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.project)
    }
}

impl fmt::Debug for PkgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PkgName({}/{})", self.author, self.project)
    }
}

impl Serialize for PkgName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PkgName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PkgVisitor;

        impl Visitor<'_> for PkgVisitor {
            type Value = PkgName;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a package name like \"elm/core\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PkgName, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(PkgVisitor)
    }
}
