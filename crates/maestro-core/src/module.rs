//! Module names.
//!
//! A *raw* module name is a dotted path like `Json.Decode`, interned as a
//! [`Name`]. A [`Canonical`] name pairs a raw name with the package that
//! owns it.

use crate::name::Name;
use crate::pkg::PkgName;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Prefix marking a kernel module written in the host runtime's language.
const KERNEL_PREFIX: &str = "Elm.Kernel.";

/// Whether `name` is a well-formed module name: one or more dot-separated
/// segments, each starting with an uppercase letter.
#[must_use]
pub fn is_valid_raw(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars.next().is_some_and(|c| c.is_ascii_uppercase())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Whether `name` names a kernel module.
#[must_use]
pub fn is_kernel_raw(name: Name) -> bool {
    name.as_str().starts_with(KERNEL_PREFIX)
}

/// The relative source path of a module: `Json.Decode` with extension
/// `"elm"` becomes `Json/Decode.elm`.
#[must_use]
pub fn raw_to_path(name: Name, extension: &str) -> PathBuf {
    let mut path: PathBuf = name.as_str().split('.').collect();
    path.set_extension(extension);
    path
}

/// A module name qualified by its home package.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Canonical {
    pub package: PkgName,
    pub module: Name,
}

impl Canonical {
    pub fn new(package: PkgName, module: impl Into<Name>) -> Self {
        Self {
            package,
            module: module.into(),
        }
    }
}

/// Invalid canonical module name spelling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid canonical module name '{text}': expected author/project:Module.Name")]
pub struct BadCanonical {
    pub text: String,
}

impl FromStr for Canonical {
    type Err = BadCanonical;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || BadCanonical {
            text: text.to_owned(),
        };
        let (package, module) = text.split_once(':').ok_or_else(bad)?;
        if !is_valid_raw(module) {
            return Err(bad());
        }
        Ok(Self {
            package: package.parse().map_err(|_| bad())?,
            module: Name::from_str(module),
        })
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.module)
    }
}

impl fmt::Debug for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Canonical({}:{})", self.package, self.module)
    }
}

impl Serialize for Canonical {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Canonical {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CanonicalVisitor;

        impl Visitor<'_> for CanonicalVisitor {
            type Value = Canonical;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a canonical module name like \"elm/core:Basics\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Canonical, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(CanonicalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn validation() {
        assert!(is_valid_raw("Basics"));
        assert!(is_valid_raw("Json.Decode"));
        assert!(is_valid_raw("Elm.Kernel.List"));
        assert!(!is_valid_raw(""));
        assert!(!is_valid_raw("json.Decode"));
        assert!(!is_valid_raw("Json..Decode"));
        assert!(!is_valid_raw("Json.De code"));
    }

    #[test]
    fn kernel_prefix() {
        assert!(is_kernel_raw(Name::from_str("Elm.Kernel.List")));
        assert!(!is_kernel_raw(Name::from_str("List")));
    }

    #[test]
    fn module_paths() {
        assert_eq!(
            raw_to_path(Name::from_str("Json.Decode"), "elm"),
            PathBuf::from("Json/Decode.elm")
        );
        assert_eq!(
            raw_to_path(Name::from_str("Elm.Kernel.List"), "js"),
            PathBuf::from("Elm/Kernel/List.js")
        );
    }

    #[test]
    fn canonical_roundtrip() {
        let canonical: Canonical = "elm/core:Json.Decode".parse().unwrap();
        assert_eq!(canonical.package.to_string(), "elm/core");
        assert_eq!(canonical.module.as_str(), "Json.Decode");
        assert_eq!(canonical.to_string(), "elm/core:Json.Decode");

        let json = sonic_rs::to_string(&canonical).unwrap();
        let back: Canonical = sonic_rs::from_str(&json).unwrap();
        assert_eq!(canonical, back);
    }
}
