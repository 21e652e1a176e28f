//! Interned identifier and module names.
//!
//! Module names, identifiers, and package name segments recur constantly
//! across outlines, interfaces, and object graphs. `Name` is a `Copy` handle
//! into a process-wide intern table, so equality and ordering stay cheap and
//! every repeated spelling shares one allocation.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;

/// Intern table. Append-only; entries are leaked once and live for the
/// process lifetime.
static TABLE: Lazy<DashMap<Box<str>, &'static str, ahash::RandomState>> =
    Lazy::new(|| DashMap::with_hasher(ahash::RandomState::new()));

/// An interned string.
///
/// Ordering and equality are by content, so `BTreeMap<Name, _>` iterates in
/// the canonical order required for persisted artifacts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(&'static str);

impl Name {
    /// Intern `text`, returning the shared handle.
    pub fn from_str(text: &str) -> Self {
        if let Some(entry) = TABLE.get(text) {
            return Self(*entry.value());
        }
        let entry = TABLE
            .entry(Box::from(text))
            .or_insert_with(|| Box::leak(Box::from(text)));
        Self(*entry.value())
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.0)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Self::from_str(text)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NameVisitor;

        impl Visitor<'_> for NameVisitor {
            type Value = Name;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Name, E> {
                Ok(Name::from_str(value))
            }
        }

        deserializer.deserialize_str(NameVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_storage() {
        let a = Name::from_str("Json.Decode");
        let b = Name::from_str("Json.Decode");
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
    }

    #[test]
    fn ordering_is_by_content() {
        let a = Name::from_str("Array");
        let b = Name::from_str("Basics");
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let name = Name::from_str("Platform.Cmd");
        let json = sonic_rs::to_string(&name).unwrap();
        assert_eq!(json, "\"Platform.Cmd\"");
        let back: Name = sonic_rs::from_str(&json).unwrap();
        assert_eq!(name, back);
    }
}
