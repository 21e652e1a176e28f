//! Compiled module interfaces.
//!
//! An [`Interface`] is the exported API of one compiled module in canonical
//! form: values with their annotations, union types, aliases, and infix
//! operators. A [`DependencyInterface`] additionally records visibility:
//! `Public` interfaces are re-exposed to downstream packages, `Private`
//! ones are only usable while compiling the package that owns them (their
//! types stay nameable, their values do not).

use crate::module::Canonical;
use crate::name::Name;
use crate::pkg::PkgName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A canonical type as it appears in an exported signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// A type variable like `msg`.
    Var(Name),
    /// A named type applied to arguments: `Maybe a`, `Dict k v`.
    Type(Canonical, Name, Vec<Type>),
    /// A record, with an optional extension variable.
    Record(BTreeMap<Name, Type>, Option<Name>),
    Unit,
    Tuple(Box<Type>, Box<Type>, Option<Box<Type>>),
    Lambda(Box<Type>, Box<Type>),
}

/// The canonical annotation of an exported value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub free_vars: Vec<Name>,
    pub tipe: Type,
}

/// An exported union type and its constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Union {
    pub vars: Vec<Name>,
    /// Constructor name and argument types; empty when the type is opaque.
    pub ctors: Vec<(Name, Vec<Type>)>,
}

/// An exported type alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub vars: Vec<Name>,
    pub tipe: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Associativity {
    Left,
    Non,
    Right,
}

/// An exported infix operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binop {
    pub function: Name,
    pub annotation: Annotation,
    pub associativity: Associativity,
    pub precedence: u8,
}

/// The exported API of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub home: PkgName,
    pub values: BTreeMap<Name, Annotation>,
    pub unions: BTreeMap<Name, Union>,
    pub aliases: BTreeMap<Name, Alias>,
    pub binops: BTreeMap<Name, Binop>,
}

impl Interface {
    /// An interface exporting nothing, for modules whose API is empty.
    #[must_use]
    pub fn empty(home: PkgName) -> Self {
        Self {
            home,
            values: BTreeMap::new(),
            unions: BTreeMap::new(),
            aliases: BTreeMap::new(),
            binops: BTreeMap::new(),
        }
    }
}

/// A per-module interface with package-level visibility attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyInterface {
    Public(Interface),
    /// Values are hidden; unions and aliases stay visible so downstream
    /// signatures can still mention the types.
    Private {
        home: PkgName,
        unions: BTreeMap<Name, Union>,
        aliases: BTreeMap<Name, Alias>,
    },
}

impl DependencyInterface {
    #[must_use]
    pub fn public(interface: Interface) -> Self {
        Self::Public(interface)
    }

    #[must_use]
    pub fn private(interface: Interface) -> Self {
        Self::Private {
            home: interface.home,
            unions: interface.unions,
            aliases: interface.aliases,
        }
    }

    /// Drop the value-level exports, keeping types nameable.
    #[must_use]
    pub fn privatize(self) -> Self {
        match self {
            Self::Public(interface) => Self::private(interface),
            private @ Self::Private { .. } => private,
        }
    }

    /// The full interface, when publicly visible.
    #[must_use]
    pub fn as_public(&self) -> Option<&Interface> {
        match self {
            Self::Public(interface) => Some(interface),
            Self::Private { .. } => None,
        }
    }
}

/// The project-level interface map: every module reachable through the
/// dependency set, keyed by canonical name.
pub type Interfaces = BTreeMap<Canonical, DependencyInterface>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_interface() -> Interface {
        let home: PkgName = "elm/core".parse().unwrap();
        let mut values = BTreeMap::new();
        values.insert(
            Name::from_str("identity"),
            Annotation {
                free_vars: vec![Name::from_str("a")],
                tipe: Type::Lambda(
                    Box::new(Type::Var(Name::from_str("a"))),
                    Box::new(Type::Var(Name::from_str("a"))),
                ),
            },
        );
        let mut unions = BTreeMap::new();
        unions.insert(
            Name::from_str("Order"),
            Union {
                vars: vec![],
                ctors: vec![
                    (Name::from_str("LT"), vec![]),
                    (Name::from_str("EQ"), vec![]),
                    (Name::from_str("GT"), vec![]),
                ],
            },
        );
        Interface {
            home,
            values,
            unions,
            aliases: BTreeMap::new(),
            binops: BTreeMap::new(),
        }
    }

    #[test]
    fn privatize_hides_values_keeps_types() {
        let interface = sample_interface();
        let private = DependencyInterface::public(interface.clone()).privatize();
        match private {
            DependencyInterface::Private { home, unions, .. } => {
                assert_eq!(home, interface.home);
                assert!(unions.contains_key(&Name::from_str("Order")));
            }
            DependencyInterface::Public(_) => panic!("expected private interface"),
        }
    }

    #[test]
    fn privatize_is_idempotent() {
        let once = DependencyInterface::public(sample_interface()).privatize();
        let twice = once.clone().privatize();
        assert_eq!(once, twice);
    }

    #[test]
    fn serde_roundtrip() {
        let interface = DependencyInterface::public(sample_interface());
        let json = sonic_rs::to_string(&interface).unwrap();
        let back: DependencyInterface = sonic_rs::from_str(&json).unwrap();
        assert_eq!(interface, back);
    }
}
