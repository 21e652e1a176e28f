//! Optimized object graphs.
//!
//! The code generator consumes one [`GlobalGraph`] per project: the union of
//! every compiled module's [`LocalGraph`] plus the kernel chunks of any
//! kernel modules. Node payloads are opaque to the details engine; it only
//! unions, persists, and reloads them.

use crate::module::Canonical;
use crate::name::Name;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A globally unique value name: a canonical module plus a value in it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Global {
    pub home: Canonical,
    pub name: Name,
}

impl Global {
    pub fn new(home: Canonical, name: impl Into<Name>) -> Self {
        Self {
            home,
            name: name.into(),
        }
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.home, self.name)
    }
}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Global({self})")
    }
}

impl Serialize for Global {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Global {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GlobalVisitor;

        impl Visitor<'_> for GlobalVisitor {
            type Value = Global;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a global name like \"elm/core:Basics:identity\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Global, E> {
                let (home, name) = value
                    .rsplit_once(':')
                    .ok_or_else(|| de::Error::custom("missing value name"))?;
                Ok(Global {
                    home: Canonical::from_str(home).map_err(de::Error::custom)?,
                    name: Name::from_str(name),
                })
            }
        }

        deserializer.deserialize_str(GlobalVisitor)
    }
}

/// One optimized definition, as produced by the code generator's front half.
/// Opaque bytes from the engine's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node(pub Vec<u8>);

/// A chunk of a kernel module: literal host-runtime code interleaved with
/// references the code generator resolves at emit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chunk {
    Js(Vec<u8>),
    ElmVar(Canonical, Name),
    JsVar(Name, Name),
    ElmField(Name),
    Debug,
    Prod,
}

/// The object graph of a single compiled module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGraph {
    pub has_main: bool,
    pub nodes: BTreeMap<Global, Node>,
    /// Record-field usage counts, for field renaming in production mode.
    pub fields: BTreeMap<Name, u32>,
}

/// The union of every module's objects across a dependency set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalGraph {
    pub nodes: BTreeMap<Global, Node>,
    pub fields: BTreeMap<Name, u32>,
    pub kernels: BTreeMap<Name, Vec<Chunk>>,
}

impl GlobalGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one module's local graph into this one.
    pub fn add_local_graph(&mut self, local: &LocalGraph) {
        self.nodes
            .extend(local.nodes.iter().map(|(k, v)| (*k, v.clone())));
        for (field, count) in &local.fields {
            *self.fields.entry(*field).or_insert(0) += count;
        }
    }

    /// Register a kernel module's chunks under its raw name.
    pub fn add_kernel(&mut self, module: Name, chunks: Vec<Chunk>) {
        self.kernels.insert(module, chunks);
    }

    /// Merge another global graph into this one.
    pub fn add_global_graph(&mut self, other: &Self) {
        self.nodes
            .extend(other.nodes.iter().map(|(k, v)| (*k, v.clone())));
        for (field, count) in &other.fields {
            *self.fields.entry(*field).or_insert(0) += count;
        }
        self.kernels
            .extend(other.kernels.iter().map(|(k, v)| (*k, v.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn global(module: &str, name: &str) -> Global {
        Global::new(
            Canonical::new("elm/core".parse().unwrap(), module),
            name,
        )
    }

    #[test]
    fn global_serde_roundtrip() {
        let value = global("Json.Decode", "succeed");
        let json = sonic_rs::to_string(&value).unwrap();
        assert_eq!(json, "\"elm/core:Json.Decode:succeed\"");
        let back: Global = sonic_rs::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn local_graphs_union_with_field_counts() {
        let mut graph = GlobalGraph::new();
        let mut first = LocalGraph::default();
        first.nodes.insert(global("Basics", "identity"), Node(vec![1]));
        first.fields.insert(Name::from_str("label"), 2);
        let mut second = LocalGraph::default();
        second.nodes.insert(global("List", "map"), Node(vec![2]));
        second.fields.insert(Name::from_str("label"), 3);

        graph.add_local_graph(&first);
        graph.add_local_graph(&second);

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.fields[&Name::from_str("label")], 5);
    }

    #[test]
    fn kernels_keyed_by_raw_name() {
        let mut graph = GlobalGraph::new();
        graph.add_kernel(
            Name::from_str("Elm.Kernel.List"),
            vec![Chunk::Js(b"var x;".to_vec()), Chunk::Prod],
        );
        assert_eq!(graph.kernels.len(), 1);
    }
}
