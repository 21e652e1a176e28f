//! Core types for the Maestro build details engine.
//!
//! This crate provides the foundation shared by every engine crate:
//! - Interned names, package names, versions, and constraints
//! - Module names (raw and canonical)
//! - Compiled interfaces and optimized object graphs
//! - Collaborator traits for the filesystem and the module compiler
//! - Package cache paths, JSON helpers, and the `.dat` binary envelope

pub mod compile;
pub mod dat;
pub mod fs;
pub mod interface;
pub mod json;
pub mod module;
mod name;
pub mod objects;
mod paths;
mod pkg;
pub mod version;

pub use compile::{
    CompileProblem, CompiledModule, KernelSource, ModuleCompiler, ModuleDocs, ParsedModule,
    SyntaxProblem,
};
pub use fs::{Fs, LockGuard, ModTime, RealFs};
pub use interface::{DependencyInterface, Interface, Interfaces};
pub use module::Canonical;
pub use name::Name;
pub use objects::{Chunk, Global, GlobalGraph, LocalGraph, Node};
pub use paths::PackageCache;
pub use pkg::{BadPkgName, PkgName};
pub use version::{BadConstraint, BadVersion, Constraint, compiler_version, parse_version};

// Re-export commonly used types
pub use dashmap::DashMap;
pub use semver::Version;

/// A monotonically increasing identifier for one load of a project's
/// details; bumped every time a persisted `Details` is reused.
pub type BuildId = u64;
