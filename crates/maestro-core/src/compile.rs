//! The module-compiler collaborator interface.
//!
//! Parsing, type checking, and optimization live outside the details engine.
//! The engine drives them through [`ModuleCompiler`] and only looks at the
//! pieces it needs: a parsed module's declared name and imports, and a
//! compiled module's interface, object graph, and optional docs.

use crate::interface::Interface;
use crate::name::Name;
use crate::objects::{Chunk, LocalGraph};
use crate::pkg::PkgName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A successfully parsed source module.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    /// The name the module declares for itself.
    pub name: Name,
    /// Raw names of every import, in source order.
    pub imports: Vec<Name>,
    /// The source bytes, retained for the compile step.
    pub source: Vec<u8>,
}

/// Documentation extracted from an exposed module during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDocs {
    pub name: Name,
    pub comment: String,
}

/// The products of compiling one module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub interface: Interface,
    pub objects: LocalGraph,
    /// Present only when docs were requested and the module is documentable.
    pub docs: Option<ModuleDocs>,
}

/// A parsed kernel source file.
#[derive(Debug, Clone)]
pub struct KernelSource {
    pub imports: Vec<Name>,
    pub chunks: Vec<Chunk>,
}

/// Source could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax problem: {message}")]
pub struct SyntaxProblem {
    pub message: String,
}

/// A parsed module failed to compile.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("compile problem in {module}: {message}")]
pub struct CompileProblem {
    pub module: Name,
    pub message: String,
}

/// The external compiler, as seen by the details engine.
pub trait ModuleCompiler: Send + Sync + std::fmt::Debug {
    /// Parse one source file belonging to `package`.
    fn parse(&self, package: PkgName, bytes: &[u8]) -> Result<ParsedModule, SyntaxProblem>;

    /// Type check and optimize a parsed module against the interfaces of its
    /// imports. `needs_docs` asks for extracted documentation.
    fn compile(
        &self,
        package: PkgName,
        interfaces: &BTreeMap<Name, Interface>,
        module: &ParsedModule,
        needs_docs: bool,
    ) -> Result<CompiledModule, CompileProblem>;

    /// Parse a kernel (host-runtime) source file. `foreign_homes` maps each
    /// foreign module name to its owning package so kernel references can be
    /// resolved. `None` means the file is not a valid kernel module.
    fn parse_kernel(
        &self,
        package: PkgName,
        foreign_homes: &BTreeMap<Name, PkgName>,
        bytes: &[u8],
    ) -> Option<KernelSource>;
}
