//! A stub module compiler.
//!
//! Understands just enough of a tiny source convention to exercise the
//! details engine:
//!
//! ```text
//! module Json.Decode exposing (..)
//! import Basics
//! def succeed
//! main
//! ```
//!
//! - `module X exposing (..)` declares the module name
//! - `import X` records an import
//! - `def x` exports a value `x` with a trivial annotation
//! - a bare `main` line marks the module as a program entry point
//! - `-- BOOM_PARSE` / `-- BOOM_COMPILE` force the respective failure
//!
//! Kernel sources use `// import X` lines; `// BOOM_KERNEL` makes the file
//! unreadable as a kernel module.

use maestro_core::{
    Canonical, Chunk, CompileProblem, CompiledModule, Global, Interface, KernelSource, LocalGraph,
    ModuleCompiler, ModuleDocs, Name, Node, ParsedModule, PkgName, SyntaxProblem,
};
use maestro_core::interface::{Annotation, Type};
use std::collections::BTreeMap;

/// Deterministic stand-in for the real compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubCompiler;

impl StubCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn trivial_annotation() -> Annotation {
    Annotation {
        free_vars: vec![Name::from_str("a")],
        tipe: Type::Var(Name::from_str("a")),
    }
}

impl ModuleCompiler for StubCompiler {
    fn parse(&self, _package: PkgName, bytes: &[u8]) -> Result<ParsedModule, SyntaxProblem> {
        let text = std::str::from_utf8(bytes).map_err(|_| SyntaxProblem {
            message: "source is not UTF-8".to_owned(),
        })?;
        if text.contains("BOOM_PARSE") {
            return Err(SyntaxProblem {
                message: "forced parse failure".to_owned(),
            });
        }

        let mut name = None;
        let mut imports = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(declared) = line
                .strip_prefix("module ")
                .and_then(|rest| rest.split_whitespace().next())
            {
                name = Some(Name::from_str(declared));
            } else if let Some(import) = line
                .strip_prefix("import ")
                .and_then(|rest| rest.split_whitespace().next())
            {
                imports.push(Name::from_str(import));
            }
        }

        let name = name.ok_or_else(|| SyntaxProblem {
            message: "missing module declaration".to_owned(),
        })?;
        Ok(ParsedModule {
            name,
            imports,
            source: bytes.to_vec(),
        })
    }

    fn compile(
        &self,
        package: PkgName,
        _interfaces: &BTreeMap<Name, Interface>,
        module: &ParsedModule,
        needs_docs: bool,
    ) -> Result<CompiledModule, CompileProblem> {
        let text = String::from_utf8_lossy(&module.source);
        if text.contains("BOOM_COMPILE") {
            return Err(CompileProblem {
                module: module.name,
                message: "forced compile failure".to_owned(),
            });
        }

        let home = Canonical::new(package, module.name);
        let mut interface = Interface::empty(package);
        let mut objects = LocalGraph::default();
        for line in text.lines() {
            let line = line.trim();
            if let Some(def) = line
                .strip_prefix("def ")
                .and_then(|rest| rest.split_whitespace().next())
            {
                let name = Name::from_str(def);
                interface.values.insert(name, trivial_annotation());
                objects
                    .nodes
                    .insert(Global::new(home, name), Node(def.as_bytes().to_vec()));
            } else if line == "main" {
                objects.has_main = true;
            }
        }

        let docs = needs_docs.then(|| ModuleDocs {
            name: module.name,
            comment: format!("Documentation for {}", module.name),
        });
        Ok(CompiledModule {
            interface,
            objects,
            docs,
        })
    }

    fn parse_kernel(
        &self,
        _package: PkgName,
        _foreign_homes: &BTreeMap<Name, PkgName>,
        bytes: &[u8],
    ) -> Option<KernelSource> {
        let text = std::str::from_utf8(bytes).ok()?;
        if text.contains("BOOM_KERNEL") {
            return None;
        }
        let imports = text
            .lines()
            .filter_map(|line| line.trim().strip_prefix("// import "))
            .map(|name| Name::from_str(name.trim()))
            .collect();
        Some(KernelSource {
            imports,
            chunks: vec![Chunk::Js(bytes.to_vec())],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_convention() {
        let source = b"module Json.Decode exposing (..)\nimport Basics\nimport List\ndef succeed\n";
        let module = StubCompiler
            .parse("elm/json".parse().unwrap(), source)
            .unwrap();
        assert_eq!(module.name.as_str(), "Json.Decode");
        assert_eq!(
            module.imports,
            vec![Name::from_str("Basics"), Name::from_str("List")]
        );
    }

    #[test]
    fn compile_exports_defs_and_detects_main() {
        let pkg: PkgName = "author/app".parse().unwrap();
        let module = StubCompiler
            .parse(pkg, b"module Main exposing (..)\ndef run\nmain\n")
            .unwrap();
        let compiled = StubCompiler
            .compile(pkg, &BTreeMap::new(), &module, true)
            .unwrap();
        assert!(compiled.interface.values.contains_key(&Name::from_str("run")));
        assert!(compiled.objects.has_main);
        assert!(compiled.docs.is_some());
    }

    #[test]
    fn forced_failures() {
        let pkg: PkgName = "elm/core".parse().unwrap();
        assert!(StubCompiler.parse(pkg, b"-- BOOM_PARSE\n").is_err());
        let module = StubCompiler
            .parse(pkg, b"module A exposing (..)\n-- BOOM_COMPILE\n")
            .unwrap();
        assert!(
            StubCompiler
                .compile(pkg, &BTreeMap::new(), &module, false)
                .is_err()
        );
        assert!(
            StubCompiler
                .parse_kernel(pkg, &BTreeMap::new(), b"// BOOM_KERNEL")
                .is_none()
        );
    }
}
