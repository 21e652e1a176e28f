//! Fixture builders: outlines, unpacked packages, registries.

use crate::memfs::MemFs;
use maestro_core::fs::Fs;
use maestro_core::{PackageCache, PkgName, Version, parse_version};
use maestro_registry::{KnownVersions, Registry};
use std::collections::BTreeMap;
use std::path::Path;

/// Application `elm.json` text with the given dependency blocks, each a list
/// of `("author/project", "1.0.0")` pairs.
#[must_use]
pub fn app_outline_json(
    direct: &[(&str, &str)],
    indirect: &[(&str, &str)],
    test_direct: &[(&str, &str)],
    test_indirect: &[(&str, &str)],
) -> String {
    fn block(entries: &[(&str, &str)]) -> String {
        let fields: Vec<String> = entries
            .iter()
            .map(|(pkg, version)| format!("\"{pkg}\": \"{version}\""))
            .collect();
        format!("{{ {} }}", fields.join(", "))
    }
    format!(
        r#"{{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {{
        "direct": {},
        "indirect": {}
    }},
    "test-dependencies": {{
        "direct": {},
        "indirect": {}
    }}
}}"#,
        block(direct),
        block(indirect),
        block(test_direct),
        block(test_indirect)
    )
}

/// Package `elm.json` text exposing `exposed`, depending on `deps`
/// (`("author/project", "1.0.0 <= v < 2.0.0")` pairs).
#[must_use]
pub fn pkg_outline_json(
    name: &str,
    version: &str,
    exposed: &[&str],
    deps: &[(&str, &str)],
) -> String {
    let exposed_json: Vec<String> = exposed.iter().map(|m| format!("\"{m}\"")).collect();
    let deps_json: Vec<String> = deps
        .iter()
        .map(|(pkg, constraint)| format!("\"{pkg}\": \"{constraint}\""))
        .collect();
    format!(
        r#"{{
    "type": "package",
    "name": "{name}",
    "summary": "test fixture",
    "license": "BSD-3-Clause",
    "version": "{version}",
    "exposed-modules": [{}],
    "elm-version": "0.19.0 <= v < 0.20.0",
    "dependencies": {{ {} }},
    "test-dependencies": {{}}
}}"#,
        exposed_json.join(", "),
        deps_json.join(", ")
    )
}

/// Unpack a package into the cache: its manifest plus `src/` modules given
/// as `(relative path, source)` pairs.
pub fn install_package(
    fs: &MemFs,
    cache: &PackageCache,
    outline_json: &str,
    modules: &[(&str, &str)],
) -> (PkgName, Version) {
    let outline = maestro_outline::parse(outline_json.as_bytes()).expect("fixture outline parses");
    let maestro_outline::Outline::Pkg(pkg_outline) = outline else {
        panic!("fixture must be a package outline");
    };
    let pkg = pkg_outline.name;
    let version = pkg_outline.version.clone();

    fs.write_str(cache.outline_file(pkg, &version), outline_json);
    let src = cache.src_dir(pkg, &version);
    fs.create_dir_all(&src).expect("memfs create cannot fail");
    for (path, source) in modules {
        fs.write_str(src.join(path), source);
    }
    (pkg, version)
}

/// Build a registry from `("author/project", ["1.0.0", ...])` entries and
/// persist it as `registry.dat`.
pub fn seed_registry(fs: &MemFs, cache: &PackageCache, entries: &[(&str, &[&str])]) -> Registry {
    let mut packages = BTreeMap::new();
    let mut count = 0;
    for (name, versions) in entries {
        let pkg: PkgName = name.parse().expect("fixture package name parses");
        let mut iter = versions.iter();
        let first = parse_version(iter.next().expect("at least one version"))
            .expect("fixture version parses");
        let mut known = KnownVersions::one(first);
        for version in iter {
            known.add(parse_version(version).expect("fixture version parses"));
        }
        count += known.total();
        packages.insert(pkg, known);
    }
    let registry = Registry { count, packages };
    registry
        .write(fs, cache)
        .expect("memfs registry write cannot fail");
    registry
}

/// Write a project root: `elm.json` plus `src/` modules.
pub fn install_project(fs: &MemFs, root: &Path, outline_json: &str, modules: &[(&str, &str)]) {
    fs.write_str(root.join("elm.json"), outline_json);
    for (path, source) in modules {
        fs.write_str(root.join("src").join(path), source);
    }
}
