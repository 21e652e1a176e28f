//! Project manifest loading.
//!
//! An `elm.json` is either an *application* outline (exact versions, split
//! into direct/indirect and test direct/indirect) or a *package* outline
//! (constraints, exposed modules). This crate parses and validates the file;
//! deciding what to do with it belongs to the details driver.

use maestro_core::{Constraint, Fs, Name, PkgName, Version, json, module};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Why a manifest could not be loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error("could not find {0}")]
    NotFound(PathBuf),
    #[error("invalid manifest: {0}")]
    Syntax(String),
    #[error("\"source-directories\" must list at least one directory")]
    NoSourceDirectories,
    #[error("invalid exposed module name '{0}'")]
    BadModuleName(String),
    #[error("\"summary\" must be under 80 characters")]
    OverlongSummary,
}

/// A parsed `elm.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outline {
    #[serde(rename = "application")]
    App(AppOutline),
    #[serde(rename = "package")]
    Pkg(PkgOutline),
}

/// The `dependencies` / `test-dependencies` block of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDeps {
    pub direct: BTreeMap<PkgName, Version>,
    pub indirect: BTreeMap<PkgName, Version>,
}

/// An application outline: exact versions only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOutline {
    #[serde(rename = "source-directories")]
    pub source_dirs: Vec<PathBuf>,
    #[serde(rename = "elm-version")]
    pub elm_version: Version,
    #[serde(rename = "dependencies")]
    pub deps: AppDeps,
    #[serde(rename = "test-dependencies")]
    pub test_deps: AppDeps,
}

/// A package outline: constraints and an exposed-module listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgOutline {
    pub name: PkgName,
    pub summary: String,
    pub license: String,
    pub version: Version,
    #[serde(rename = "exposed-modules")]
    pub exposed: Exposed,
    #[serde(rename = "elm-version")]
    pub elm_constraint: Constraint,
    #[serde(rename = "dependencies")]
    pub deps: BTreeMap<PkgName, Constraint>,
    #[serde(rename = "test-dependencies")]
    pub test_deps: BTreeMap<PkgName, Constraint>,
}

/// Exposed modules, either a flat list or grouped under doc headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exposed {
    Plain(Vec<Name>),
    Sectioned(BTreeMap<String, Vec<Name>>),
}

impl Exposed {
    /// Every exposed module name, headings flattened away.
    #[must_use]
    pub fn flatten(&self) -> Vec<Name> {
        match self {
            Self::Plain(names) => names.clone(),
            Self::Sectioned(sections) => sections.values().flatten().copied().collect(),
        }
    }
}

/// Read and validate `<dir>/elm.json`.
pub fn read(fs: &dyn Fs, dir: &Path) -> Result<Outline, OutlineError> {
    let path = dir.join("elm.json");
    let bytes = fs
        .read_binary(&path)
        .map_err(|_| OutlineError::NotFound(path.clone()))?;
    debug!(path = %path.display(), "reading outline");
    parse(&bytes)
}

/// Parse and validate manifest bytes.
pub fn parse(bytes: &[u8]) -> Result<Outline, OutlineError> {
    let outline: Outline =
        json::from_slice(bytes).map_err(|e| OutlineError::Syntax(e.to_string()))?;
    validate(&outline)?;
    Ok(outline)
}

fn validate(outline: &Outline) -> Result<(), OutlineError> {
    match outline {
        Outline::App(app) => {
            if app.source_dirs.is_empty() {
                return Err(OutlineError::NoSourceDirectories);
            }
        }
        Outline::Pkg(pkg) => {
            if pkg.summary.len() >= 80 {
                return Err(OutlineError::OverlongSummary);
            }
            for name in pkg.exposed.flatten() {
                if !module::is_valid_raw(name.as_str()) {
                    return Err(OutlineError::BadModuleName(name.as_str().to_owned()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const APP_JSON: &str = r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "elm/core": "1.0.5" },
            "indirect": { "elm/json": "1.1.3" }
        },
        "test-dependencies": {
            "direct": {},
            "indirect": {}
        }
    }"#;

    const PKG_JSON: &str = r#"{
        "type": "package",
        "name": "elm/html",
        "summary": "Fast HTML, rendered with virtual DOM diffing",
        "license": "BSD-3-Clause",
        "version": "1.0.0",
        "exposed-modules": ["Html", "Html.Attributes"],
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": {
            "elm/core": "1.0.0 <= v < 2.0.0"
        },
        "test-dependencies": {}
    }"#;

    #[test]
    fn parses_application() {
        let Outline::App(app) = parse(APP_JSON.as_bytes()).unwrap() else {
            panic!("expected application outline");
        };
        assert_eq!(app.elm_version, Version::new(0, 19, 1));
        assert_eq!(app.source_dirs, vec![PathBuf::from("src")]);
        assert_eq!(app.deps.direct.len(), 1);
        assert_eq!(app.deps.indirect.len(), 1);
        assert!(app.test_deps.direct.is_empty());
    }

    #[test]
    fn parses_package() {
        let Outline::Pkg(pkg) = parse(PKG_JSON.as_bytes()).unwrap() else {
            panic!("expected package outline");
        };
        assert_eq!(pkg.name.to_string(), "elm/html");
        assert_eq!(pkg.version, Version::new(1, 0, 0));
        assert_eq!(
            pkg.exposed.flatten(),
            vec![Name::from_str("Html"), Name::from_str("Html.Attributes")]
        );
        assert!(pkg.elm_constraint.admits_compiler());
    }

    #[test]
    fn parses_sectioned_exposed_modules() {
        let json = PKG_JSON.replace(
            r#"["Html", "Html.Attributes"]"#,
            r#"{ "Primitives": ["Html"], "Attributes": ["Html.Attributes"] }"#,
        );
        let Outline::Pkg(pkg) = parse(json.as_bytes()).unwrap() else {
            panic!("expected package outline");
        };
        let mut flattened = pkg.exposed.flatten();
        flattened.sort();
        assert_eq!(
            flattened,
            vec![Name::from_str("Html"), Name::from_str("Html.Attributes")]
        );
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            parse(b"{ not json"),
            Err(OutlineError::Syntax(_))
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        let json = APP_JSON.replace("application", "browser-extension");
        assert!(matches!(
            parse(json.as_bytes()),
            Err(OutlineError::Syntax(_))
        ));
    }

    #[test]
    fn rejects_empty_source_directories() {
        let json = APP_JSON.replace(r#"["src"]"#, "[]");
        assert_eq!(
            parse(json.as_bytes()),
            Err(OutlineError::NoSourceDirectories)
        );
    }

    #[test]
    fn rejects_bad_exposed_module_name() {
        let json = PKG_JSON.replace("\"Html\"", "\"html\"");
        assert_eq!(
            parse(json.as_bytes()),
            Err(OutlineError::BadModuleName("html".to_owned()))
        );
    }

    #[test]
    fn outline_roundtrips_through_json() {
        let outline = parse(PKG_JSON.as_bytes()).unwrap();
        let encoded = json::to_vec(&outline).unwrap();
        let back = parse(&encoded).unwrap();
        assert_eq!(outline, back);
    }
}
