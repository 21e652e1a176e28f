//! Package site routes.

use maestro_core::{PkgName, Version};
use url::Url;

const DEFAULT_BASE: &str = "https://package.elm-lang.org/";

/// Route builder for the package registry website.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    base: Url,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_BASE).expect("default site url is valid"),
        }
    }
}

impl Site {
    /// Use a non-default registry, e.g. a mirror or a test server.
    #[must_use]
    pub fn new(mut base: Url) -> Self {
        // A trailing slash makes Url::join treat the base as a directory.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self { base }
    }

    fn join(&self, route: &str) -> Url {
        self.base.join(route).expect("site route is valid")
    }

    /// The full known-versions listing.
    #[must_use]
    pub fn all_packages(&self) -> Url {
        self.join("all-packages")
    }

    /// Versions published after the first `count` known ones.
    #[must_use]
    pub fn all_packages_since(&self, count: u64) -> Url {
        self.join(&format!("all-packages/since/{count}"))
    }

    /// A file served from one package release, e.g. `endpoint.json` or
    /// `elm.json`.
    #[must_use]
    pub fn release_file(&self, pkg: PkgName, version: &Version, file: &str) -> Url {
        self.join(&format!(
            "packages/{}/{}/{version}/{file}",
            pkg.author, pkg.project
        ))
    }
}
