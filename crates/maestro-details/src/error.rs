//! The closed error sum of the details engine.

use maestro_builder::{BadDep, WriteFailure};
use maestro_core::{Constraint, Version, compiler_version};
use maestro_outline::OutlineError;
use maestro_registry::RegistryProblem;
use maestro_solver::SolverProblem;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a `load`/`generate`/`verify_install` can fail. The CLI
/// collaborator formats these for users.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetailsError {
    #[error("invalid project manifest: {0}")]
    BadOutline(OutlineError),

    #[error("this application declares compiler {version}, but {running} is running", running = compiler_version())]
    BadElmInAppOutline { version: Version },

    #[error("this package requires compiler \"{constraint}\", but {running} is running", running = compiler_version())]
    BadElmInPkg { constraint: Constraint },

    #[error("cannot get the package registry: {0}")]
    CannotGetRegistry(RegistryProblem),

    #[error("no version assignment satisfies the declared dependencies")]
    NoSolution,

    #[error("dependencies cannot be satisfied from the local cache while offline")]
    NoOfflineSolution,

    #[error("solver failure: {0}")]
    SolverProblem(SolverProblem),

    #[error("the \"dependencies\" in elm.json appear to be hand-edited into an invalid state")]
    HandEditedDependencies,

    #[error("{} dependencies failed (cache at {})", problems.len(), home.display())]
    BadDeps {
        home: PathBuf,
        problems: Vec<BadDep>,
    },

    #[error("could not persist build state: {0}")]
    CannotWrite(WriteFailure),
}
