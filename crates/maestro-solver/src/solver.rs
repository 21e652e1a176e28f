//! Version constraint solving.
//!
//! The solve is a depth-first exploration with backtracking: take the first
//! pending package, try its candidate versions newest first, and for each
//! candidate fold its own dependency constraints into the pending set. A
//! candidate dies (backtracks) when it contradicts an already-chosen
//! version, produces an empty intersection, requires a compiler this one is
//! not, or (while offline) is not unpacked locally. Real failures such as
//! unreadable cached manifests or transport errors abort the whole solve.

use crate::env::{Connection, SolverEnv};
use dashmap::DashMap;
use futures::future::BoxFuture;
use maestro_core::fs::Fs;
use maestro_core::{Constraint, PkgName, Version};
use maestro_fetch::{HttpProblem, Transport};
use maestro_outline::Outline;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace};

/// The per-package result of a successful solve: the chosen version and the
/// dependency constraints that version declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Details {
    pub version: Version,
    pub deps: BTreeMap<PkgName, Constraint>,
}

/// An exact version for every package in the solution.
pub type Solution = BTreeMap<PkgName, Details>;

/// A non-backtrackable solver failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverProblem {
    #[error("unreadable cached manifest for {pkg} {version}")]
    BadCacheData { pkg: PkgName, version: Version },
    #[error("could not fetch manifest for {pkg} {version}: {problem}")]
    BadHttp {
        pkg: PkgName,
        version: Version,
        problem: HttpProblem,
    },
    #[error("unexpected manifest content for {pkg} {version}")]
    BadHttpData { pkg: PkgName, version: Version },
}

/// Why a solve produced no assignment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    /// Exhaustive search found nothing.
    #[error("no version assignment satisfies the constraints")]
    NoSolution,
    /// A solution may exist, but it needs versions that are not unpacked
    /// locally and the run is offline.
    #[error("no version assignment is solvable from the local cache")]
    NoOfflineSolution,
    #[error(transparent)]
    Problem(SolverProblem),
}

/// A candidate version's own requirements.
#[derive(Debug, Clone)]
struct Constraints {
    elm: Constraint,
    deps: BTreeMap<PkgName, Constraint>,
}

#[derive(Debug, Clone)]
struct Goals {
    pending: BTreeMap<PkgName, Constraint>,
    solved: Solution,
}

/// One solve over a fixed environment. Candidate metadata is memoized, so a
/// deep backtrack never re-reads or re-fetches a manifest.
#[derive(Debug)]
pub struct Solver<'env> {
    env: &'env SolverEnv,
    metadata: DashMap<(PkgName, Version), Constraints, ahash::RandomState>,
}

impl<'env> Solver<'env> {
    #[must_use]
    pub fn new(env: &'env SolverEnv) -> Self {
        Self {
            env,
            metadata: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Find an exact version for every package reachable from `constraints`.
    pub async fn verify(
        &self,
        constraints: &BTreeMap<PkgName, Constraint>,
    ) -> Result<Solution, SolverError> {
        debug!(roots = constraints.len(), "solving");
        let goals = Goals {
            pending: constraints.clone(),
            solved: Solution::new(),
        };
        match self.explore(goals).await? {
            Some(solution) => {
                debug!(packages = solution.len(), "solved");
                Ok(solution)
            }
            None => Err(match self.env.connection {
                Connection::Online => SolverError::NoSolution,
                Connection::Offline => SolverError::NoOfflineSolution,
            }),
        }
    }

    fn explore(&self, goals: Goals) -> BoxFuture<'_, Result<Option<Solution>, SolverError>> {
        Box::pin(async move {
            let Goals { mut pending, solved } = goals;
            let Some((name, constraint)) = pending.pop_first() else {
                return Ok(Some(solved));
            };
            let rest = Goals { pending, solved };
            for version in self.relevant_versions(name, &constraint) {
                trace!(pkg = %name, version = %version, "trying candidate");
                if let Some(next) = self.add_version(&rest, name, version).await?
                    && let Some(solution) = self.explore(next).await?
                {
                    return Ok(Some(solution));
                }
            }
            Ok(None)
        })
    }

    /// Extend `goals` with one chosen version, or `None` to backtrack.
    async fn add_version(
        &self,
        goals: &Goals,
        name: PkgName,
        version: Version,
    ) -> Result<Option<Goals>, SolverError> {
        let Some(constraints) = self.get_constraints(name, &version).await? else {
            return Ok(None);
        };
        if !constraints.elm.admits_compiler() {
            return Ok(None);
        }

        let mut pending = goals.pending.clone();
        for (dep, dep_constraint) in &constraints.deps {
            if let Some(chosen) = goals.solved.get(dep) {
                if !dep_constraint.satisfies(&chosen.version) {
                    return Ok(None);
                }
            } else if let Some(existing) = pending.get(dep) {
                match existing.intersect(dep_constraint) {
                    Some(merged) => {
                        pending.insert(*dep, merged);
                    }
                    None => return Ok(None),
                }
            } else {
                pending.insert(*dep, dep_constraint.clone());
            }
        }

        let mut solved = goals.solved.clone();
        solved.insert(
            name,
            Details {
                version,
                deps: constraints.deps,
            },
        );
        Ok(Some(Goals { pending, solved }))
    }

    /// Candidate versions for `name` under `constraint`, newest first.
    /// Offline, only unpacked candidates count.
    fn relevant_versions(&self, name: PkgName, constraint: &Constraint) -> Vec<Version> {
        let Some(known) = self.env.registry.known_versions(name) else {
            return Vec::new();
        };
        known
            .descending()
            .filter(|version| constraint.satisfies(version))
            .filter(|version| match self.env.connection {
                Connection::Online => true,
                Connection::Offline => self
                    .env
                    .fs
                    .exists(&self.env.cache.outline_file(name, version)),
            })
            .cloned()
            .collect()
    }

    /// A candidate's own requirements: from the unpacked cache when present
    /// (cached variants win without touching the network), from the site
    /// otherwise. `Ok(None)` means the candidate is unavailable and the
    /// caller should backtrack.
    async fn get_constraints(
        &self,
        pkg: PkgName,
        version: &Version,
    ) -> Result<Option<Constraints>, SolverError> {
        let key = (pkg, version.clone());
        if let Some(hit) = self.metadata.get(&key) {
            return Ok(Some(hit.clone()));
        }

        let path = self.env.cache.outline_file(pkg, version);
        let bytes = if self.env.fs.exists(&path) {
            self.env.fs.read_binary(&path).map_err(|_| {
                SolverError::Problem(SolverProblem::BadCacheData {
                    pkg,
                    version: version.clone(),
                })
            })?
        } else {
            match self.env.connection {
                Connection::Offline => return Ok(None),
                Connection::Online => {
                    let url = self.env.site.release_file(pkg, version, "elm.json");
                    self.env.transport.get(&url).await.map_err(|problem| {
                        SolverError::Problem(SolverProblem::BadHttp {
                            pkg,
                            version: version.clone(),
                            problem,
                        })
                    })?
                }
            }
        };

        let cached = self.env.fs.exists(&path);
        let bad_data = || {
            SolverError::Problem(if cached {
                SolverProblem::BadCacheData {
                    pkg,
                    version: version.clone(),
                }
            } else {
                SolverProblem::BadHttpData {
                    pkg,
                    version: version.clone(),
                }
            })
        };
        let Ok(Outline::Pkg(outline)) = maestro_outline::parse(&bytes) else {
            return Err(bad_data());
        };

        let constraints = Constraints {
            elm: outline.elm_constraint,
            deps: outline.deps,
        };
        self.metadata.insert(key, constraints.clone());
        Ok(Some(constraints))
    }
}
