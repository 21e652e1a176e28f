//! The incremental driver.
//!
//! `load` decides between reusing the persisted `Details` (manifest mtime
//! unchanged) and regenerating: read the registry, validate the outline,
//! solve, verify every dependency under the registry lock, aggregate, and
//! persist through the background writer.

use crate::error::DetailsError;
use crate::record::{Details, Extras, ValidOutline};
use crate::stuff;
use maestro_builder::{
    BuildEnv, gather_foreigns, gather_interfaces, gather_objects, verify_dependencies, with_scope,
};
use maestro_builder::WriteFailure;
use maestro_core::fs::Fs;
use maestro_core::{
    Constraint, ModTime, ModuleCompiler, PackageCache, PkgName, Version, compiler_version, dat,
};
use maestro_fetch::{Site, Transport};
use maestro_outline::{AppOutline, Outline, OutlineError, PkgOutline};
use maestro_solver::{Solution, Solver, SolverEnv, SolverError, init_env};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The collaborators one engine run is wired to.
#[derive(Debug, Clone)]
pub struct Env {
    pub fs: Arc<dyn Fs>,
    pub transport: Arc<dyn Transport>,
    pub site: Site,
    pub compiler: Arc<dyn ModuleCompiler>,
    pub cache: PackageCache,
}

/// Load the project details for `root`, reusing the persisted record when
/// the manifest is unchanged and regenerating otherwise.
pub async fn load(env: &Env, root: &Path) -> Result<Details, DetailsError> {
    let manifest = root.join("elm.json");
    let new_time: ModTime = env
        .fs
        .mtime(&manifest)
        .map_err(|_| DetailsError::BadOutline(OutlineError::NotFound(manifest.clone())))?;

    match dat::read::<Details>(env.fs.as_ref(), &stuff::details_file(root)) {
        Some(mut details) if details.outline_time == new_time => {
            debug!(root = %root.display(), build_id = details.build_id + 1, "details reused");
            details.build_id += 1;
            details.extras = Extras::Cached;
            Ok(details)
        }
        _ => generate(env, root, new_time).await,
    }
}

/// Check that a candidate outline is buildable, discarding the details.
/// The install command probes edited outlines this way.
pub async fn verify_install(
    env: &Env,
    solver_env: &SolverEnv,
    root: &Path,
    outline: &Outline,
) -> Result<(), DetailsError> {
    let manifest = root.join("elm.json");
    let time = env
        .fs
        .mtime(&manifest)
        .map_err(|_| DetailsError::BadOutline(OutlineError::NotFound(manifest)))?;
    match outline {
        Outline::App(app) => verify_app(env, solver_env, root, time, app.clone()).await,
        Outline::Pkg(pkg) => verify_pkg(env, solver_env, root, time, pkg.clone()).await,
    }
    .map(drop)
}

async fn generate(env: &Env, root: &Path, new_time: ModTime) -> Result<Details, DetailsError> {
    info!(root = %root.display(), "generating details");
    // A broken manifest is reported even when the registry is unreachable.
    let outline = maestro_outline::read(env.fs.as_ref(), root).map_err(DetailsError::BadOutline)?;
    let solver_env = init_env(
        Arc::clone(&env.fs),
        Arc::clone(&env.transport),
        env.site.clone(),
        env.cache.clone(),
    )
    .await
    .map_err(DetailsError::CannotGetRegistry)?;

    match outline {
        Outline::App(app) => verify_app(env, &solver_env, root, new_time, app).await,
        Outline::Pkg(pkg) => verify_pkg(env, &solver_env, root, new_time, pkg).await,
    }
}

async fn verify_app(
    env: &Env,
    solver_env: &SolverEnv,
    root: &Path,
    time: ModTime,
    outline: AppOutline,
) -> Result<Details, DetailsError> {
    if outline.elm_version != compiler_version() {
        return Err(DetailsError::BadElmInAppOutline {
            version: outline.elm_version,
        });
    }

    let stated = check_app_deps(&outline)?;
    let exact: BTreeMap<PkgName, Constraint> = stated
        .iter()
        .map(|(pkg, version)| (*pkg, Constraint::exactly(version.clone())))
        .collect();
    let actual = verify_constraints(solver_env, &exact).await?;
    // An untouched manifest solves to exactly its stated package set; any
    // difference means the dependency lists were edited by hand.
    if stated.len() != actual.len() {
        return Err(DetailsError::HandEditedDependencies);
    }

    let direct: BTreeSet<PkgName> = outline.deps.direct.keys().copied().collect();
    let valid = ValidOutline::App {
        source_dirs: outline.source_dirs,
    };
    build_details(env, root, time, valid, actual, direct).await
}

async fn verify_pkg(
    env: &Env,
    solver_env: &SolverEnv,
    root: &Path,
    time: ModTime,
    outline: PkgOutline,
) -> Result<Details, DetailsError> {
    if !outline.elm_constraint.admits_compiler() {
        return Err(DetailsError::BadElmInPkg {
            constraint: outline.elm_constraint,
        });
    }

    let constraints = union_no_dups(&outline.deps, &outline.test_deps)?;
    let actual = verify_constraints(solver_env, &constraints).await?;

    let direct: BTreeSet<PkgName> = outline.deps.keys().copied().collect();
    let valid = ValidOutline::Pkg {
        name: outline.name,
        exposed: outline.exposed.flatten(),
        exact_deps: actual
            .iter()
            .map(|(pkg, details)| (*pkg, details.version.clone()))
            .collect(),
    };
    build_details(env, root, time, valid, actual, direct).await
}

/// Merge the four application dependency blocks into the stated package
/// set, enforcing the hand-edit invariants:
/// - `indirect` and `test.direct` may not disagree on a version
/// - `direct` and `test.indirect` may not overlap at all
/// - the two halves may not disagree on a version
fn check_app_deps(outline: &AppOutline) -> Result<BTreeMap<PkgName, Version>, DetailsError> {
    let x = union_allow_equal_dups(&outline.deps.indirect, &outline.test_deps.direct)?;
    let y = union_no_dups(&outline.deps.direct, &outline.test_deps.indirect)?;
    union_allow_equal_dups(&x, &y)
}

fn union_no_dups<V: Clone>(
    a: &BTreeMap<PkgName, V>,
    b: &BTreeMap<PkgName, V>,
) -> Result<BTreeMap<PkgName, V>, DetailsError> {
    let mut merged = a.clone();
    for (pkg, value) in b {
        if merged.insert(*pkg, value.clone()).is_some() {
            return Err(DetailsError::HandEditedDependencies);
        }
    }
    Ok(merged)
}

fn union_allow_equal_dups<V: Clone + PartialEq>(
    a: &BTreeMap<PkgName, V>,
    b: &BTreeMap<PkgName, V>,
) -> Result<BTreeMap<PkgName, V>, DetailsError> {
    let mut merged = a.clone();
    for (pkg, value) in b {
        match merged.get(pkg) {
            None => {
                merged.insert(*pkg, value.clone());
            }
            Some(existing) if existing == value => {}
            Some(_) => return Err(DetailsError::HandEditedDependencies),
        }
    }
    Ok(merged)
}

async fn verify_constraints(
    solver_env: &SolverEnv,
    constraints: &BTreeMap<PkgName, Constraint>,
) -> Result<Solution, DetailsError> {
    Solver::new(solver_env)
        .verify(constraints)
        .await
        .map_err(|error| match error {
            SolverError::NoSolution => DetailsError::NoSolution,
            SolverError::NoOfflineSolution => DetailsError::NoOfflineSolution,
            SolverError::Problem(problem) => DetailsError::SolverProblem(problem),
        })
}

async fn build_details(
    env: &Env,
    root: &Path,
    time: ModTime,
    outline: ValidOutline,
    solution: Solution,
    direct: BTreeSet<PkgName>,
) -> Result<Details, DetailsError> {
    let build_env = Arc::new(BuildEnv {
        fs: Arc::clone(&env.fs),
        transport: Arc::clone(&env.transport),
        site: env.site.clone(),
        cache: env.cache.clone(),
        compiler: Arc::clone(&env.compiler),
    });

    // The package cache is exclusively ours while dependencies build.
    let lock = {
        let fs = Arc::clone(&env.fs);
        let path = env.cache.lock_file();
        tokio::task::spawn_blocking(move || fs.lock_exclusive(&path))
            .await
            .map_err(|join_error| {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                lock_failure(env, "lock task cancelled")
            })?
            .map_err(|io_error| lock_failure(env, &io_error.to_string()))?
    };
    let artifacts = verify_dependencies(build_env, &solution).await;
    drop(lock);

    let artifacts = artifacts.map_err(|problems| DetailsError::BadDeps {
        home: env.cache.home().to_path_buf(),
        problems,
    })?;

    let interfaces = gather_interfaces(&artifacts, &direct);
    let objects = gather_objects(&artifacts);
    let foreigns = gather_foreigns(&artifacts, &direct);

    let mut details = with_scope(Arc::clone(&env.fs), async |writer| {
        writer.write_dat(stuff::objects_file(root), &objects);
        writer.write_dat(stuff::interfaces_file(root), &interfaces);
        let details = Details {
            outline_time: time,
            outline,
            build_id: 0,
            locals: BTreeMap::new(),
            foreigns,
            extras: Extras::Cached,
        };
        writer.write_dat(stuff::details_file(root), &details);
        details
    })
    .await
    .map_err(DetailsError::CannotWrite)?;

    details.extras = Extras::Fresh {
        interfaces,
        objects,
    };
    info!(root = %root.display(), "details generated");
    Ok(details)
}

fn lock_failure(env: &Env, message: &str) -> DetailsError {
    DetailsError::CannotWrite(WriteFailure {
        path: env.cache.lock_file(),
        message: message.to_owned(),
    })
}
