//! Per-package dependency verification and building.
//!
//! Every package in the solution gets its own task. A task first probes the
//! cache: unpacked sources plus an `artifacts.json` whose fingerprint set
//! contains the current fingerprint mean the artifacts are reused outright.
//! Anything else builds: wait for the package's own direct dependencies,
//! resolve the foreign namespace, crawl the exposed modules concurrently,
//! refuse import cycles, compile each module once its imports are compiled,
//! and persist the grown artifact cache.
//!
//! Failures never stop sibling packages; they run to completion and the
//! aggregated problems are reported together.

use crate::artifacts::{ArtifactCache, Artifacts, Fingerprint, fingerprint_of};
use crate::cell::Cell;
use crate::foreign::{ForeignInterface, gather_foreign_interfaces};
use dashmap::DashMap;
use maestro_core::fs::Fs;
use maestro_core::{
    Chunk, DependencyInterface, Interface, LocalGraph, ModuleCompiler, ModuleDocs, Name,
    PackageCache, ParsedModule, PkgName, Version, json, module,
};
use maestro_fetch::{DownloadProblem, Site, Transport, download_package};
use maestro_outline::Outline;
use maestro_solver::Solution;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Everything a dependency build needs from the outside.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub fs: Arc<dyn Fs>,
    pub transport: Arc<dyn Transport>,
    pub site: Site,
    pub cache: PackageCache,
    pub compiler: Arc<dyn ModuleCompiler>,
}

/// One dependency that could not be provided.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BadDep {
    #[error("could not download {pkg} {version}: {problem}")]
    BadDownload {
        pkg: PkgName,
        version: Version,
        problem: DownloadProblem,
    },
    #[error("could not build {pkg} {version}")]
    BadBuild {
        pkg: PkgName,
        version: Version,
        fingerprint: Fingerprint,
    },
}

impl BadDep {
    #[must_use]
    pub fn pkg(&self) -> PkgName {
        match self {
            Self::BadDownload { pkg, .. } | Self::BadBuild { pkg, .. } => *pkg,
        }
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        match self {
            Self::BadDownload { version, .. } | Self::BadBuild { version, .. } => version,
        }
    }
}

type DepCell = Cell<Option<Arc<Artifacts>>>;

/// Provide artifacts for every package in `solution`, building in parallel.
///
/// Each package's task awaits only its own declared direct dependencies.
/// All failures are collected; siblings are never cancelled.
pub async fn verify_dependencies(
    env: Arc<BuildEnv>,
    solution: &Solution,
) -> Result<BTreeMap<PkgName, Arc<Artifacts>>, Vec<BadDep>> {
    info!(packages = solution.len(), "verifying dependencies");
    let versions: Arc<BTreeMap<PkgName, Version>> = Arc::new(
        solution
            .iter()
            .map(|(pkg, details)| (*pkg, details.version.clone()))
            .collect(),
    );
    let cells: Arc<BTreeMap<PkgName, DepCell>> =
        Arc::new(solution.keys().map(|pkg| (*pkg, Cell::new())).collect());

    let mut tasks = tokio::task::JoinSet::new();
    for (pkg, details) in solution {
        tasks.spawn(verify_dep(
            Arc::clone(&env),
            Arc::clone(&cells),
            Arc::clone(&versions),
            *pkg,
            details.clone(),
        ));
    }

    let mut artifacts = BTreeMap::new();
    let mut problems = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((pkg, built))) => {
                artifacts.insert(pkg, built);
            }
            Ok(Err(problem)) => problems.push(problem),
            Err(join_error) => {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(artifacts)
    } else {
        problems.sort_by(|a, b| (a.pkg(), a.version()).cmp(&(b.pkg(), b.version())));
        Err(problems)
    }
}

async fn verify_dep(
    env: Arc<BuildEnv>,
    cells: Arc<BTreeMap<PkgName, DepCell>>,
    versions: Arc<BTreeMap<PkgName, Version>>,
    pkg: PkgName,
    details: maestro_solver::Details,
) -> Result<(PkgName, Arc<Artifacts>), BadDep> {
    let fingerprint = fingerprint_of(&versions, &details.deps);
    let outcome = verify_dep_inner(&env, &cells, pkg, &details.version, fingerprint).await;
    let cell = &cells[&pkg];
    match outcome {
        Ok(artifacts) => {
            cell.put(Some(Arc::clone(&artifacts)));
            Ok((pkg, artifacts))
        }
        Err(problem) => {
            cell.put(None);
            Err(problem)
        }
    }
}

async fn verify_dep_inner(
    env: &Arc<BuildEnv>,
    cells: &Arc<BTreeMap<PkgName, DepCell>>,
    pkg: PkgName,
    version: &Version,
    fingerprint: Fingerprint,
) -> Result<Arc<Artifacts>, BadDep> {
    if env.fs.is_dir(&env.cache.src_dir(pkg, version)) {
        let cached = ArtifactCache::read(env.fs.as_ref(), &env.cache.artifacts_file(pkg, version));
        match cached {
            Some(cache) if cache.fingerprints.contains(&fingerprint) => {
                debug!(pkg = %pkg, %version, "artifacts reused");
                Ok(Arc::new(cache.artifacts))
            }
            Some(cache) => build(env, cells, pkg, version, fingerprint, cache.fingerprints).await,
            None => build(env, cells, pkg, version, fingerprint, BTreeSet::new()).await,
        }
    } else {
        info!(pkg = %pkg, %version, "downloading");
        download_package(
            env.fs.as_ref(),
            env.transport.as_ref(),
            &env.site,
            &env.cache,
            pkg,
            version,
        )
        .await
        .map_err(|problem| BadDep::BadDownload {
            pkg,
            version: version.clone(),
            problem,
        })?;
        build(env, cells, pkg, version, fingerprint, BTreeSet::new()).await
    }
}

/// The crawl state of one module inside a package build.
#[derive(Debug, Clone)]
enum Status {
    Local {
        needs_docs: bool,
        deps: Vec<Name>,
        module: Arc<ParsedModule>,
    },
    Foreign(Arc<Interface>),
    KernelLocal(Vec<Chunk>),
    KernelForeign,
}

/// The compile result of one module. Broken modules have no result.
#[derive(Debug, Clone)]
enum DResult {
    Local {
        interface: Arc<Interface>,
        objects: LocalGraph,
        docs: Option<ModuleDocs>,
    },
    Foreign(Arc<Interface>),
    KernelLocal(Vec<Chunk>),
    KernelForeign,
}

impl DResult {
    /// The interface an importer sees. Kernel modules provide none.
    fn interface(&self) -> Option<&Arc<Interface>> {
        match self {
            Self::Local { interface, .. } | Self::Foreign(interface) => Some(interface),
            Self::KernelLocal(_) | Self::KernelForeign => None,
        }
    }
}

struct CrawlCtx {
    env: Arc<BuildEnv>,
    pkg: PkgName,
    src: PathBuf,
    foreigns: BTreeMap<Name, ForeignInterface>,
    statuses: DashMap<Name, Cell<Option<Status>>>,
    tracker: TaskTracker,
}

async fn build(
    env: &Arc<BuildEnv>,
    cells: &Arc<BTreeMap<PkgName, DepCell>>,
    pkg: PkgName,
    version: &Version,
    fingerprint: Fingerprint,
    mut fingerprints: BTreeSet<Fingerprint>,
) -> Result<Arc<Artifacts>, BadDep> {
    let bad = || BadDep::BadBuild {
        pkg,
        version: version.clone(),
        fingerprint: fingerprint.clone(),
    };
    debug!(pkg = %pkg, %version, "building");

    let outline = maestro_outline::read(env.fs.as_ref(), &env.cache.package_dir(pkg, version))
        .map_err(|_| bad())?;
    let Outline::Pkg(outline) = outline else {
        return Err(bad());
    };

    // Wait for this package's own direct deps; any failed dep fails us.
    let mut direct = BTreeMap::new();
    for dep in outline.deps.keys() {
        let Some(cell) = cells.get(dep) else {
            return Err(bad());
        };
        match cell.read().await.as_ref() {
            Some(artifacts) => {
                direct.insert(*dep, Arc::clone(artifacts));
            }
            None => return Err(bad()),
        }
    }

    let exposed: BTreeSet<Name> = outline.exposed.flatten().into_iter().collect();
    let needs_docs = !env.fs.exists(&env.cache.docs_file(pkg, version));

    // Crawl all exposed modules concurrently; imports fan out as they are
    // discovered. Every exposed name is registered before any crawl runs,
    // so an import can never claim an exposed module without its docs flag.
    let ctx = Arc::new(CrawlCtx {
        env: Arc::clone(env),
        pkg,
        src: env.cache.src_dir(pkg, version),
        foreigns: gather_foreign_interfaces(&direct),
        statuses: DashMap::new(),
        tracker: TaskTracker::new(),
    });
    let roots: Vec<(Name, Cell<Option<Status>>)> = exposed
        .iter()
        .map(|name| {
            let cell = Cell::new();
            ctx.statuses.insert(*name, cell.clone());
            (*name, cell)
        })
        .collect();
    for (name, cell) in roots {
        let ctx = Arc::clone(&ctx);
        ctx.tracker.clone().spawn(async move {
            let status = crawl_module(&ctx, name, needs_docs);
            cell.put(status);
        });
    }
    ctx.tracker.close();
    ctx.tracker.wait().await;

    let mut statuses: BTreeMap<Name, Option<Status>> = ctx
        .statuses
        .iter()
        .map(|entry| {
            let status = entry.value().try_read().and_then(|status| (*status).clone());
            (*entry.key(), status)
        })
        .collect();

    // Import cycles would deadlock the compile waits below; break them by
    // marking every member broken.
    for name in cyclic_modules(&statuses) {
        debug!(pkg = %pkg, module = %name, "import cycle");
        statuses.insert(name, None);
    }

    // Compile each module once its imports are compiled.
    let results: Arc<BTreeMap<Name, Cell<Option<DResult>>>> =
        Arc::new(statuses.keys().map(|name| (*name, Cell::new())).collect());
    let compiles = TaskTracker::new();
    for (name, status) in statuses {
        let env = Arc::clone(env);
        let results = Arc::clone(&results);
        compiles.spawn(async move {
            let value = compile_module(&env, pkg, &results, status).await;
            results[&name].put(value);
        });
    }
    compiles.close();
    compiles.wait().await;

    let mut compiled = BTreeMap::new();
    for (name, cell) in results.iter() {
        match cell.try_read().and_then(|result| (*result).clone()) {
            Some(result) => {
                compiled.insert(*name, result);
            }
            None => return Err(bad()),
        }
    }

    let (artifacts, docs) = gather_package(&exposed, compiled);

    if needs_docs {
        let encoded = json::to_vec(&docs).map_err(|_| bad())?;
        env.fs
            .write_binary(&env.cache.docs_file(pkg, version), &encoded)
            .map_err(|_| bad())?;
    }

    fingerprints.insert(fingerprint.clone());
    let cache = ArtifactCache {
        fingerprints,
        artifacts,
    };
    cache
        .write(env.fs.as_ref(), &env.cache.artifacts_file(pkg, version))
        .map_err(|_| bad())?;
    info!(pkg = %pkg, %version, modules = cache.artifacts.interfaces.len(), "built");
    Ok(Arc::new(cache.artifacts))
}

/// Spawn a crawl for `name` unless one is already registered.
fn enqueue_crawl(ctx: &Arc<CrawlCtx>, name: Name, needs_docs: bool) {
    match ctx.statuses.entry(name) {
        dashmap::mapref::entry::Entry::Occupied(_) => {}
        dashmap::mapref::entry::Entry::Vacant(vacant) => {
            let cell = Cell::new();
            vacant.insert(cell.clone());
            let ctx = Arc::clone(ctx);
            ctx.tracker.clone().spawn(async move {
                let status = crawl_module(&ctx, name, needs_docs);
                cell.put(status);
            });
        }
    }
}

/// Crawl one module name. `None` means broken: ambiguous foreign, a local
/// file shadowing a foreign module, a missing file, a parse failure, or a
/// name mismatch.
fn crawl_module(ctx: &Arc<CrawlCtx>, name: Name, needs_docs: bool) -> Option<Status> {
    let path = ctx.src.join(module::raw_to_path(name, "elm"));
    let exists = ctx.env.fs.exists(&path);
    match ctx.foreigns.get(&name) {
        Some(ForeignInterface::Ambiguous) => None,
        Some(ForeignInterface::Specific(interface)) => {
            if exists {
                None
            } else {
                Some(Status::Foreign(Arc::clone(interface)))
            }
        }
        None => {
            if exists {
                crawl_file(ctx, name, needs_docs, &path)
            } else if ctx.pkg.is_kernel() && module::is_kernel_raw(name) {
                crawl_kernel(ctx, name)
            } else {
                None
            }
        }
    }
}

fn crawl_file(
    ctx: &Arc<CrawlCtx>,
    name: Name,
    needs_docs: bool,
    path: &std::path::Path,
) -> Option<Status> {
    let bytes = ctx.env.fs.read_binary(path).ok()?;
    let parsed = ctx.env.compiler.parse(ctx.pkg, &bytes).ok()?;
    if parsed.name != name {
        return None;
    }
    let deps = parsed.imports.clone();
    for import in &deps {
        enqueue_crawl(ctx, *import, false);
    }
    Some(Status::Local {
        needs_docs,
        deps,
        module: Arc::new(parsed),
    })
}

fn crawl_kernel(ctx: &Arc<CrawlCtx>, name: Name) -> Option<Status> {
    let path = ctx.src.join(module::raw_to_path(name, "js"));
    if !ctx.env.fs.exists(&path) {
        return Some(Status::KernelForeign);
    }
    let bytes = ctx.env.fs.read_binary(&path).ok()?;
    let foreign_homes: BTreeMap<Name, PkgName> = ctx
        .foreigns
        .iter()
        .filter_map(|(module, foreign)| match foreign {
            ForeignInterface::Specific(interface) => Some((*module, interface.home)),
            ForeignInterface::Ambiguous => None,
        })
        .collect();
    let kernel = ctx.env.compiler.parse_kernel(ctx.pkg, &foreign_homes, &bytes)?;
    for import in &kernel.imports {
        enqueue_crawl(ctx, *import, false);
    }
    Some(Status::KernelLocal(kernel.chunks))
}

/// Members of non-trivial import cycles (including self-imports) among the
/// crawled local modules.
fn cyclic_modules(statuses: &BTreeMap<Name, Option<Status>>) -> BTreeSet<Name> {
    let mut graph = petgraph::graph::DiGraph::<Name, ()>::new();
    let mut indices = BTreeMap::new();
    for (name, status) in statuses {
        if matches!(status, Some(Status::Local { .. })) {
            indices.insert(*name, graph.add_node(*name));
        }
    }
    for (name, status) in statuses {
        let Some(Status::Local { deps, .. }) = status else {
            continue;
        };
        let from = indices[name];
        for dep in deps {
            if let Some(to) = indices.get(dep) {
                graph.add_edge(from, *to, ());
            }
        }
    }

    let mut cyclic = BTreeSet::new();
    for component in petgraph::algo::tarjan_scc(&graph) {
        if component.len() > 1 {
            cyclic.extend(component.iter().map(|index| graph[*index]));
        } else if let [only] = component[..]
            && graph.contains_edge(only, only)
        {
            cyclic.insert(graph[only]);
        }
    }
    cyclic
}

/// Compile one module after its imports are compiled. `None` means broken:
/// a broken import or a compile failure.
async fn compile_module(
    env: &Arc<BuildEnv>,
    pkg: PkgName,
    results: &Arc<BTreeMap<Name, Cell<Option<DResult>>>>,
    status: Option<Status>,
) -> Option<DResult> {
    match status? {
        Status::Foreign(interface) => Some(DResult::Foreign(interface)),
        Status::KernelLocal(chunks) => Some(DResult::KernelLocal(chunks)),
        Status::KernelForeign => Some(DResult::KernelForeign),
        Status::Local {
            needs_docs,
            deps,
            module,
        } => {
            let mut interfaces = BTreeMap::new();
            for dep in deps {
                let result = results.get(&dep)?.read().await;
                let result = result.as_ref().as_ref()?;
                if let Some(interface) = result.interface() {
                    interfaces.insert(dep, interface.as_ref().clone());
                }
            }
            let compiled = env
                .compiler
                .compile(pkg, &interfaces, &module, needs_docs)
                .ok()?;
            Some(DResult::Local {
                interface: Arc::new(compiled.interface),
                objects: compiled.objects,
                docs: compiled.docs,
            })
        }
    }
}

/// Fold per-module results into the package's artifacts: exposed locals are
/// public, other locals private, kernel chunks join the object graph, and
/// foreign pass-throughs contribute nothing.
fn gather_package(
    exposed: &BTreeSet<Name>,
    results: BTreeMap<Name, DResult>,
) -> (Artifacts, Vec<ModuleDocs>) {
    let mut artifacts = Artifacts::default();
    let mut docs = Vec::new();
    for (name, result) in results {
        match result {
            DResult::Local {
                interface,
                objects,
                docs: module_docs,
            } => {
                let interface = interface.as_ref().clone();
                let visibility = if exposed.contains(&name) {
                    DependencyInterface::public(interface)
                } else {
                    DependencyInterface::private(interface)
                };
                artifacts.interfaces.insert(name, visibility);
                artifacts.objects.add_local_graph(&objects);
                if let Some(module_docs) = module_docs {
                    docs.push(module_docs);
                }
            }
            DResult::KernelLocal(chunks) => artifacts.objects.add_kernel(name, chunks),
            DResult::Foreign(_) | DResult::KernelForeign => {}
        }
    }
    (artifacts, docs)
}
