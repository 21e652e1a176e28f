//! The solver environment.
//!
//! `init_env` assembles everything one verify run needs: the package cache,
//! the transport, the registry, and whether the run is online. The registry
//! comes from `registry.dat` when present; otherwise one network refresh is
//! attempted, and failing that the unpacked cache is scanned so offline
//! machines can still solve against what they have.

use maestro_core::{Fs, PackageCache};
use maestro_fetch::{Site, Transport};
use maestro_registry::{Registry, RegistryProblem};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether candidate metadata may be fetched over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Online,
    Offline,
}

/// Everything a solve needs.
#[derive(Debug, Clone)]
pub struct SolverEnv {
    pub fs: Arc<dyn Fs>,
    pub transport: Arc<dyn Transport>,
    pub site: Site,
    pub cache: PackageCache,
    pub connection: Connection,
    pub registry: Registry,
}

/// Build a [`SolverEnv`] for one run.
///
/// Fails with the refresh problem only when there is no cached registry, the
/// network refresh fails, *and* the package cache holds nothing to scan.
pub async fn init_env(
    fs: Arc<dyn Fs>,
    transport: Arc<dyn Transport>,
    site: Site,
    cache: PackageCache,
) -> Result<SolverEnv, RegistryProblem> {
    let make = |connection, registry| SolverEnv {
        fs: Arc::clone(&fs),
        transport: Arc::clone(&transport),
        site: site.clone(),
        cache: cache.clone(),
        connection,
        registry,
    };

    if let Some(registry) = Registry::read(fs.as_ref(), &cache) {
        return Ok(make(Connection::Online, registry));
    }

    match Registry::fetch(fs.as_ref(), transport.as_ref(), &site, &cache).await {
        Ok(registry) => Ok(make(Connection::Online, registry)),
        Err(problem) => match Registry::scan(fs.as_ref(), &cache) {
            Some(registry) => {
                warn!(%problem, "registry refresh failed, solving offline");
                Ok(make(Connection::Offline, registry))
            }
            None => {
                info!(%problem, "registry unavailable online and offline");
                Err(problem)
            }
        },
    }
}
