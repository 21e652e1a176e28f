//! Dependency constraint solving for the Maestro details engine.
//!
//! [`init_env`] prepares a [`SolverEnv`] (registry + connection mode);
//! [`Solver::verify`] turns a map of constraints into an exact version
//! assignment, or one of the failures in [`SolverError`].

mod env;
mod solver;

pub use env::{Connection, SolverEnv, init_env};
pub use solver::{Details, Solution, Solver, SolverError, SolverProblem};
