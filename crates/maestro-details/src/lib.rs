//! The project details engine.
//!
//! Given `<root>/elm.json`, [`load`] produces a verified [`Details`]: the
//! validated outline, every dependency package solved, downloaded, built (or
//! reused from the fingerprint-keyed artifact cache), the aggregated
//! interface and foreign maps, and the whole record persisted under
//! `elm-stuff/` for the next run.

mod error;
mod load;
mod record;
pub mod stuff;

pub use error::DetailsError;
pub use load::{Env, load, verify_install};
pub use record::{Details, Extras, Local, ValidOutline, load_interfaces, load_objects};

// The foreigns map stored in `Details` uses the builder's `Foreign` record.
pub use maestro_builder::Foreign;
