//! TerraStream - spatio-temporal result cache and query scheduler
//!
//! This library provides the core of a geospatial data-processing server:
//! operator results (rasters, feature collections, plots) are memoized in a
//! size-bounded cache keyed by a semantic fingerprint and retrieved by query
//! rectangle containment, and incoming queries are routed to worker nodes with
//! locality-aware placement.
//!
//! # High-Level API
//!
//! ```ignore
//! use terrastream::cache;
//! use terrastream::config::Settings;
//!
//! let settings = Settings::load_default_paths();
//! cache::init(cache::manager_from_settings(&settings))?;
//!
//! let manager = cache::instance()?;
//! match manager.raster_cache().get(fingerprint, &query) {
//!     Some(raster) => serve(raster),
//!     None => {
//!         let raster = evaluate_operator_graph(fingerprint, &query)?;
//!         manager.raster_cache().put(fingerprint, &raster);
//!         serve(raster)
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod datatypes;
pub mod logging;
pub mod scheduler;
pub mod tilestore;
pub mod wire;

/// Version of the TerraStream library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
