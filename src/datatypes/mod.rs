//! Core data model: spatio-temporal references, rasters, feature collections
//! and plots. Everything a cache entry or a query carries lives here.

mod collections;
mod plot;
mod raster;
mod stref;

pub use collections::{
    AttributeMaps, Coordinate, FeatureAttributes, FeatureBase, LineCollection, PointCollection,
    PolygonCollection, TimeInterval,
};
pub use plot::Plot;
pub use raster::{DataType, Raster};
pub use stref::{AxisFlip, Crs, QueryRect, Resolution, SpatioTemporalRef, TimeKind};

use thiserror::Error;

/// Errors raised by the data model.
#[derive(Debug, Error)]
pub enum DatatypeError {
    /// Constructor or operation invariant violated; fatal to the request.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Feature collection structure violated (offsets, ring closure, ...).
    #[error("feature error: {0}")]
    Feature(String),
}
