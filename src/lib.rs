//! landcover: seasonal multi-sensor land-cover classification
//!
//! Builds a per-pixel feature stack from cloud-masked Sentinel-2 seasonal
//! composites, spectral indices, Sentinel-1 backscatter and terrain, trains
//! a one-vs-one support-vector classifier on labelled samples, reports
//! its accuracy on held-out samples and cleans small patches out of the
//! final map.

pub mod types;
pub mod raster;
pub mod io;
pub mod core;
pub mod config;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, ClassCode, CoordinateSystem, DateRange, GeoTransform, LandcoverError, LandcoverResult,
    Polarization, AcquisitionMode, OrbitPass, RadarMetadata, SampleLabel, SceneId, SceneMetadata, Season,
    TargetGrid,
};
pub use raster::{Band, ClassifiedRaster, RasterCollection, RasterTile};
pub use io::{DemReader, ElevationSource, InMemoryArchive, RasterSource, SceneQuery, Sensor};
pub use config::{LegendEntry, PipelineConfig, VisualizationParams};
pub use pipeline::{LandcoverPipeline, PipelineOutput};
