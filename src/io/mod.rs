//! External data access: raster archive, elevation source and sample labels

pub mod archive;
pub mod dem;
pub mod samples;

pub use archive::{InMemoryArchive, RasterSource, SceneQuery, Sensor};
pub use dem::{DemReader, ElevationSource};
pub use samples::{parse_sample_labels, read_sample_labels};
