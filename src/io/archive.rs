use crate::raster::{RasterCollection, RasterTile};
use crate::types::{BoundingBox, DateRange, LandcoverResult};
use serde::{Deserialize, Serialize};

/// Products served by the raster archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    /// Sentinel-2 harmonized surface reflectance
    OpticalReflectance,
    /// Sentinel-2 per-scene cloud probability
    CloudProbability,
    /// Sentinel-1 GRD backscatter
    RadarBackscatter,
}

/// Scene query against the archive
#[derive(Debug, Clone, PartialEq)]
pub struct SceneQuery {
    pub sensor: Sensor,
    pub dates: DateRange,
    pub bounds: BoundingBox,
    /// Bands to return; `None` returns every band
    pub bands: Option<Vec<String>>,
}

impl SceneQuery {
    pub fn new(sensor: Sensor, dates: DateRange, bounds: BoundingBox) -> Self {
        Self {
            sensor,
            dates,
            bounds,
            bands: None,
        }
    }

    pub fn with_bands<S: AsRef<str>>(mut self, bands: &[S]) -> Self {
        self.bands = Some(bands.iter().map(|b| b.as_ref().to_string()).collect());
        self
    }
}

/// Access to archived scenes.
///
/// Implementations return tiles already aligned to the study region's
/// target grid, ordered by acquisition time. Retrying slow or failed
/// remote requests is the implementation's concern.
pub trait RasterSource: Send + Sync {
    fn query(&self, query: &SceneQuery) -> LandcoverResult<RasterCollection>;
}

/// Archive holding scenes in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchive {
    scenes: Vec<(Sensor, RasterTile)>,
    elevation: Vec<RasterTile>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scene(&mut self, sensor: Sensor, tile: RasterTile) {
        self.scenes.push((sensor, tile));
    }

    pub fn add_elevation(&mut self, tile: RasterTile) {
        self.elevation.push(tile);
    }

    pub fn scene_count(&self, sensor: Sensor) -> usize {
        self.scenes.iter().filter(|(s, _)| *s == sensor).count()
    }

    pub(crate) fn elevation_tiles(&self) -> &[RasterTile] {
        &self.elevation
    }
}

impl RasterSource for InMemoryArchive {
    fn query(&self, query: &SceneQuery) -> LandcoverResult<RasterCollection> {
        let mut matching: Vec<RasterTile> = self
            .scenes
            .iter()
            .filter(|(sensor, _)| *sensor == query.sensor)
            .map(|(_, tile)| tile.clone())
            .collect();
        matching.sort_by_key(|tile| tile.metadata.acquired);

        let collection = RasterCollection::new(matching)
            .filter_date(&query.dates)
            .filter_bounds(&query.bounds);

        let collection = match &query.bands {
            Some(bands) => collection.select(bands)?,
            None => collection,
        };

        log::debug!(
            "Archive query {:?} {}..{} returned {} scenes",
            query.sensor,
            query.dates.start,
            query.dates.end,
            collection.len()
        );
        Ok(collection)
    }
}
