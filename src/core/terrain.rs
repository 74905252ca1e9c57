//! Terrain features: elevation and elevation-threshold indicators

use crate::io::dem::{DemReader, ElevationSource};
use crate::raster::{Band, RasterTile};
use crate::types::{LandcoverError, LandcoverResult, TargetGrid};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Comparison applied by an indicator band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    /// `elevation < threshold`
    Below,
    /// `elevation >= threshold`
    AtOrAbove,
}

/// Binary band marking pixels on one side of an elevation threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationThreshold {
    pub name: String,
    pub op: ThresholdOp,
    /// Metres
    pub threshold: f32,
}

impl ElevationThreshold {
    pub fn new(name: &str, op: ThresholdOp, threshold: f32) -> Self {
        Self {
            name: name.to_string(),
            op,
            threshold,
        }
    }

    pub fn test(&self, elevation: f32) -> bool {
        match self.op {
            ThresholdOp::Below => elevation < self.threshold,
            ThresholdOp::AtOrAbove => elevation >= self.threshold,
        }
    }
}

/// Terrain feature parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Band read from the elevation tiles
    pub source_band: String,
    /// Output name of the elevation band
    pub elevation_band: String,
    /// Name of the all-ones band; `None` omits it
    pub constant_band: Option<String>,
    pub thresholds: Vec<ElevationThreshold>,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            source_band: "DEM".to_string(),
            elevation_band: "Elevation".to_string(),
            constant_band: Some("constant".to_string()),
            thresholds: vec![
                ElevationThreshold::new("Below_3700m", ThresholdOp::Below, 3700.0),
                ElevationThreshold::new("Above_3800m", ThresholdOp::AtOrAbove, 3800.0),
                ElevationThreshold::new("Above_3200m", ThresholdOp::AtOrAbove, 3200.0),
            ],
        }
    }
}

impl TerrainParams {
    /// Output band names, in output order
    pub fn band_names(&self) -> Vec<String> {
        std::iter::once(self.elevation_band.clone())
            .chain(self.constant_band.clone())
            .chain(self.thresholds.iter().map(|t| t.name.clone()))
            .collect()
    }
}

/// Builds the terrain tile from an elevation source
pub struct TerrainFeatureBuilder<'a> {
    source: &'a dyn ElevationSource,
    params: TerrainParams,
}

impl<'a> TerrainFeatureBuilder<'a> {
    pub fn new(source: &'a dyn ElevationSource) -> Self {
        Self::with_params(source, TerrainParams::default())
    }

    pub fn with_params(source: &'a dyn ElevationSource, params: TerrainParams) -> Self {
        Self { source, params }
    }

    /// Elevation, the constant band and the threshold indicators on the
    /// target grid. Every band is invalid where the elevation is.
    pub fn build(&self, grid: &TargetGrid) -> LandcoverResult<RasterTile> {
        log::info!("Building terrain features");

        let tiles = self.source.query_elevation(&grid.bounds())?;
        if tiles.is_empty() {
            log::warn!("No elevation tiles cover the region; terrain bands will be invalid");
        }
        let elevation = DemReader::create_dem_mosaic(&tiles, &self.params.source_band, grid)?
            .renamed(self.params.elevation_band.as_str());

        let terrain = Self::derive_bands(&elevation, &self.params, grid)?;
        log::info!(
            "Terrain features complete: {} bands, {} valid pixels",
            terrain.band_count(),
            elevation.valid_count()
        );
        Ok(terrain)
    }

    /// Terrain tile from an elevation band already on the target grid
    pub fn derive_bands(elevation: &Band, params: &TerrainParams, grid: &TargetGrid) -> LandcoverResult<RasterTile> {
        if elevation.shape() != grid.shape() {
            return Err(LandcoverError::ShapeMismatch {
                expected: grid.shape(),
                found: elevation.shape(),
            });
        }

        let mut terrain = RasterTile::new(grid);
        terrain.add_band(elevation.renamed(params.elevation_band.as_str()))?;

        if let Some(name) = &params.constant_band {
            terrain.add_band(indicator_band(name, elevation, |_| true))?;
        }
        for threshold in &params.thresholds {
            log::debug!(
                "Indicator {}: {:?} {} m",
                threshold.name,
                threshold.op,
                threshold.threshold
            );
            terrain.add_band(indicator_band(&threshold.name, elevation, |e| threshold.test(e)))?;
        }
        Ok(terrain)
    }
}

/// 1.0 where `predicate` holds, 0.0 elsewhere, invalid where `elevation` is
fn indicator_band<F>(name: &str, elevation: &Band, predicate: F) -> Band
where
    F: Fn(f32) -> bool,
{
    let mut values = elevation.values.clone();
    Zip::from(&mut values)
        .and(&elevation.valid)
        .for_each(|value, &valid| {
            *value = if !valid {
                f32::NAN
            } else if predicate(*value) {
                1.0
            } else {
                0.0
            };
        });

    Band {
        name: name.to_string(),
        values,
        valid: elevation.valid.clone(),
    }
}
