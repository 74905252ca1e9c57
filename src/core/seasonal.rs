use crate::core::cloud_mask::{CloudMaskParams, CloudMasker};
use crate::core::composite::Compositor;
use crate::core::gap_fill::{GapFillParams, GapFiller};
use crate::core::indices::{IndexCalculator, IndexDefinition};
use crate::core::scene_merge::SceneMerger;
use crate::io::archive::{RasterSource, SceneQuery, Sensor};
use crate::raster::{RasterCollection, RasterTile};
use crate::types::{
    AcquisitionMode, LandcoverError, LandcoverResult, OrbitPass, Polarization, Season, TargetGrid,
};
use serde::{Deserialize, Serialize};

/// Optical compositing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalParams {
    /// Composite bands kept as features, in output order
    pub feature_bands: Vec<String>,
    /// Factor converting archive digital numbers to reflectance
    pub reflectance_scale: f32,
    pub cloud_mask: CloudMaskParams,
}

impl Default for OpticalParams {
    fn default() -> Self {
        Self {
            feature_bands: ["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B11"]
                .iter()
                .map(|b| b.to_string())
                .collect(),
            reflectance_scale: 1.0e-4,
            cloud_mask: CloudMaskParams::default(),
        }
    }
}

/// Radar scene selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarParams {
    /// Polarizations every scene must carry; also the composited bands
    pub polarizations: Vec<Polarization>,
    pub acquisition_mode: AcquisitionMode,
    pub orbit_pass: OrbitPass,
}

impl Default for RadarParams {
    fn default() -> Self {
        Self {
            polarizations: vec![Polarization::VV, Polarization::VH],
            acquisition_mode: AcquisitionMode::IW,
            orbit_pass: OrbitPass::Descending,
        }
    }
}

impl RadarParams {
    pub fn band_names(&self) -> Vec<String> {
        self.polarizations.iter().map(|p| p.to_string()).collect()
    }

    /// Whether a scene matches the configured mode, pass and polarizations
    pub fn accepts(&self, tile: &RasterTile) -> bool {
        match &tile.metadata.radar {
            Some(radar) => {
                radar.acquisition_mode == self.acquisition_mode
                    && radar.orbit_pass == self.orbit_pass
                    && self
                        .polarizations
                        .iter()
                        .all(|p| radar.polarizations.contains(p))
            }
            None => false,
        }
    }
}

/// Parameters of one seasonal feature build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalFeatureParams {
    pub optical: OpticalParams,
    pub gap_fill: GapFillParams,
    pub indices: Vec<IndexDefinition>,
    pub radar: RadarParams,
}

impl Default for SeasonalFeatureParams {
    /// Eight optical bands, the four standard indices and VV/VH backscatter
    fn default() -> Self {
        Self {
            optical: OpticalParams::default(),
            gap_fill: GapFillParams::default(),
            indices: IndexDefinition::standard_set(),
            radar: RadarParams::default(),
        }
    }
}

impl SeasonalFeatureParams {
    /// Fail fast on index definitions that reference bands the optical
    /// composite will not carry
    pub fn validate(&self) -> LandcoverResult<()> {
        if self.optical.feature_bands.is_empty() {
            return Err(LandcoverError::InvalidParameter(
                "no optical feature bands configured".to_string(),
            ));
        }
        if self.radar.polarizations.is_empty() {
            return Err(LandcoverError::InvalidParameter(
                "no radar polarizations configured".to_string(),
            ));
        }
        for definition in &self.indices {
            for band in [&definition.band_a, &definition.band_b] {
                if !self.optical.feature_bands.contains(band) {
                    return Err(LandcoverError::InvalidBandReference {
                        band: band.clone(),
                        available: self.optical.feature_bands.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Output band names for a season, in output order
    pub fn band_names(&self, season: &Season) -> Vec<String> {
        self.optical
            .feature_bands
            .iter()
            .map(|b| season.suffixed(b))
            .chain(self.indices.iter().map(|d| season.suffixed(&d.name)))
            .chain(self.radar.band_names().iter().map(|b| season.suffixed(b)))
            .collect()
    }
}

/// Builds the optical, index and radar features of one season
pub struct SeasonalFeatureBuilder<'a> {
    source: &'a dyn RasterSource,
    params: SeasonalFeatureParams,
}

impl<'a> SeasonalFeatureBuilder<'a> {
    pub fn new(source: &'a dyn RasterSource, params: SeasonalFeatureParams) -> Self {
        Self { source, params }
    }

    /// Build the seasonal tile on the target grid.
    ///
    /// A season without usable optical or radar scenes yields fully
    /// invalid bands for that sensor rather than an error.
    pub fn build(&self, season: &Season, grid: &TargetGrid) -> LandcoverResult<RasterTile> {
        log::info!(
            "Building {} features ({} to {})",
            season.name,
            season.start,
            season.end
        );

        let optical = self.optical_composite(season, grid)?;
        let suffixed: Vec<String> = self
            .params
            .optical
            .feature_bands
            .iter()
            .map(|b| season.suffixed(b))
            .collect();
        let optical = optical.rename(&suffixed)?;

        let indices = IndexCalculator::compute(
            &optical,
            &self.params.indices,
            |band| season.suffixed(band),
            |definition| season.suffixed(&definition.name),
        )?;

        let radar = self.radar_composite(season, grid)?;

        let seasonal = optical.add_bands(&indices)?.add_bands(&radar)?;
        log::info!(
            "{} features complete: {} bands",
            season.name,
            seasonal.band_count()
        );
        Ok(seasonal)
    }

    /// Cloud-masked, gap-filled median of the season's optical scenes,
    /// restricted to the feature bands (unsuffixed names)
    pub fn optical_composite(&self, season: &Season, grid: &TargetGrid) -> LandcoverResult<RasterTile> {
        let optical_params = &self.params.optical;
        let dates = season.date_range();
        let bounds = grid.bounds();

        let scale = optical_params.reflectance_scale;
        let optical = self
            .source
            .query(&SceneQuery::new(Sensor::OpticalReflectance, dates, bounds))?
            .try_map(|tile| tile.scale_bands(&tile.band_names(), scale))?;

        let probability_band = [optical_params.cloud_mask.probability_band.as_str()];
        let clouds = self.source.query(
            &SceneQuery::new(Sensor::CloudProbability, dates, bounds).with_bands(&probability_band),
        )?;

        let join = SceneMerger::merge(&optical, &clouds)?;
        let masked = CloudMasker::with_params(optical_params.cloud_mask.clone())
            .mask_collection(&join.merged)?;

        let composite = match Self::composite_or_invalid(
            &masked,
            &optical_params.feature_bands,
            grid,
            &season.name,
            "optical",
        )? {
            Some(composite) => composite,
            None => return RasterTile::invalid(grid, &optical_params.feature_bands),
        };

        GapFiller::with_params(self.params.gap_fill.clone()).fill(&composite)
    }

    /// Median of the season's radar scenes matching mode, pass and
    /// polarizations, with season-suffixed band names
    pub fn radar_composite(&self, season: &Season, grid: &TargetGrid) -> LandcoverResult<RasterTile> {
        let radar_params = &self.params.radar;
        let bands = radar_params.band_names();

        let scenes = self
            .source
            .query(&SceneQuery::new(
                Sensor::RadarBackscatter,
                season.date_range(),
                grid.bounds(),
            ))?
            .filter(|tile| radar_params.accepts(tile));
        log::debug!(
            "{}: {} radar scenes match {:?} {:?}",
            season.name,
            scenes.len(),
            radar_params.acquisition_mode,
            radar_params.orbit_pass
        );

        let composite = match Self::composite_or_invalid(&scenes, &bands, grid, &season.name, "radar")? {
            Some(composite) => composite,
            None => RasterTile::invalid(grid, &bands)?,
        };

        let suffixed: Vec<String> = bands.iter().map(|b| season.suffixed(b)).collect();
        composite.rename(&suffixed)
    }

    /// Median composite of `bands`, or `None` when there is nothing to composite
    fn composite_or_invalid(
        scenes: &RasterCollection,
        bands: &[String],
        grid: &TargetGrid,
        season: &str,
        sensor: &str,
    ) -> LandcoverResult<Option<RasterTile>> {
        let selected = scenes.select(bands)?;
        match Compositor::median(&selected) {
            Ok(composite) => {
                if composite.shape() != grid.shape() {
                    return Err(LandcoverError::ShapeMismatch {
                        expected: grid.shape(),
                        found: composite.shape(),
                    });
                }
                Ok(Some(composite))
            }
            Err(LandcoverError::EmptyCollection(reason)) => {
                log::warn!(
                    "{}: no usable {} scenes ({}); {} bands will be invalid",
                    season,
                    sensor,
                    reason,
                    sensor
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
