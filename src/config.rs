//! Pipeline configuration
//!
//! `PipelineConfig::default()` reproduces the reference run: four 2024
//! seasons, the eight-band optical stack with four indices, VV/VH radar,
//! three elevation thresholds, a 70/30 split, and the 13-class legend.
//! Any subset of fields can be overridden from JSON.

use crate::core::cloud_mask::CloudMaskParams;
use crate::core::sampling::SamplingParams;
use crate::core::seasonal::SeasonalFeatureParams;
use crate::core::spatial_clean::SpatialCleanParams;
use crate::core::svm::SvmParams;
use crate::core::terrain::TerrainParams;
use crate::raster::first_duplicate;
use crate::types::{ClassCode, LandcoverError, LandcoverResult, Season};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One class of the output legend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub code: ClassCode,
    pub name: String,
    /// `rrggbb` hex colour
    pub color: String,
}

impl LegendEntry {
    pub fn new(code: ClassCode, name: &str, color: &str) -> Self {
        Self {
            code,
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

/// Rendering parameters handed to the map viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationParams {
    pub min: ClassCode,
    pub max: ClassCode,
    pub palette: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub seasons: Vec<Season>,
    pub seasonal: SeasonalFeatureParams,
    pub terrain: TerrainParams,
    /// Label property holding the class code
    pub class_property: String,
    pub sampling: SamplingParams,
    pub svm: SvmParams,
    pub cleanup: SpatialCleanParams,
    pub legend: Vec<LegendEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: default_seasons(),
            seasonal: SeasonalFeatureParams::default(),
            terrain: TerrainParams::default(),
            class_property: "landcover".to_string(),
            sampling: SamplingParams::default(),
            svm: SvmParams::default(),
            cleanup: SpatialCleanParams::default(),
            legend: default_legend(),
        }
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn default_seasons() -> Vec<Season> {
    vec![
        Season::new("winter", date(2024, 2, 1), date(2024, 3, 31)),
        Season::new("spring", date(2024, 4, 1), date(2024, 5, 31)),
        Season::new("summer", date(2024, 7, 1), date(2024, 8, 31)),
        Season::new("autumn", date(2024, 10, 1), date(2024, 11, 30)),
    ]
}

fn default_legend() -> Vec<LegendEntry> {
    vec![
        LegendEntry::new(0, "Temperate Steppe", "b3ca1f"),
        LegendEntry::new(1, "Alpine Steppe", "52f132"),
        LegendEntry::new(2, "Alpine Meadow", "015c14"),
        LegendEntry::new(3, "Alpine Shrubland", "20a315"),
        LegendEntry::new(4, "Lake", "193bd6"),
        LegendEntry::new(5, "River", "16b7ff"),
        LegendEntry::new(6, "Alpine Desert", "ffdfca"),
        LegendEntry::new(7, "Sand Dunes", "fff518"),
        LegendEntry::new(8, "River Beach", "2bffe9"),
        LegendEntry::new(9, "Alpine Wetland", "821299"),
        LegendEntry::new(10, "Arable Land", "ffc82d"),
        LegendEntry::new(11, "Urban Land", "ff0000"),
        LegendEntry::new(12, "Snow and Ice", "fcfff3"),
    ]
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> LandcoverResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LandcoverResult<Self> {
        log::info!("Loading pipeline configuration from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> LandcoverResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Feature-stack band names in stack order
    pub fn feature_names(&self) -> Vec<String> {
        self.seasons
            .iter()
            .flat_map(|season| self.seasonal.band_names(season))
            .chain(self.terrain.band_names())
            .collect()
    }

    /// Legend codes, ascending
    pub fn class_codes(&self) -> Vec<ClassCode> {
        let mut codes: Vec<ClassCode> = self.legend.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        codes
    }

    pub fn visualization(&self) -> VisualizationParams {
        let mut legend = self.legend.clone();
        legend.sort_by_key(|e| e.code);
        VisualizationParams {
            min: legend.first().map(|e| e.code).unwrap_or(0),
            max: legend.last().map(|e| e.code).unwrap_or(0),
            palette: legend.into_iter().map(|e| e.color).collect(),
        }
    }

    /// Check every parameter before any data is touched
    pub fn validate(&self) -> LandcoverResult<()> {
        if self.seasons.is_empty() {
            return Err(invalid("at least one season is required"));
        }
        for season in &self.seasons {
            if season.name.is_empty() {
                return Err(invalid("season names must not be empty"));
            }
            if season.start >= season.end {
                return Err(invalid(format!(
                    "season '{}' starts on {} but ends on {}",
                    season.name, season.start, season.end
                )));
            }
        }
        let season_names: Vec<String> = self.seasons.iter().map(|s| s.name.clone()).collect();
        if let Some(duplicate) = first_duplicate(&season_names) {
            return Err(invalid(format!("season '{}' is defined twice", duplicate)));
        }

        self.seasonal.validate()?;
        validate_cloud_mask(&self.seasonal.optical.cloud_mask)?;
        if !(self.seasonal.optical.reflectance_scale > 0.0) {
            return Err(invalid("reflectance scale must be positive"));
        }
        if self.seasonal.gap_fill.radius == 0 {
            return Err(invalid("gap-fill radius must be at least 1"));
        }

        if let Some(duplicate) = first_duplicate(&self.feature_names()) {
            return Err(LandcoverError::DuplicateBand(duplicate));
        }

        if self.class_property.is_empty() {
            return Err(invalid("class property must not be empty"));
        }
        if !(self.sampling.scale > 0.0) {
            return Err(invalid("sampling scale must be positive"));
        }
        if !(0.0..=1.0).contains(&self.sampling.split.fraction) {
            return Err(invalid(format!(
                "split fraction must be in [0, 1], got {}",
                self.sampling.split.fraction
            )));
        }

        self.svm.validate()?;

        if self.cleanup.min_patch_size == 0 {
            return Err(invalid("minimum patch size must be at least 1"));
        }

        if self.legend.len() < 2 {
            return Err(invalid("the legend needs at least two classes"));
        }
        let mut codes = self.class_codes();
        codes.dedup();
        if codes.len() != self.legend.len() {
            return Err(invalid("legend class codes must be unique"));
        }
        for entry in &self.legend {
            if entry.color.len() != 6 || !entry.color.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid(format!(
                    "legend colour '{}' for class {} is not rrggbb hex",
                    entry.color, entry.code
                )));
            }
        }

        log::debug!(
            "Configuration valid: {} seasons, {} features, {} classes",
            self.seasons.len(),
            self.feature_names().len(),
            self.legend.len()
        );
        Ok(())
    }
}

fn validate_cloud_mask(params: &CloudMaskParams) -> LandcoverResult<()> {
    if params.threshold > 100 {
        return Err(invalid(format!(
            "cloud probability threshold must be in [0, 100], got {}",
            params.threshold
        )));
    }
    if params.probability_band.is_empty() {
        return Err(invalid("cloud probability band must be named"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> LandcoverError {
    LandcoverError::InvalidParameter(message.into())
}
