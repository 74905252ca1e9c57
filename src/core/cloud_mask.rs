use crate::raster::{RasterCollection, RasterTile};
use crate::types::{LandcoverError, LandcoverResult};
use serde::{Deserialize, Serialize};

/// Cloud masking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudMaskParams {
    /// Name of the co-registered cloud probability band (0-100)
    pub probability_band: String,
    /// Maximum accepted cloud probability, inclusive
    pub threshold: u8,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            probability_band: "probability".to_string(),
            threshold: 20,
        }
    }
}

/// Masks optical pixels whose cloud probability exceeds a threshold
pub struct CloudMasker {
    params: CloudMaskParams,
}

impl CloudMasker {
    pub fn new() -> Self {
        Self {
            params: CloudMaskParams::default(),
        }
    }

    pub fn with_params(params: CloudMaskParams) -> Self {
        Self { params }
    }

    /// Intersect every band's validity with `probability <= threshold`.
    ///
    /// Pixels without a valid probability value are masked.
    pub fn mask_scene(&self, scene: &RasterTile) -> LandcoverResult<RasterTile> {
        if self.params.threshold > 100 {
            return Err(LandcoverError::InvalidParameter(format!(
                "cloud probability threshold {} outside [0, 100]",
                self.params.threshold
            )));
        }

        let probability = scene.band(&self.params.probability_band)?;
        let threshold = f32::from(self.params.threshold);

        let mut clear = probability.valid.clone();
        ndarray::Zip::from(&mut clear)
            .and(&probability.values)
            .for_each(|c, &p| *c = *c && p <= threshold);

        scene.update_mask(&clear)
    }

    pub fn mask_collection(&self, scenes: &RasterCollection) -> LandcoverResult<RasterCollection> {
        log::debug!(
            "Masking {} scenes at cloud probability <= {}",
            scenes.len(),
            self.params.threshold
        );
        scenes.try_map(|scene| self.mask_scene(scene))
    }
}

impl Default for CloudMasker {
    fn default() -> Self {
        Self::new()
    }
}
