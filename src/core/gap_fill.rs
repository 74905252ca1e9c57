use crate::raster::{Band, RasterTile};
use crate::types::{LandcoverError, LandcoverResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Gap filling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillParams {
    /// Square neighbourhood radius in pixels (window = 2 * radius + 1)
    pub radius: usize,
    /// Number of sequential fill passes
    pub iterations: usize,
}

impl Default for GapFillParams {
    fn default() -> Self {
        Self {
            radius: 2,
            iterations: 3,
        }
    }
}

/// Fills invalid composite pixels with the mean of nearby valid pixels
pub struct GapFiller {
    params: GapFillParams,
}

impl GapFiller {
    pub fn new() -> Self {
        Self {
            params: GapFillParams::default(),
        }
    }

    pub fn with_params(params: GapFillParams) -> Self {
        Self { params }
    }

    /// Fill every band of a tile. Valid pixels are never modified.
    pub fn fill(&self, tile: &RasterTile) -> LandcoverResult<RasterTile> {
        if self.params.radius == 0 {
            return Err(LandcoverError::InvalidParameter(
                "gap fill radius must be at least 1".to_string(),
            ));
        }

        log::info!(
            "Gap filling {} bands (radius {}, {} iterations)",
            tile.band_count(),
            self.params.radius,
            self.params.iterations
        );

        let mut filled = RasterTile::new(&tile.grid()).with_metadata(tile.metadata.clone());
        for band in tile.bands() {
            filled.add_band(self.fill_band(band))?;
        }
        Ok(filled)
    }

    /// Iterative neighbourhood-mean fill of one band.
    ///
    /// Each pass reads the output of the previous one, so gaps wider than a
    /// single window close from their edges inwards.
    pub fn fill_band(&self, band: &Band) -> Band {
        let (height, width) = band.shape();
        let mut values = band.values.clone();
        let mut valid = band.valid.clone();
        let radius = self.params.radius as isize;

        let mut void_count = valid.iter().filter(|v| !**v).count();
        let initial_voids = void_count;

        for iteration in 0..self.params.iterations {
            if void_count == 0 {
                break;
            }

            let mut next_values = values.clone();
            let mut next_valid = valid.clone();
            let mut filled_count = 0;

            for i in 0..height {
                for j in 0..width {
                    if valid[[i, j]] {
                        continue;
                    }
                    if let Some(mean) = Self::window_mean(&values, &valid, i, j, radius) {
                        next_values[[i, j]] = mean;
                        next_valid[[i, j]] = true;
                        filled_count += 1;
                    }
                }
            }

            values = next_values;
            valid = next_valid;
            void_count -= filled_count;

            log::debug!(
                "Band {} iteration {}: filled {} pixels, {} remain",
                band.name,
                iteration + 1,
                filled_count,
                void_count
            );

            if filled_count == 0 {
                break;
            }
        }

        if void_count > 0 {
            log::debug!(
                "Band {}: {} of {} gaps left unfilled",
                band.name,
                void_count,
                initial_voids
            );
        }

        Band {
            name: band.name.clone(),
            values,
            valid,
        }
    }

    fn window_mean(
        values: &Array2<f32>,
        valid: &Array2<bool>,
        center_i: usize,
        center_j: usize,
        radius: isize,
    ) -> Option<f32> {
        let (height, width) = values.dim();
        let mut sum = 0.0f64;
        let mut count = 0usize;

        for di in -radius..=radius {
            for dj in -radius..=radius {
                let ii = center_i as isize + di;
                let jj = center_j as isize + dj;
                if ii < 0 || jj < 0 || ii >= height as isize || jj >= width as isize {
                    continue;
                }
                let (ii, jj) = (ii as usize, jj as usize);
                if valid[[ii, jj]] {
                    sum += f64::from(values[[ii, jj]]);
                    count += 1;
                }
            }
        }

        if count > 0 {
            Some((sum / count as f64) as f32)
        } else {
            None
        }
    }
}

impl Default for GapFiller {
    fn default() -> Self {
        Self::new()
    }
}
