use crate::raster::{first_duplicate, RasterTile};
use crate::types::{LandcoverError, LandcoverResult};

/// The per-pixel feature tile the classifier consumes.
///
/// Built only through [`FeatureStack::assemble`], so band names are
/// globally unique and every band shares one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStack {
    tile: RasterTile,
}

impl FeatureStack {
    /// Concatenate the seasonal tiles, in order, followed by the terrain tile
    pub fn assemble(seasonal: &[RasterTile], terrain: &RasterTile) -> LandcoverResult<Self> {
        log::info!(
            "Assembling feature stack from {} seasonal tiles and {} terrain bands",
            seasonal.len(),
            terrain.band_count()
        );

        let names: Vec<String> = seasonal
            .iter()
            .chain(std::iter::once(terrain))
            .flat_map(|t| t.band_names())
            .collect();
        if let Some(duplicate) = first_duplicate(&names) {
            return Err(LandcoverError::DuplicateBand(duplicate));
        }

        let mut stack = match seasonal.first() {
            Some(first) => first.clone(),
            None => RasterTile::new(&terrain.grid()),
        };
        for tile in seasonal.iter().skip(1) {
            stack = stack.add_bands(tile)?;
        }
        stack = stack.add_bands(terrain)?;

        log::info!("Feature stack has {} bands", stack.band_count());
        Ok(Self { tile: stack })
    }

    pub fn tile(&self) -> &RasterTile {
        &self.tile
    }

    pub fn band_names(&self) -> Vec<String> {
        self.tile.band_names()
    }

    pub fn band_count(&self) -> usize {
        self.tile.band_count()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.tile.shape()
    }

    /// Feature vector at a pixel, `None` when any feature is invalid there
    pub fn features_at(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        self.tile
            .pixel_values(row, col)
            .map(|values| values.into_iter().map(f64::from).collect())
    }

    pub fn into_tile(self) -> RasterTile {
        self.tile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::constant_tile;

    #[test]
    fn test_band_count_is_sum_of_inputs() {
        let spring = constant_tile(2, 2, &[("B2_spring", 0.1), ("VV_spring", -12.0)]);
        let summer = constant_tile(2, 2, &[("B2_summer", 0.2), ("VV_summer", -11.0)]);
        let terrain = constant_tile(2, 2, &[("Elevation", 3600.0), ("constant", 1.0)]);

        let stack = FeatureStack::assemble(&[spring, summer], &terrain).unwrap();
        assert_eq!(stack.band_count(), 6);
        assert_eq!(
            stack.band_names(),
            vec!["B2_spring", "VV_spring", "B2_summer", "VV_summer", "Elevation", "constant"]
        );
        assert_eq!(
            stack.features_at(0, 0).unwrap(),
            vec![0.1f32 as f64, -12.0, 0.2f32 as f64, -11.0, 3600.0, 1.0]
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let spring = constant_tile(2, 2, &[("NDVI", 0.3)]);
        let summer = constant_tile(2, 2, &[("NDVI", 0.5)]);
        let terrain = constant_tile(2, 2, &[("Elevation", 3600.0)]);

        let result = FeatureStack::assemble(&[spring, summer], &terrain);
        assert!(matches!(result, Err(LandcoverError::DuplicateBand(name)) if name == "NDVI"));
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let spring = constant_tile(2, 2, &[("B2_spring", 0.1)]);
        let terrain = constant_tile(3, 3, &[("Elevation", 3600.0)]);

        let result = FeatureStack::assemble(&[spring], &terrain);
        assert!(matches!(result, Err(LandcoverError::ShapeMismatch { .. })));
    }
}
