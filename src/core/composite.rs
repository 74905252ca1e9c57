use crate::raster::{Band, RasterCollection, RasterTile};
use crate::types::{LandcoverError, LandcoverResult};
use ndarray::Array2;
use num_traits::Float;
use std::cmp::Ordering;

/// Median of a set of samples; even counts average the two middle values.
///
/// Reorders `values` in place. Returns `None` for an empty slice.
pub fn median<T: Float>(values: &mut [T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / (T::one() + T::one()))
    } else {
        Some(values[mid])
    }
}

/// Per-pixel temporal reducer over a stack of co-registered scenes
pub struct Compositor;

impl Compositor {
    /// Reduce a collection to one tile holding, for every band and pixel,
    /// the median of the valid observations. Pixels without any valid
    /// observation stay invalid.
    ///
    /// The band schema is taken from the first tile; every other tile must
    /// carry those bands on the same grid.
    pub fn median(collection: &RasterCollection) -> LandcoverResult<RasterTile> {
        let first = collection
            .tiles()
            .first()
            .ok_or_else(|| LandcoverError::EmptyCollection("no scenes to composite".to_string()))?;

        log::info!(
            "Compositing {} scenes ({} bands) by per-pixel median",
            collection.len(),
            first.band_count()
        );

        for tile in collection.iter() {
            if tile.shape() != first.shape() {
                return Err(LandcoverError::ShapeMismatch {
                    expected: first.shape(),
                    found: tile.shape(),
                });
            }
        }

        let mut composite = RasterTile::new(&first.grid());
        for name in first.band_names() {
            let layers = collection
                .iter()
                .map(|tile| tile.band(&name))
                .collect::<LandcoverResult<Vec<_>>>()?;
            let band = Self::median_band(&name, &layers, first.shape())?;
            log::debug!(
                "Band {}: {} of {} pixels composited",
                name,
                band.valid_count(),
                first.shape().0 * first.shape().1
            );
            composite.add_band(band)?;
        }

        Ok(composite)
    }

    fn pixel_median(layers: &[&Band], row: usize, col: usize) -> Option<f32> {
        let mut samples: Vec<f32> = layers.iter().filter_map(|b| b.get(row, col)).collect();
        median(&mut samples)
    }

    #[cfg(feature = "parallel")]
    fn median_band(name: &str, layers: &[&Band], shape: (usize, usize)) -> LandcoverResult<Band> {
        use rayon::prelude::*;

        let (rows, cols) = shape;
        let reduced: Vec<Option<f32>> = (0..rows * cols)
            .into_par_iter()
            .map(|idx| Self::pixel_median(layers, idx / cols, idx % cols))
            .collect();

        Self::assemble_band(name, shape, reduced)
    }

    #[cfg(not(feature = "parallel"))]
    fn median_band(name: &str, layers: &[&Band], shape: (usize, usize)) -> LandcoverResult<Band> {
        let (rows, cols) = shape;
        let reduced: Vec<Option<f32>> = (0..rows * cols)
            .map(|idx| Self::pixel_median(layers, idx / cols, idx % cols))
            .collect();

        Self::assemble_band(name, shape, reduced)
    }

    fn assemble_band(name: &str, shape: (usize, usize), reduced: Vec<Option<f32>>) -> LandcoverResult<Band> {
        let valid: Vec<bool> = reduced.iter().map(Option::is_some).collect();
        let values: Vec<f32> = reduced.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect();

        let values = Array2::from_shape_vec(shape, values)
            .map_err(|e| LandcoverError::Processing(format!("Shape error: {}", e)))?;
        let valid = Array2::from_shape_vec(shape, valid)
            .map_err(|e| LandcoverError::Processing(format!("Shape error: {}", e)))?;

        Band::with_mask(name, values, valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::grid;

    fn scene(values: Vec<f32>) -> RasterTile {
        let band = Band::new("B8", Array2::from_shape_vec((2, 2), values).unwrap());
        RasterTile::from_bands(&grid(2, 2), vec![band]).unwrap()
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [3.0f32, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0f64, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median::<f32>(&mut []), None);
    }

    #[test]
    fn test_single_scene_is_unchanged() {
        let only = scene(vec![0.1, f32::NAN, 0.3, 0.4]);
        let composite = Compositor::median(&RasterCollection::new(vec![only.clone()])).unwrap();

        let band = composite.band("B8").unwrap();
        let original = only.band("B8").unwrap();
        assert_eq!(band.valid, original.valid);
        for (i, j) in [(0, 0), (1, 0), (1, 1)] {
            assert_eq!(band.get(i, j), original.get(i, j));
        }
    }

    #[test]
    fn test_median_skips_masked_observations() {
        let collection = RasterCollection::new(vec![
            scene(vec![0.1, f32::NAN, 0.5, f32::NAN]),
            scene(vec![0.3, 0.2, f32::NAN, f32::NAN]),
            scene(vec![0.2, 0.4, 0.7, f32::NAN]),
        ]);
        let composite = Compositor::median(&collection).unwrap();
        let band = composite.band("B8").unwrap();

        assert_eq!(band.get(0, 0), Some(0.2));
        assert!((band.get(0, 1).unwrap() - 0.3).abs() < 1e-6);
        assert!((band.get(1, 0).unwrap() - 0.6).abs() < 1e-6);
        // No valid contributors
        assert_eq!(band.get(1, 1), None);
    }

    #[test]
    fn test_empty_collection() {
        let result = Compositor::median(&RasterCollection::default());
        assert!(matches!(result, Err(LandcoverError::EmptyCollection(_))));
    }

    #[test]
    fn test_schema_mismatch() {
        let other = RasterTile::from_bands(
            &grid(2, 2),
            vec![Band::new("B4", Array2::zeros((2, 2)))],
        )
        .unwrap();
        let collection = RasterCollection::new(vec![scene(vec![0.0; 4]), other]);
        assert!(matches!(
            Compositor::median(&collection),
            Err(LandcoverError::InvalidBandReference { .. })
        ));
    }
}
