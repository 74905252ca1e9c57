//! Normalized-difference spectral indices
//!
//! Every index is `(A - B) / (A + B)` over a fixed band pair. A pixel is
//! invalid in the output when either input is invalid or `A + B == 0`.

use crate::raster::{Band, RasterTile};
use crate::types::{LandcoverError, LandcoverResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// A named normalized-difference index over two bands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    /// Positive band (A)
    pub band_a: String,
    /// Negative band (B)
    pub band_b: String,
}

impl IndexDefinition {
    pub fn new(name: &str, band_a: &str, band_b: &str) -> Self {
        Self {
            name: name.to_string(),
            band_a: band_a.to_string(),
            band_b: band_b.to_string(),
        }
    }

    /// Vegetation, built-up, water and bare-soil indicators over Sentinel-2 bands
    pub fn standard_set() -> Vec<IndexDefinition> {
        vec![
            Self::new("NDVI", "B8", "B4"),
            Self::new("NDBI", "B11", "B8"),
            Self::new("MNDWI", "B3", "B11"),
            Self::new("BSI", "B11", "B4"),
        ]
    }
}

/// Compute `(a - b) / (a + b)` per pixel
pub fn normalized_difference(name: &str, band_a: &Band, band_b: &Band) -> LandcoverResult<Band> {
    let shape = band_a.shape();
    if band_b.shape() != shape {
        return Err(LandcoverError::ShapeMismatch {
            expected: shape,
            found: band_b.shape(),
        });
    }
    let mut values = ndarray::Array2::from_elem(shape, f32::NAN);
    let mut valid = ndarray::Array2::from_elem(shape, false);

    Zip::from(&mut values)
        .and(&mut valid)
        .and(&band_a.values)
        .and(&band_a.valid)
        .and(&band_b.values)
        .and(&band_b.valid)
        .for_each(|out, ok, &a, &va, &b, &vb| {
            if !(va && vb) {
                return;
            }
            let sum = a + b;
            if sum == 0.0 {
                return;
            }
            *out = (a - b) / sum;
            *ok = true;
        });

    Ok(Band {
        name: name.to_string(),
        values,
        valid,
    })
}

/// Derives index bands from a tile's named bands
pub struct IndexCalculator;

impl IndexCalculator {
    /// Compute one band per definition, named by `name_for(definition)`.
    ///
    /// `band_for` maps a definition's band name to the band name present in
    /// `tile` (used to look up season-suffixed bands).
    pub fn compute<F, G>(
        tile: &RasterTile,
        definitions: &[IndexDefinition],
        band_for: F,
        name_for: G,
    ) -> LandcoverResult<RasterTile>
    where
        F: Fn(&str) -> String,
        G: Fn(&IndexDefinition) -> String,
    {
        log::debug!("Computing {} normalized-difference indices", definitions.len());

        let mut indices = RasterTile::new(&tile.grid());
        for definition in definitions {
            let a = tile.band(&band_for(&definition.band_a))?;
            let b = tile.band(&band_for(&definition.band_b))?;
            indices.add_band(normalized_difference(&name_for(definition), a, b)?)?;
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::grid;
    use ndarray::Array2;

    fn band(name: &str, values: Vec<f32>) -> Band {
        Band::new(name, Array2::from_shape_vec((1, values.len()), values).unwrap())
    }

    #[test]
    fn test_zero_sum_is_invalid() {
        let a = band("B8", vec![0.0, 0.3, -0.2, 0.4]);
        let b = band("B4", vec![0.0, 0.1, 0.2, f32::NAN]);
        let nd = normalized_difference("NDVI", &a, &b).unwrap();

        assert_eq!(nd.get(0, 0), None);
        assert!((nd.get(0, 1).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(nd.get(0, 2), None);
        assert_eq!(nd.get(0, 3), None);
    }

    #[test]
    fn test_reflectance_indices_in_range() {
        let a = band("B8", vec![0.0, 0.01, 0.5, 1.0, 0.3]);
        let b = band("B4", vec![0.2, 0.0, 0.5, 0.001, 0.9]);
        let nd = normalized_difference("NDVI", &a, &b).unwrap();

        for j in 0..5 {
            let v = nd.get(0, j).unwrap();
            assert!((-1.0..=1.0).contains(&v), "value {} out of range", v);
        }
        assert_eq!(nd.get(0, 2), Some(0.0));
    }

    #[test]
    fn test_mismatched_band_shapes() {
        let a = band("B8", vec![0.3, 0.4, 0.5]);
        let b = band("B4", vec![0.1, 0.2]);
        assert!(matches!(
            normalized_difference("NDVI", &a, &b),
            Err(LandcoverError::ShapeMismatch {
                expected: (1, 3),
                found: (1, 2)
            })
        ));
    }

    #[test]
    fn test_standard_set_on_suffixed_bands() {
        let tile = RasterTile::from_bands(
            &grid(1, 1),
            vec![
                band("B3_summer", vec![0.08]),
                band("B4_summer", vec![0.05]),
                band("B8_summer", vec![0.35]),
                band("B11_summer", vec![0.2]),
            ],
        )
        .unwrap();

        let indices = IndexCalculator::compute(
            &tile,
            &IndexDefinition::standard_set(),
            |b| format!("{}_summer", b),
            |d| format!("{}_summer", d.name),
        )
        .unwrap();

        assert_eq!(
            indices.band_names(),
            vec!["NDVI_summer", "NDBI_summer", "MNDWI_summer", "BSI_summer"]
        );
        let ndvi = indices.band("NDVI_summer").unwrap().get(0, 0).unwrap();
        assert!((ndvi - 0.75).abs() < 1e-6);
        let mndwi = indices.band("MNDWI_summer").unwrap().get(0, 0).unwrap();
        assert!(mndwi < 0.0);
    }

    #[test]
    fn test_missing_band_reference() {
        let tile = RasterTile::from_bands(&grid(1, 1), vec![band("B8", vec![0.3])]).unwrap();
        let result = IndexCalculator::compute(
            &tile,
            &IndexDefinition::standard_set(),
            |b| b.to_string(),
            |d| d.name.clone(),
        );
        assert!(matches!(
            result,
            Err(LandcoverError::InvalidBandReference { band, .. }) if band == "B4"
        ));
    }
}
