//! Multi-band raster tiles with per-band validity masks, and ordered
//! collections of them.
//!
//! Tiles are treated as values: every operation returns a new tile and
//! leaves its inputs untouched.

use crate::types::{
    BoundingBox, ClassCode, CoordinateSystem, DateRange, GeoTransform, LandcoverError,
    LandcoverResult, SceneMetadata, TargetGrid,
};
use ndarray::{Array2, Zip};
use std::collections::{BTreeMap, HashSet};

/// One named channel of a tile
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub values: Array2<f32>,
    pub valid: Array2<bool>,
}

impl Band {
    /// Band whose validity is derived from the values (finite = valid)
    pub fn new(name: impl Into<String>, values: Array2<f32>) -> Self {
        let valid = values.mapv(f32::is_finite);
        Self {
            name: name.into(),
            values,
            valid,
        }
    }

    pub fn with_mask(
        name: impl Into<String>,
        values: Array2<f32>,
        valid: Array2<bool>,
    ) -> LandcoverResult<Self> {
        if values.dim() != valid.dim() {
            return Err(LandcoverError::ShapeMismatch {
                expected: values.dim(),
                found: valid.dim(),
            });
        }
        Ok(Self {
            name: name.into(),
            values,
            valid,
        })
    }

    /// Fully masked band
    pub fn invalid(name: impl Into<String>, shape: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            values: Array2::from_elem(shape, f32::NAN),
            valid: Array2::from_elem(shape, false),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if self.valid[[row, col]] {
            Some(self.values[[row, col]])
        } else {
            None
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    pub fn renamed(&self, name: impl Into<String>) -> Band {
        Band {
            name: name.into(),
            values: self.values.clone(),
            valid: self.valid.clone(),
        }
    }
}

/// Multi-band 2-D grid on a single geotransform
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    shape: (usize, usize),
    pub geo_transform: GeoTransform,
    pub crs: CoordinateSystem,
    pub metadata: SceneMetadata,
    bands: Vec<Band>,
}

impl RasterTile {
    /// Tile without bands on the given grid
    pub fn new(grid: &TargetGrid) -> Self {
        Self {
            shape: grid.shape(),
            geo_transform: grid.geo_transform,
            crs: grid.crs.clone(),
            metadata: SceneMetadata::default(),
            bands: Vec::new(),
        }
    }

    pub fn from_bands(grid: &TargetGrid, bands: Vec<Band>) -> LandcoverResult<Self> {
        let mut tile = Self::new(grid);
        for band in bands {
            tile.add_band(band)?;
        }
        Ok(tile)
    }

    /// Tile whose bands are all fully masked
    pub fn invalid<S: AsRef<str>>(grid: &TargetGrid, names: &[S]) -> LandcoverResult<Self> {
        let bands = names
            .iter()
            .map(|name| Band::invalid(name.as_ref(), grid.shape()))
            .collect();
        Self::from_bands(grid, bands)
    }

    pub fn with_metadata(mut self, metadata: SceneMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn grid(&self) -> TargetGrid {
        TargetGrid {
            rows: self.shape.0,
            cols: self.shape.1,
            geo_transform: self.geo_transform,
            crs: self.crs.clone(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn bounds(&self) -> BoundingBox {
        self.geo_transform.bounds(self.shape)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|b| b.name == name)
    }

    pub fn band(&self, name: &str) -> LandcoverResult<&Band> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| LandcoverError::InvalidBandReference {
                band: name.to_string(),
                available: self.band_names(),
            })
    }

    /// Append a band; names must stay unique and shapes must agree
    pub fn add_band(&mut self, band: Band) -> LandcoverResult<()> {
        if band.shape() != self.shape {
            return Err(LandcoverError::ShapeMismatch {
                expected: self.shape,
                found: band.shape(),
            });
        }
        if self.has_band(&band.name) {
            return Err(LandcoverError::DuplicateBand(band.name));
        }
        self.bands.push(band);
        Ok(())
    }

    /// Band concatenation; keeps this tile's metadata
    pub fn add_bands(&self, other: &RasterTile) -> LandcoverResult<RasterTile> {
        if other.shape != self.shape {
            return Err(LandcoverError::ShapeMismatch {
                expected: self.shape,
                found: other.shape,
            });
        }
        let mut combined = self.clone();
        for band in &other.bands {
            combined.add_band(band.clone())?;
        }
        Ok(combined)
    }

    /// New tile with the named bands, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> LandcoverResult<RasterTile> {
        let mut selected = self.without_bands();
        for name in names {
            selected.add_band(self.band(name.as_ref())?.clone())?;
        }
        Ok(selected)
    }

    /// Positional rename of every band
    pub fn rename<S: AsRef<str>>(&self, names: &[S]) -> LandcoverResult<RasterTile> {
        if names.len() != self.bands.len() {
            return Err(LandcoverError::InvalidParameter(format!(
                "cannot rename {} bands with {} names",
                self.bands.len(),
                names.len()
            )));
        }
        let mut renamed = self.without_bands();
        for (band, name) in self.bands.iter().zip(names) {
            renamed.add_band(band.renamed(name.as_ref()))?;
        }
        Ok(renamed)
    }

    /// Multiply the named bands by a constant; other bands pass through
    pub fn scale_bands<S: AsRef<str>>(&self, names: &[S], factor: f32) -> LandcoverResult<RasterTile> {
        for name in names {
            self.band(name.as_ref())?;
        }
        let mut scaled = self.clone();
        for band in &mut scaled.bands {
            if names.iter().any(|n| n.as_ref() == band.name) {
                band.values.mapv_inplace(|v| v * factor);
            }
        }
        Ok(scaled)
    }

    /// Intersect every band's validity with `mask`
    pub fn update_mask(&self, mask: &Array2<bool>) -> LandcoverResult<RasterTile> {
        if mask.dim() != self.shape {
            return Err(LandcoverError::ShapeMismatch {
                expected: self.shape,
                found: mask.dim(),
            });
        }
        let mut masked = self.clone();
        for band in &mut masked.bands {
            Zip::from(&mut band.valid).and(mask).for_each(|v, &m| *v = *v && m);
        }
        Ok(masked)
    }

    /// All band values at a pixel, or `None` when any band is invalid there
    pub fn pixel_values(&self, row: usize, col: usize) -> Option<Vec<f32>> {
        self.bands.iter().map(|b| b.get(row, col)).collect()
    }

    fn without_bands(&self) -> RasterTile {
        RasterTile {
            shape: self.shape,
            geo_transform: self.geo_transform,
            crs: self.crs.clone(),
            metadata: self.metadata.clone(),
            bands: Vec::new(),
        }
    }
}

/// Ordered set of tiles sharing a band schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterCollection {
    tiles: Vec<RasterTile>,
}

impl RasterCollection {
    pub fn new(tiles: Vec<RasterTile>) -> Self {
        Self { tiles }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[RasterTile] {
        &self.tiles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RasterTile> {
        self.tiles.iter()
    }

    pub fn push(&mut self, tile: RasterTile) {
        self.tiles.push(tile);
    }

    /// Tiles whose acquisition timestamp lies in `range`; undated tiles are dropped
    pub fn filter_date(&self, range: &DateRange) -> RasterCollection {
        self.filter(|tile| {
            tile.metadata
                .acquired
                .map(|t| range.contains(&t))
                .unwrap_or(false)
        })
    }

    pub fn filter_bounds(&self, bounds: &BoundingBox) -> RasterCollection {
        self.filter(|tile| tile.bounds().intersects(bounds))
    }

    pub fn filter<F>(&self, predicate: F) -> RasterCollection
    where
        F: Fn(&RasterTile) -> bool,
    {
        RasterCollection {
            tiles: self.tiles.iter().filter(|t| predicate(t)).cloned().collect(),
        }
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> LandcoverResult<RasterCollection> {
        let tiles = self
            .tiles
            .iter()
            .map(|t| t.select(names))
            .collect::<LandcoverResult<Vec<_>>>()?;
        Ok(RasterCollection { tiles })
    }

    /// Apply a fallible per-tile transformation
    pub fn try_map<F>(&self, f: F) -> LandcoverResult<RasterCollection>
    where
        F: Fn(&RasterTile) -> LandcoverResult<RasterTile>,
    {
        let tiles = self.tiles.iter().map(f).collect::<LandcoverResult<Vec<_>>>()?;
        Ok(RasterCollection { tiles })
    }

    /// Band names of the first tile
    pub fn band_names(&self) -> Vec<String> {
        self.tiles.first().map(|t| t.band_names()).unwrap_or_default()
    }
}

impl FromIterator<RasterTile> for RasterCollection {
    fn from_iter<I: IntoIterator<Item = RasterTile>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RasterCollection {
    type Item = RasterTile;
    type IntoIter = std::vec::IntoIter<RasterTile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.into_iter()
    }
}

/// Single-band class-code raster
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRaster {
    pub classes: Array2<ClassCode>,
    pub valid: Array2<bool>,
    pub geo_transform: GeoTransform,
    pub crs: CoordinateSystem,
}

impl ClassifiedRaster {
    pub fn new(
        classes: Array2<ClassCode>,
        valid: Array2<bool>,
        geo_transform: GeoTransform,
        crs: CoordinateSystem,
    ) -> LandcoverResult<Self> {
        if classes.dim() != valid.dim() {
            return Err(LandcoverError::ShapeMismatch {
                expected: classes.dim(),
                found: valid.dim(),
            });
        }
        Ok(Self {
            classes,
            valid,
            geo_transform,
            crs,
        })
    }

    /// Fully valid raster from plain class codes
    pub fn from_classes(classes: Array2<ClassCode>, geo_transform: GeoTransform, crs: CoordinateSystem) -> Self {
        let valid = Array2::from_elem(classes.dim(), true);
        Self {
            classes,
            valid,
            geo_transform,
            crs,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.classes.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<ClassCode> {
        if self.valid[[row, col]] {
            Some(self.classes[[row, col]])
        } else {
            None
        }
    }

    /// Pixel count per class over valid pixels
    pub fn class_counts(&self) -> BTreeMap<ClassCode, usize> {
        let mut counts = BTreeMap::new();
        Zip::from(&self.classes).and(&self.valid).for_each(|&c, &v| {
            if v {
                *counts.entry(c).or_insert(0) += 1;
            }
        });
        counts
    }
}

/// First repeated name, if any
pub(crate) fn first_duplicate<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    names.into_iter().find(|n| !seen.insert(n.as_str())).cloned()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn grid(rows: usize, cols: usize) -> TargetGrid {
        TargetGrid {
            rows,
            cols,
            geo_transform: GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0),
            crs: CoordinateSystem::Projected { epsg: 32646 },
        }
    }

    /// Tile with one fully valid band per `(name, value)` pair
    pub fn constant_tile(rows: usize, cols: usize, bands: &[(&str, f32)]) -> RasterTile {
        let bands = bands
            .iter()
            .map(|(name, value)| Band::new(*name, Array2::from_elem((rows, cols), *value)))
            .collect();
        RasterTile::from_bands(&grid(rows, cols), bands).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::types::SceneId;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_add_band_rejects_duplicates() {
        let mut tile = constant_tile(2, 2, &[("B2", 1.0)]);
        let result = tile.add_band(Band::new("B2", Array2::zeros((2, 2))));
        assert!(matches!(result, Err(LandcoverError::DuplicateBand(name)) if name == "B2"));
    }

    #[test]
    fn test_add_band_rejects_wrong_shape() {
        let mut tile = constant_tile(2, 2, &[("B2", 1.0)]);
        let result = tile.add_band(Band::new("B3", Array2::zeros((3, 2))));
        assert!(matches!(result, Err(LandcoverError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_select_missing_band_is_invalid_reference() {
        let tile = constant_tile(2, 2, &[("B2", 1.0), ("B3", 2.0)]);
        let result = tile.select(&["B3", "B8"]);
        assert!(matches!(
            result,
            Err(LandcoverError::InvalidBandReference { band, .. }) if band == "B8"
        ));

        let selected = tile.select(&["B3", "B2"]).unwrap();
        assert_eq!(selected.band_names(), vec!["B3", "B2"]);
    }

    #[test]
    fn test_rename_is_positional() {
        let tile = constant_tile(1, 1, &[("VV", -12.0), ("VH", -18.0)]);
        let renamed = tile.rename(&["VV_spring", "VH_spring"]).unwrap();
        assert_eq!(renamed.band("VH_spring").unwrap().get(0, 0), Some(-18.0));
        assert!(tile.rename(&["only_one"]).is_err());
    }

    #[test]
    fn test_update_mask_intersects_validity() {
        let tile = constant_tile(1, 2, &[("B2", 1.0)]);
        let mask = Array2::from_shape_vec((1, 2), vec![true, false]).unwrap();
        let masked = tile.update_mask(&mask).unwrap();
        let band = masked.band("B2").unwrap();
        assert_eq!(band.get(0, 0), Some(1.0));
        assert_eq!(band.get(0, 1), None);
        // Original untouched
        assert_eq!(tile.band("B2").unwrap().valid_count(), 2);
    }

    #[test]
    fn test_nan_values_are_invalid() {
        let band = Band::new("B4", Array2::from_shape_vec((1, 2), vec![f32::NAN, 0.2]).unwrap());
        assert_eq!(band.get(0, 0), None);
        assert_eq!(band.get(0, 1), Some(0.2));
    }

    #[test]
    fn test_collection_date_filter() {
        let dated = |day: u32| {
            constant_tile(1, 1, &[("B2", 1.0)]).with_metadata(SceneMetadata {
                scene_id: Some(SceneId::new(format!("s{}", day))),
                acquired: Some(Utc.with_ymd_and_hms(2024, 7, day, 4, 0, 0).unwrap()),
                radar: None,
            })
        };
        let undated = constant_tile(1, 1, &[("B2", 1.0)]);
        let collection = RasterCollection::new(vec![dated(1), dated(15), dated(30), undated]);

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(),
        );
        let filtered = collection.filter_date(&range);
        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered.tiles()[0].metadata.scene_id,
            Some(SceneId::new("s15"))
        );
    }

    #[test]
    fn test_first_duplicate() {
        let names = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(first_duplicate(&names), Some("a".to_string()));
        assert_eq!(first_duplicate(&names[..2]), None);
    }
}
