use crate::io::archive::InMemoryArchive;
use crate::raster::{Band, RasterCollection};
use crate::types::{BoundingBox, GeoTransform, LandcoverError, LandcoverResult, TargetGrid};
use ndarray::Array2;

/// Source of digital elevation model tiles
pub trait ElevationSource: Send + Sync {
    /// Elevation tiles intersecting `bounds`, in their native grids
    fn query_elevation(&self, bounds: &BoundingBox) -> LandcoverResult<RasterCollection>;
}

impl ElevationSource for InMemoryArchive {
    fn query_elevation(&self, bounds: &BoundingBox) -> LandcoverResult<RasterCollection> {
        let tiles = RasterCollection::new(self.elevation_tiles().to_vec()).filter_bounds(bounds);
        log::debug!("Elevation query returned {} tiles", tiles.len());
        Ok(tiles)
    }
}

/// Digital Elevation Model mosaicking and resampling
pub struct DemReader;

impl DemReader {
    /// Mosaic the `band` of every tile onto the target grid.
    ///
    /// Each tile is bilinearly resampled first; where tiles overlap, later
    /// tiles take precedence over earlier ones wherever they are valid.
    pub fn create_dem_mosaic(
        tiles: &RasterCollection,
        band: &str,
        target: &TargetGrid,
    ) -> LandcoverResult<Band> {
        log::info!("Creating DEM mosaic from {} tiles", tiles.len());

        let mut mosaic = Band::invalid(band, target.shape());
        for tile in tiles.iter() {
            if tile.crs != target.crs {
                return Err(LandcoverError::CrsMismatch {
                    expected: target.crs.clone(),
                    found: tile.crs.clone(),
                });
            }
            let resampled = Self::resample_dem(tile.band(band)?, &tile.geo_transform, target);
            ndarray::Zip::from(&mut mosaic.values)
                .and(&mut mosaic.valid)
                .and(&resampled.values)
                .and(&resampled.valid)
                .for_each(|value, ok, &new_value, &new_ok| {
                    if new_ok {
                        *value = new_value;
                        *ok = true;
                    }
                });
        }

        log::debug!(
            "DEM mosaic covers {} of {} target pixels",
            mosaic.valid_count(),
            target.rows * target.cols
        );
        Ok(mosaic)
    }

    /// Resample DEM to target grid using bilinear interpolation.
    ///
    /// Samples are taken at target pixel centres. Invalid source pixels are
    /// left out of the interpolation and the remaining weights renormalised;
    /// target pixels outside the source extent are invalid.
    pub fn resample_dem(dem: &Band, source_transform: &GeoTransform, target: &TargetGrid) -> Band {
        log::debug!("Resampling DEM to target grid {:?}", target.shape());

        let (source_height, source_width) = dem.shape();
        let mut values = Array2::from_elem(target.shape(), f32::NAN);
        let mut valid = Array2::from_elem(target.shape(), false);

        for i in 0..target.rows {
            for j in 0..target.cols {
                let (x, y) = target.geo_transform.pixel_center(i, j);
                let (row, col) = source_transform.world_to_pixel(x, y);
                if row < 0.0 || col < 0.0 || row > source_height as f64 || col > source_width as f64 {
                    continue;
                }

                // Centre-based fractional coordinates
                let source_row = (row - 0.5).max(0.0);
                let source_col = (col - 0.5).max(0.0);

                let y1 = (source_row.floor() as usize).min(source_height - 1);
                let x1 = (source_col.floor() as usize).min(source_width - 1);
                let y2 = (y1 + 1).min(source_height - 1);
                let x2 = (x1 + 1).min(source_width - 1);

                let dy = (source_row - y1 as f64).clamp(0.0, 1.0);
                let dx = (source_col - x1 as f64).clamp(0.0, 1.0);

                let corners = [
                    (y1, x1, (1.0 - dx) * (1.0 - dy)),
                    (y1, x2, dx * (1.0 - dy)),
                    (y2, x1, (1.0 - dx) * dy),
                    (y2, x2, dx * dy),
                ];

                let mut weighted = 0.0;
                let mut weight_sum = 0.0;
                for (r, c, w) in corners {
                    if w > 0.0 && dem.valid[[r, c]] {
                        weighted += f64::from(dem.values[[r, c]]) * w;
                        weight_sum += w;
                    }
                }

                if weight_sum > 0.0 {
                    values[[i, j]] = (weighted / weight_sum) as f32;
                    valid[[i, j]] = true;
                }
            }
        }

        Band {
            name: dem.name.clone(),
            values,
            valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterTile;
    use crate::types::CoordinateSystem;

    fn dem_tile(top_left_x: f64, pixel_size: f64, values: Array2<f32>) -> RasterTile {
        let grid = TargetGrid {
            rows: values.nrows(),
            cols: values.ncols(),
            geo_transform: GeoTransform::north_up(top_left_x, 100.0, pixel_size),
            crs: CoordinateSystem::Geographic,
        };
        RasterTile::from_bands(&grid, vec![Band::new("DEM", values)]).unwrap()
    }

    fn target(cols: usize, rows: usize, pixel_size: f64) -> TargetGrid {
        TargetGrid {
            rows,
            cols,
            geo_transform: GeoTransform::north_up(0.0, 100.0, pixel_size),
            crs: CoordinateSystem::Geographic,
        }
    }

    #[test]
    fn test_resample_constant_dem() {
        let tile = dem_tile(0.0, 30.0, Array2::from_elem((3, 3), 3650.0));
        let resampled = DemReader::resample_dem(tile.band("DEM").unwrap(), &tile.geo_transform, &target(9, 9, 10.0));

        assert_eq!(resampled.valid_count(), 81);
        assert!(resampled.values.iter().all(|v| (*v - 3650.0).abs() < 1e-3));
    }

    #[test]
    fn test_resample_interpolates_between_centres() {
        // Two source pixels, centres at x = 5 and x = 15
        let tile = dem_tile(0.0, 10.0, Array2::from_shape_vec((1, 2), vec![3000.0, 4000.0]).unwrap());
        let grid = TargetGrid {
            rows: 1,
            cols: 4,
            geo_transform: GeoTransform::north_up(0.0, 100.0, 5.0),
            crs: CoordinateSystem::Geographic,
        };
        let resampled = DemReader::resample_dem(tile.band("DEM").unwrap(), &tile.geo_transform, &grid);

        // Target centres at 2.5, 7.5, 12.5, 17.5
        assert!((resampled.values[[0, 0]] - 3000.0).abs() < 1e-3);
        assert!((resampled.values[[0, 1]] - 3250.0).abs() < 1e-3);
        assert!((resampled.values[[0, 2]] - 3750.0).abs() < 1e-3);
        assert!((resampled.values[[0, 3]] - 4000.0).abs() < 1e-3);
    }

    #[test]
    fn test_mosaic_later_tiles_win() {
        let west = dem_tile(0.0, 10.0, Array2::from_elem((2, 2), 3000.0));
        let overlapping = dem_tile(10.0, 10.0, Array2::from_elem((2, 2), 4000.0));
        let tiles = RasterCollection::new(vec![west, overlapping]);

        let mosaic = DemReader::create_dem_mosaic(&tiles, "DEM", &target(4, 2, 10.0)).unwrap();
        assert_eq!(mosaic.get(0, 0), Some(3000.0));
        assert_eq!(mosaic.get(0, 1), Some(4000.0));
        assert_eq!(mosaic.get(0, 2), Some(4000.0));
        // Beyond both tiles
        assert_eq!(mosaic.get(0, 3), None);
    }

    #[test]
    fn test_mosaic_rejects_other_crs() {
        let mut tile = dem_tile(0.0, 10.0, Array2::from_elem((2, 2), 3000.0));
        tile.crs = CoordinateSystem::Projected { epsg: 32646 };
        let result = DemReader::create_dem_mosaic(&RasterCollection::new(vec![tile]), "DEM", &target(2, 2, 10.0));
        assert!(matches!(result, Err(LandcoverError::CrsMismatch { .. })));
    }
}
