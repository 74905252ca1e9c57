//! Post-classification cleanup of small patches

use crate::raster::ClassifiedRaster;
use crate::types::{ClassCode, LandcoverError, LandcoverResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel adjacency used for component labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Cleanup parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialCleanParams {
    /// Components with fewer pixels are replaced
    pub min_patch_size: usize,
    /// Half-width of the square mode window
    pub radius: usize,
    /// Upper bound on repeated passes
    pub max_passes: usize,
    pub connectivity: Connectivity,
}

impl Default for SpatialCleanParams {
    fn default() -> Self {
        Self {
            min_patch_size: 20,
            radius: 4,
            max_passes: 8,
            connectivity: Connectivity::Eight,
        }
    }
}

/// Connected components of identical valid class values
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentLabels {
    /// Component index per pixel, `None` for invalid pixels
    pub labels: Array2<Option<usize>>,
    /// Pixel count per component index
    pub sizes: Vec<usize>,
}

impl ComponentLabels {
    pub fn component_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn size_at(&self, row: usize, col: usize) -> Option<usize> {
        self.labels[[row, col]].map(|label| self.sizes[label])
    }
}

/// Label connected components with an explicit-stack flood fill
pub fn connected_components(raster: &ClassifiedRaster, connectivity: Connectivity) -> ComponentLabels {
    let (rows, cols) = raster.shape();
    let mut labels: Array2<Option<usize>> = Array2::from_elem((rows, cols), None);
    let mut sizes = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if labels[[row, col]].is_some() {
                continue;
            }
            let Some(class) = raster.get(row, col) else {
                continue;
            };

            let label = sizes.len();
            let mut size = 0;
            let mut stack = vec![(row, col)];
            labels[[row, col]] = Some(label);

            while let Some((r, c)) = stack.pop() {
                size += 1;
                for &(dr, dc) in connectivity.offsets() {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if labels[[nr, nc]].is_none() && raster.get(nr, nc) == Some(class) {
                        labels[[nr, nc]] = Some(label);
                        stack.push((nr, nc));
                    }
                }
            }
            sizes.push(size);
        }
    }

    ComponentLabels { labels, sizes }
}

/// Size of the component each valid pixel belongs to; 0 for invalid pixels
pub fn connected_pixel_count(raster: &ClassifiedRaster, connectivity: Connectivity) -> Array2<u32> {
    let components = connected_components(raster, connectivity);
    components
        .labels
        .mapv(|label| label.map(|l| components.sizes[l] as u32).unwrap_or(0))
}

/// Most frequent valid class in the `(2r+1)²` window; ties go to the smallest code
pub fn window_mode(raster: &ClassifiedRaster, row: usize, col: usize, radius: usize) -> Option<ClassCode> {
    let (rows, cols) = raster.shape();
    let r0 = row.saturating_sub(radius);
    let r1 = (row + radius + 1).min(rows);
    let c0 = col.saturating_sub(radius);
    let c1 = (col + radius + 1).min(cols);

    let mut counts: BTreeMap<ClassCode, usize> = BTreeMap::new();
    for r in r0..r1 {
        for c in c0..c1 {
            if let Some(class) = raster.get(r, c) {
                *counts.entry(class).or_insert(0) += 1;
            }
        }
    }

    let mut best: Option<(ClassCode, usize)> = None;
    for (class, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((class, count));
        }
    }
    best.map(|(class, _)| class)
}

/// Replaces small patches with their neighbourhood majority
pub struct SpatialCleaner {
    params: SpatialCleanParams,
}

impl SpatialCleaner {
    pub fn new() -> Self {
        Self {
            params: SpatialCleanParams::default(),
        }
    }

    pub fn with_params(params: SpatialCleanParams) -> Self {
        Self { params }
    }

    /// Clean until no small patch changes or `max_passes` is reached.
    ///
    /// Each pass reads only the raster produced by the previous pass.
    /// Invalid pixels are never filled.
    pub fn clean(&self, raster: &ClassifiedRaster) -> LandcoverResult<ClassifiedRaster> {
        if self.params.min_patch_size == 0 {
            return Err(LandcoverError::InvalidParameter(
                "minimum patch size must be at least 1".to_string(),
            ));
        }
        log::info!(
            "Spatial cleanup: min patch {} px, {}x{} mode window, {:?} connectivity",
            self.params.min_patch_size,
            2 * self.params.radius + 1,
            2 * self.params.radius + 1,
            self.params.connectivity
        );

        let mut current = raster.clone();
        for pass in 1..=self.params.max_passes {
            let (cleaned, changed) = self.clean_pass(&current);
            log::debug!("Cleanup pass {}: {} pixels reassigned", pass, changed);
            current = cleaned;
            if changed == 0 {
                break;
            }
        }

        let remaining = connected_components(&current, self.params.connectivity)
            .sizes
            .iter()
            .filter(|s| **s < self.params.min_patch_size)
            .count();
        if remaining > 0 {
            log::debug!("{} patches remain below the size threshold", remaining);
        }
        log::info!("Spatial cleanup complete");
        Ok(current)
    }

    /// One pass; returns the new raster and the number of changed pixels
    pub fn clean_pass(&self, raster: &ClassifiedRaster) -> (ClassifiedRaster, usize) {
        let components = connected_components(raster, self.params.connectivity);
        let small: Vec<(usize, usize)> = components
            .labels
            .indexed_iter()
            .filter_map(|((r, c), label)| {
                label
                    .filter(|l| components.sizes[*l] < self.params.min_patch_size)
                    .map(|_| (r, c))
            })
            .collect();

        let replacements = self.majorities(raster, &small);

        let mut cleaned = raster.clone();
        let mut changed = 0;
        for ((r, c), majority) in small.into_iter().zip(replacements) {
            if let Some(class) = majority {
                if cleaned.classes[[r, c]] != class {
                    cleaned.classes[[r, c]] = class;
                    changed += 1;
                }
            }
        }
        (cleaned, changed)
    }

    #[cfg(feature = "parallel")]
    fn majorities(&self, raster: &ClassifiedRaster, pixels: &[(usize, usize)]) -> Vec<Option<ClassCode>> {
        use rayon::prelude::*;

        pixels
            .par_iter()
            .map(|&(r, c)| window_mode(raster, r, c, self.params.radius))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn majorities(&self, raster: &ClassifiedRaster, pixels: &[(usize, usize)]) -> Vec<Option<ClassCode>> {
        pixels
            .iter()
            .map(|&(r, c)| window_mode(raster, r, c, self.params.radius))
            .collect()
    }
}

impl Default for SpatialCleaner {
    fn default() -> Self {
        Self::new()
    }
}
