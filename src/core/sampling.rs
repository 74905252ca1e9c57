//! Training sample extraction and the seeded train/test split

use crate::core::feature_stack::FeatureStack;
use crate::types::{ClassCode, LandcoverError, LandcoverResult, SampleLabel, TargetGrid};
use geo::{BoundingRect, Contains, Geometry, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Train/test split parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    /// Probability that a row lands in the training partition
    pub fraction: f64,
    /// `None` draws a fresh seed per run
    pub seed: Option<u64>,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            fraction: 0.7,
            seed: Some(42),
        }
    }
}

/// Sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Sampling lattice spacing in map units
    pub scale: f64,
    pub split: SplitParams,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            scale: 10.0,
            split: SplitParams::default(),
        }
    }
}

/// One sampled pixel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub features: Vec<f64>,
    pub class_code: ClassCode,
    /// Uniform in `[0, 1)`, drives the train/test split
    pub random: f64,
    /// (row, col) on the feature grid
    pub pixel: (usize, usize),
}

/// Sampled rows sharing one feature schema
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub feature_names: Vec<String>,
    pub rows: Vec<SampleRow>,
    /// Seed that produced the random column
    pub seed: u64,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with `random < fraction` train, the rest test
    pub fn split(&self, fraction: f64) -> LandcoverResult<(SampleTable, SampleTable)> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(LandcoverError::InvalidParameter(format!(
                "split fraction must be in [0, 1], got {}",
                fraction
            )));
        }

        let (training, testing): (Vec<SampleRow>, Vec<SampleRow>) =
            self.rows.iter().cloned().partition(|row| row.random < fraction);

        log::info!(
            "Split {} samples into {} training and {} testing rows (fraction {})",
            self.rows.len(),
            training.len(),
            testing.len(),
            fraction
        );
        Ok((self.with_rows(training), self.with_rows(testing)))
    }

    /// Row count per class
    pub fn class_histogram(&self) -> BTreeMap<ClassCode, usize> {
        let mut histogram = BTreeMap::new();
        for row in &self.rows {
            *histogram.entry(row.class_code).or_insert(0) += 1;
        }
        histogram
    }

    /// Distinct classes present, ascending
    pub fn classes(&self) -> Vec<ClassCode> {
        self.rows
            .iter()
            .map(|r| r.class_code)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn with_rows(&self, rows: Vec<SampleRow>) -> SampleTable {
        SampleTable {
            feature_names: self.feature_names.clone(),
            rows,
            seed: self.seed,
        }
    }
}

/// Extracts labelled feature vectors from the feature stack
pub struct TrainingSampler {
    params: SamplingParams,
}

impl TrainingSampler {
    pub fn new() -> Self {
        Self {
            params: SamplingParams::default(),
        }
    }

    pub fn with_params(params: SamplingParams) -> Self {
        Self { params }
    }

    /// One row per covered pixel per label, with a seeded random column.
    ///
    /// Rows whose pixel has any invalid feature are dropped.
    pub fn sample(&self, stack: &FeatureStack, labels: &[SampleLabel]) -> LandcoverResult<SampleTable> {
        if self.params.scale <= 0.0 || !self.params.scale.is_finite() {
            return Err(LandcoverError::InvalidParameter(format!(
                "sampling scale must be positive, got {}",
                self.params.scale
            )));
        }

        let grid = stack.tile().grid();
        let stride = lattice_stride(self.params.scale, grid.geo_transform.pixel_width);
        let seed = match self.params.split.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen::<u64>();
                log::info!("No split seed configured; drew seed {}", seed);
                seed
            }
        };
        log::info!(
            "Sampling {} labels at scale {} (stride {} px, seed {})",
            labels.len(),
            self.params.scale,
            stride,
            seed
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::new();
        let mut dropped = 0usize;

        for label in labels {
            for (row, col) in covered_pixels(&label.geometry, &grid, stride) {
                match stack.features_at(row, col) {
                    Some(features) => rows.push(SampleRow {
                        features,
                        class_code: label.class_code,
                        random: rng.gen::<f64>(),
                        pixel: (row, col),
                    }),
                    None => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            log::warn!("Dropped {} sample pixels with invalid features", dropped);
        }

        let table = SampleTable {
            feature_names: stack.band_names(),
            rows,
            seed,
        };
        log::info!("Sampled {} rows: {:?}", table.len(), table.class_histogram());
        Ok(table)
    }
}

impl Default for TrainingSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Lattice stride in pixels for a sampling scale
pub fn lattice_stride(scale: f64, pixel_width: f64) -> usize {
    let pixel = pixel_width.abs();
    if pixel == 0.0 {
        return 1;
    }
    ((scale / pixel).round() as usize).max(1)
}

/// Grid pixels a geometry selects.
///
/// Points select the pixel containing them. Other geometries select every
/// lattice pixel (row and column multiples of `stride`) whose centre they
/// contain.
pub fn covered_pixels(geometry: &Geometry<f64>, grid: &TargetGrid, stride: usize) -> Vec<(usize, usize)> {
    match geometry {
        Geometry::Point(point) => containing_pixel(point, grid).into_iter().collect(),
        Geometry::MultiPoint(points) => points
            .iter()
            .filter_map(|p| containing_pixel(p, grid))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        _ => {
            let Some(rect) = geometry.bounding_rect() else {
                return Vec::new();
            };
            let gt = &grid.geo_transform;
            let (r0, c0) = gt.world_to_pixel(rect.min().x, rect.max().y);
            let (r1, c1) = gt.world_to_pixel(rect.max().x, rect.min().y);
            let (row_start, row_end) = pixel_span(r0, r1, grid.rows);
            let (col_start, col_end) = pixel_span(c0, c1, grid.cols);

            let mut pixels = Vec::new();
            for row in (row_start..row_end).filter(|r| r % stride == 0) {
                for col in (col_start..col_end).filter(|c| c % stride == 0) {
                    let (x, y) = gt.pixel_center(row, col);
                    if geometry.contains(&Point::new(x, y)) {
                        pixels.push((row, col));
                    }
                }
            }
            pixels
        }
    }
}

fn containing_pixel(point: &Point<f64>, grid: &TargetGrid) -> Option<(usize, usize)> {
    let (row, col) = grid.geo_transform.world_to_pixel(point.x(), point.y());
    if row < 0.0 || col < 0.0 {
        return None;
    }
    let (row, col) = (row.floor() as usize, col.floor() as usize);
    (row < grid.rows && col < grid.cols).then_some((row, col))
}

/// Index range covering fractional positions `a..b` in either order, clamped to `0..len`
fn pixel_span(a: f64, b: f64, len: usize) -> (usize, usize) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let start = lo.floor().max(0.0) as usize;
    let end = (hi.ceil().max(0.0) as usize).min(len);
    (start.min(len), end)
}
