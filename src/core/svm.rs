//! Multi-class support-vector classifier
//!
//! One binary C-SVC per class pair, each solved with SMO using
//! second-order working-set selection. Prediction is by pairwise voting.

use crate::core::feature_stack::FeatureStack;
use crate::core::sampling::SampleTable;
use crate::raster::ClassifiedRaster;
use crate::types::{ClassCode, LandcoverError, LandcoverResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Floor for non-positive curvature in the two-variable subproblem
const TAU: f64 = 1e-12;

/// Kernel choice as configured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Kernel {
    /// `K(a, b) = a . b`
    Linear,
    /// `K(a, b) = exp(-gamma |a - b|^2)`; `gamma: None` uses `1 / n_features`
    Rbf { gamma: Option<f64> },
}

impl Kernel {
    /// Kernel with every parameter fixed for `n_features` inputs
    pub fn resolve(&self, n_features: usize) -> LandcoverResult<KernelFunction> {
        match *self {
            Kernel::Linear => Ok(KernelFunction::Linear),
            Kernel::Rbf { gamma } => {
                let gamma = gamma.unwrap_or(1.0 / n_features.max(1) as f64);
                if !(gamma > 0.0) || !gamma.is_finite() {
                    return Err(LandcoverError::InvalidParameter(format!(
                        "RBF gamma must be positive, got {}",
                        gamma
                    )));
                }
                Ok(KernelFunction::Rbf { gamma })
            }
        }
    }
}

/// Kernel of a trained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelFunction {
    Linear,
    Rbf { gamma: f64 },
}

impl KernelFunction {
    pub fn evaluate(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            KernelFunction::Linear => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            KernelFunction::Rbf { gamma } => {
                let squared: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * squared).exp()
            }
        }
    }
}

/// Classifier hyperparameters.
///
/// The defaults are libsvm's: C-SVC with a linear kernel and C = 1 on the
/// raw feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    pub kernel: Kernel,
    /// Penalty C
    pub cost: f64,
    /// Stopping tolerance on the maximal KKT violation
    pub tolerance: f64,
    /// Solver iteration cap per class pair; `None` uses `max(10^7, 100 * l)`
    pub max_iterations: Option<usize>,
    /// Z-score features with training-partition statistics
    pub standardize: bool,
    /// Kernel-row cache per class pair, in MiB
    pub cache_size_mb: f64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            kernel: Kernel::Linear,
            cost: 1.0,
            tolerance: 1e-3,
            max_iterations: None,
            standardize: false,
            cache_size_mb: 100.0,
        }
    }
}

impl SvmParams {
    pub fn validate(&self) -> LandcoverResult<()> {
        if !(self.cost > 0.0) || !(self.tolerance > 0.0) {
            return Err(LandcoverError::InvalidParameter(format!(
                "cost and tolerance must be positive (cost {}, tolerance {})",
                self.cost, self.tolerance
            )));
        }
        if !(self.cache_size_mb >= 0.0) || !self.cache_size_mb.is_finite() {
            return Err(LandcoverError::InvalidParameter(format!(
                "kernel cache size must be a non-negative number of MiB, got {}",
                self.cache_size_mb
            )));
        }
        if let Kernel::Rbf { gamma: Some(gamma) } = self.kernel {
            if !(gamma > 0.0) || !gamma.is_finite() {
                return Err(LandcoverError::InvalidParameter(format!(
                    "RBF gamma must be positive, got {}",
                    gamma
                )));
            }
        }
        Ok(())
    }

    fn cache_bytes(&self) -> usize {
        (self.cache_size_mb * 1024.0 * 1024.0) as usize
    }
}

/// Per-feature affine scaling fitted on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    /// Mean and standard deviation per feature, from centred sums.
    ///
    /// Features that do not vary over the rows (up to rounding relative to
    /// their magnitude) get unit scale.
    pub fn fit<'a, I>(rows: I, n_features: usize) -> Self
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let rows: Vec<&[f64]> = rows.into_iter().collect();
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0; n_features];
        let mut min = vec![f64::INFINITY; n_features];
        let mut max = vec![f64::NEG_INFINITY; n_features];
        for row in &rows {
            for (k, v) in row.iter().enumerate().take(n_features) {
                mean[k] += v;
                min[k] = min[k].min(*v);
                max[k] = max[k].max(*v);
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut squares = vec![0.0; n_features];
        for row in &rows {
            for (k, v) in row.iter().enumerate().take(n_features) {
                let d = v - mean[k];
                squares[k] += d * d;
            }
        }

        let scale = (0..n_features)
            .map(|k| {
                let std = (squares[k] / n).sqrt();
                let constant = max[k] <= min[k] || std <= 1e-9 * mean[k].abs().max(1.0);
                if constant {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Self { mean, scale }
    }

    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Decision function of one class pair: positive favours `positive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMachine {
    pub positive: ClassCode,
    pub negative: ClassCode,
    pub support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` per support vector
    pub coefficients: Vec<f64>,
    pub rho: f64,
}

impl BinaryMachine {
    pub fn decision(&self, x: &[f64], kernel: &KernelFunction) -> f64 {
        let sum: f64 = self
            .support_vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(sv, coef)| coef * kernel.evaluate(sv, x))
            .sum();
        sum - self.rho
    }
}

/// Kernel rows of one binary problem, evicted least recently used first
/// once `capacity` rows are held
struct KernelCache {
    rows: Vec<Option<Vec<f64>>>,
    last_used: Vec<u64>,
    clock: u64,
    cached: usize,
    capacity: usize,
}

impl KernelCache {
    fn new(len: usize, budget_bytes: usize) -> Self {
        let row_bytes = (len * std::mem::size_of::<f64>()).max(1);
        // The working pair must fit
        let capacity = (budget_bytes / row_bytes).max(2);
        Self {
            rows: vec![None; len],
            last_used: vec![0; len],
            clock: 0,
            cached: 0,
            capacity,
        }
    }

    fn contains(&self, i: usize) -> bool {
        self.rows[i].is_some()
    }

    fn get(&self, i: usize) -> &[f64] {
        self.rows[i].as_deref().unwrap_or(&[])
    }

    fn touch(&mut self, i: usize) {
        self.clock += 1;
        self.last_used[i] = self.clock;
    }

    /// Store row `i`, evicting the least recently used row other than `pinned`
    fn insert(&mut self, i: usize, row: Vec<f64>, pinned: Option<usize>) {
        if self.cached >= self.capacity {
            let victim = (0..self.rows.len())
                .filter(|&t| t != i && Some(t) != pinned && self.rows[t].is_some())
                .min_by_key(|&t| self.last_used[t]);
            if let Some(victim) = victim {
                self.rows[victim] = None;
                self.cached -= 1;
            }
        }
        self.rows[i] = Some(row);
        self.cached += 1;
        self.touch(i);
    }

    #[cfg(test)]
    fn cached_rows(&self) -> usize {
        self.cached
    }
}

/// Solution of one binary problem
struct Solution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// SMO for `min 0.5 a'Qa - e'a` s.t. `y'a = 0`, `0 <= a <= C`
struct SmoSolver<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    kernel: KernelFunction,
    cost: f64,
    /// `K(x_i, x_i)`
    diagonal: Vec<f64>,
    cache: KernelCache,
}

impl<'a> SmoSolver<'a> {
    fn new(x: &'a [Vec<f64>], y: &'a [f64], kernel: KernelFunction, cost: f64, cache_bytes: usize) -> Self {
        let diagonal = x.iter().map(|xi| kernel.evaluate(xi, xi)).collect();
        Self {
            x,
            y,
            kernel,
            cost,
            diagonal,
            cache: KernelCache::new(x.len(), cache_bytes),
        }
    }

    fn ensure_row(&mut self, i: usize, pinned: Option<usize>) {
        if self.cache.contains(i) {
            self.cache.touch(i);
            return;
        }
        let xi = &self.x[i];
        let row = self.x.iter().map(|xj| self.kernel.evaluate(xi, xj)).collect();
        self.cache.insert(i, row, pinned);
    }

    fn row(&self, i: usize) -> &[f64] {
        self.cache.get(i)
    }

    fn is_upper(&self, alpha: f64) -> bool {
        alpha >= self.cost
    }

    fn is_lower(alpha: f64) -> bool {
        alpha <= 0.0
    }

    fn solve(mut self, eps: f64, max_iterations: usize) -> Solution {
        let l = self.x.len();
        let y = self.y;
        let mut alpha = vec![0.0; l];
        // Gradient of the dual objective; starts at -e
        let mut gradient = vec![-1.0; l];
        let mut iterations = 0;

        while iterations < max_iterations {
            let Some((i, j)) = self.select_working_set(&alpha, &gradient, eps) else {
                break;
            };
            iterations += 1;

            self.ensure_row(j, Some(i));
            let (old_i, old_j) = (alpha[i], alpha[j]);
            let k_ij = self.row(i)[j];
            let quad = (self.diagonal[i] + self.diagonal[j] - 2.0 * k_ij).max(TAU);
            let c = self.cost;
            if y[i] != y[j] {
                let delta = (-gradient[i] - gradient[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let delta = (gradient[i] - gradient[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let delta_i = alpha[i] - old_i;
            let delta_j = alpha[j] - old_j;
            let (row_i, row_j) = (self.row(i), self.row(j));
            for k in 0..l {
                gradient[k] += y[k] * (y[i] * row_i[k] * delta_i + y[j] * row_j[k] * delta_j);
            }
        }

        if iterations >= max_iterations {
            log::warn!(
                "SMO reached the iteration cap ({}) before converging",
                max_iterations
            );
        }

        let rho = self.rho(&alpha, &gradient);
        Solution {
            alpha,
            rho,
            iterations,
        }
    }

    /// Maximal violating pair with second-order selection of `j`; `None`
    /// once the KKT violation drops below `eps`
    fn select_working_set(&mut self, alpha: &[f64], gradient: &[f64], eps: f64) -> Option<(usize, usize)> {
        let y = self.y;

        let mut g_max = f64::NEG_INFINITY;
        let mut i_best = None;
        for t in 0..alpha.len() {
            let candidate = if y[t] > 0.0 {
                (!self.is_upper(alpha[t])).then(|| -gradient[t])
            } else {
                (!Self::is_lower(alpha[t])).then(|| gradient[t])
            };
            if let Some(value) = candidate {
                if value >= g_max {
                    g_max = value;
                    i_best = Some(t);
                }
            }
        }
        let i = i_best?;
        self.ensure_row(i, None);
        let row_i = self.row(i);

        let mut g_max2 = f64::NEG_INFINITY;
        let mut j_best = None;
        let mut obj_diff_min = f64::INFINITY;
        for t in 0..alpha.len() {
            let violation = if y[t] > 0.0 {
                (!Self::is_lower(alpha[t])).then(|| gradient[t])
            } else {
                (!self.is_upper(alpha[t])).then(|| -gradient[t])
            };
            let Some(violation) = violation else {
                continue;
            };
            if violation >= g_max2 {
                g_max2 = violation;
            }
            let grad_diff = g_max + violation;
            if grad_diff > 0.0 {
                let quad = self.diagonal[i] + self.diagonal[t] - 2.0 * row_i[t];
                let obj_diff = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    j_best = Some(t);
                }
            }
        }

        if g_max + g_max2 < eps {
            return None;
        }
        j_best.map(|j| (i, j))
    }

    fn rho(&self, alpha: &[f64], gradient: &[f64]) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut free_count = 0usize;

        for t in 0..alpha.len() {
            let yg = self.y[t] * gradient[t];
            let at_upper = self.is_upper(alpha[t]);
            let at_lower = Self::is_lower(alpha[t]);
            if at_upper || at_lower {
                if (at_upper && self.y[t] < 0.0) || (at_lower && self.y[t] > 0.0) {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                free_count += 1;
                free_sum += yg;
            }
        }

        if free_count > 0 {
            free_sum / free_count as f64
        } else {
            (upper + lower) / 2.0
        }
    }
}

/// Trains [`SvmModel`]s
pub struct SvmClassifier {
    params: SvmParams,
}

impl SvmClassifier {
    pub fn new() -> Self {
        Self {
            params: SvmParams::default(),
        }
    }

    pub fn with_params(params: SvmParams) -> Self {
        Self { params }
    }

    /// Train on `training` for the given classes.
    ///
    /// Every listed class must have at least one row and at least two
    /// classes are required.
    pub fn train(&self, training: &SampleTable, classes: &[ClassCode]) -> LandcoverResult<SvmModel> {
        let classes: Vec<ClassCode> = classes.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let n_features = training.feature_names.len();

        if training.is_empty() {
            return Err(LandcoverError::DegenerateTrainingSet(
                "training partition is empty".to_string(),
            ));
        }
        if classes.len() < 2 {
            return Err(LandcoverError::DegenerateTrainingSet(format!(
                "at least two classes are required, got {:?}",
                classes
            )));
        }
        if n_features == 0 {
            return Err(LandcoverError::DegenerateTrainingSet(
                "training rows carry no features".to_string(),
            ));
        }
        self.params.validate()?;

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
        for (index, row) in training.rows.iter().enumerate() {
            if row.features.len() != n_features {
                return Err(LandcoverError::InvalidParameter(format!(
                    "row {} has {} features, expected {}",
                    index,
                    row.features.len(),
                    n_features
                )));
            }
            match classes.binary_search(&row.class_code) {
                Ok(position) => members[position].push(index),
                Err(_) => {
                    return Err(LandcoverError::InvalidParameter(format!(
                        "training row {} has class {} outside {:?}",
                        index, row.class_code, classes
                    )))
                }
            }
        }
        if let Some(position) = members.iter().position(Vec::is_empty) {
            return Err(LandcoverError::DegenerateTrainingSet(format!(
                "class {} has no training rows",
                classes[position]
            )));
        }

        let kernel = self.params.kernel.resolve(n_features)?;

        let scaler = self.params.standardize.then(|| {
            FeatureScaler::fit(training.rows.iter().map(|r| r.features.as_slice()), n_features)
        });
        let features: Vec<Vec<f64>> = training
            .rows
            .iter()
            .map(|r| match &scaler {
                Some(s) => s.transform(&r.features),
                None => r.features.clone(),
            })
            .collect();

        log::info!(
            "Training SVM: {} rows, {} features, {} classes (C = {}, {:?} kernel, standardize = {})",
            training.len(),
            n_features,
            classes.len(),
            self.params.cost,
            kernel,
            self.params.standardize
        );

        let pairs: Vec<(usize, usize)> = (0..classes.len())
            .flat_map(|a| (a + 1..classes.len()).map(move |b| (a, b)))
            .collect();

        let machines = self.train_pairs(&pairs, &classes, &members, &features, &kernel);

        let support_vectors: usize = machines.iter().map(|m| m.support_vectors.len()).sum();
        log::info!(
            "Trained {} pairwise machines with {} support vectors in total",
            machines.len(),
            support_vectors
        );

        Ok(SvmModel {
            classes,
            feature_names: training.feature_names.clone(),
            kernel,
            scaler,
            machines,
        })
    }

    #[cfg(feature = "parallel")]
    fn train_pairs(
        &self,
        pairs: &[(usize, usize)],
        classes: &[ClassCode],
        members: &[Vec<usize>],
        features: &[Vec<f64>],
        kernel: &KernelFunction,
    ) -> Vec<BinaryMachine> {
        use rayon::prelude::*;

        pairs
            .par_iter()
            .map(|&(a, b)| self.train_pair(classes[a], &members[a], classes[b], &members[b], features, kernel))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn train_pairs(
        &self,
        pairs: &[(usize, usize)],
        classes: &[ClassCode],
        members: &[Vec<usize>],
        features: &[Vec<f64>],
        kernel: &KernelFunction,
    ) -> Vec<BinaryMachine> {
        pairs
            .iter()
            .map(|&(a, b)| self.train_pair(classes[a], &members[a], classes[b], &members[b], features, kernel))
            .collect()
    }

    fn train_pair(
        &self,
        positive: ClassCode,
        positive_rows: &[usize],
        negative: ClassCode,
        negative_rows: &[usize],
        features: &[Vec<f64>],
        kernel: &KernelFunction,
    ) -> BinaryMachine {
        let x: Vec<Vec<f64>> = positive_rows
            .iter()
            .chain(negative_rows)
            .map(|&i| features[i].clone())
            .collect();
        let y: Vec<f64> = std::iter::repeat(1.0)
            .take(positive_rows.len())
            .chain(std::iter::repeat(-1.0).take(negative_rows.len()))
            .collect();

        let max_iterations = self
            .params
            .max_iterations
            .unwrap_or_else(|| (100 * x.len()).max(10_000_000));
        let solution = SmoSolver::new(&x, &y, *kernel, self.params.cost, self.params.cache_bytes())
            .solve(self.params.tolerance, max_iterations);

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for ((xi, yi), ai) in x.into_iter().zip(&y).zip(&solution.alpha) {
            if *ai > 0.0 {
                support_vectors.push(xi);
                coefficients.push(ai * yi);
            }
        }

        log::debug!(
            "Pair {} vs {}: {} iterations, {} support vectors, rho = {:.6}",
            positive,
            negative,
            solution.iterations,
            support_vectors.len(),
            solution.rho
        );

        BinaryMachine {
            positive,
            negative,
            support_vectors,
            coefficients,
            rho: solution.rho,
        }
    }
}

impl Default for SvmClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Trained one-vs-one classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    classes: Vec<ClassCode>,
    feature_names: Vec<String>,
    kernel: KernelFunction,
    scaler: Option<FeatureScaler>,
    machines: Vec<BinaryMachine>,
}

impl SvmModel {
    /// Classes in ascending order; ties in voting go to the earliest
    pub fn classes(&self) -> &[ClassCode] {
        &self.classes
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn kernel(&self) -> &KernelFunction {
        &self.kernel
    }

    pub fn machines(&self) -> &[BinaryMachine] {
        &self.machines
    }

    /// Class of one raw (unscaled) feature vector
    pub fn predict(&self, features: &[f64]) -> LandcoverResult<ClassCode> {
        if features.len() != self.feature_names.len() {
            return Err(LandcoverError::InvalidParameter(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }
        Ok(self.vote(features))
    }

    /// Predicted class of every row in `table`
    pub fn predict_table(&self, table: &SampleTable) -> LandcoverResult<Vec<ClassCode>> {
        if table.feature_names != self.feature_names {
            return Err(LandcoverError::InvalidParameter(
                "sample table features differ from the model's".to_string(),
            ));
        }
        table.rows.iter().map(|row| self.predict(&row.features)).collect()
    }

    /// Classify every pixel of the stack. Pixels with any invalid feature
    /// are invalid in the output.
    pub fn classify(&self, stack: &FeatureStack) -> LandcoverResult<ClassifiedRaster> {
        let tile = stack.tile().select(&self.feature_names)?;
        let (rows, cols) = tile.shape();
        log::info!("Classifying {}x{} pixels with {} features", rows, cols, self.feature_names.len());

        let labels = self.classify_pixels(rows, cols, |row, col| tile.pixel_values(row, col));

        let valid: Vec<bool> = labels.iter().map(Option::is_some).collect();
        let classes: Vec<ClassCode> = labels.into_iter().map(|c| c.unwrap_or(0)).collect();
        let classes = Array2::from_shape_vec((rows, cols), classes)
            .map_err(|e| LandcoverError::Processing(format!("Shape error: {}", e)))?;
        let valid = Array2::from_shape_vec((rows, cols), valid)
            .map_err(|e| LandcoverError::Processing(format!("Shape error: {}", e)))?;

        let classified = ClassifiedRaster::new(classes, valid, tile.geo_transform, tile.crs.clone())?;
        log::info!("Classification complete: {:?}", classified.class_counts());
        Ok(classified)
    }

    #[cfg(feature = "parallel")]
    fn classify_pixels<F>(&self, rows: usize, cols: usize, pixel: F) -> Vec<Option<ClassCode>>
    where
        F: Fn(usize, usize) -> Option<Vec<f32>> + Sync,
    {
        use rayon::prelude::*;

        (0..rows * cols)
            .into_par_iter()
            .map(|idx| pixel(idx / cols, idx % cols).map(|v| self.vote(&widen(&v))))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn classify_pixels<F>(&self, rows: usize, cols: usize, pixel: F) -> Vec<Option<ClassCode>>
    where
        F: Fn(usize, usize) -> Option<Vec<f32>> + Sync,
    {
        (0..rows * cols)
            .map(|idx| pixel(idx / cols, idx % cols).map(|v| self.vote(&widen(&v))))
            .collect()
    }

    fn vote(&self, features: &[f64]) -> ClassCode {
        let scaled;
        let x = match &self.scaler {
            Some(scaler) => {
                scaled = scaler.transform(features);
                scaled.as_slice()
            }
            None => features,
        };

        let mut votes = vec![0usize; self.classes.len()];
        for machine in &self.machines {
            let winner = if machine.decision(x, &self.kernel) > 0.0 {
                machine.positive
            } else {
                machine.negative
            };
            if let Ok(position) = self.classes.binary_search(&winner) {
                votes[position] += 1;
            }
        }

        let mut best = 0;
        for (position, count) in votes.iter().enumerate() {
            if *count > votes[best] {
                best = position;
            }
        }
        self.classes[best]
    }
}

fn widen(values: &[f32]) -> Vec<f64> {
    values.iter().map(|v| f64::from(*v)).collect()
}
