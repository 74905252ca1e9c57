//! End-to-end classification run over one region

use crate::config::{PipelineConfig, VisualizationParams};
use crate::core::evaluate::{AccuracyAssessment, Evaluator};
use crate::core::feature_stack::FeatureStack;
use crate::core::sampling::{SampleTable, TrainingSampler};
use crate::core::seasonal::SeasonalFeatureBuilder;
use crate::core::spatial_clean::SpatialCleaner;
use crate::core::svm::{SvmClassifier, SvmModel};
use crate::core::terrain::TerrainFeatureBuilder;
use crate::io::archive::RasterSource;
use crate::io::dem::ElevationSource;
use crate::io::samples::read_sample_labels;
use crate::raster::{ClassifiedRaster, RasterTile};
use crate::types::{ClassCode, LandcoverResult, SampleLabel, TargetGrid};
use std::collections::BTreeMap;
use std::path::Path;

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub feature_stack: FeatureStack,
    pub samples: SampleTable,
    /// Sampled rows per class, before the training/test split
    pub class_histogram: BTreeMap<ClassCode, usize>,
    pub model: SvmModel,
    pub assessment: AccuracyAssessment,
    /// Raw per-pixel prediction
    pub classified: ClassifiedRaster,
    /// Final map after small-patch cleanup
    pub cleaned: ClassifiedRaster,
    pub visualization: VisualizationParams,
}

/// Feature extraction, training, evaluation and cleanup for one region
pub struct LandcoverPipeline<'a> {
    config: PipelineConfig,
    source: &'a dyn RasterSource,
    elevation: &'a dyn ElevationSource,
}

impl<'a> LandcoverPipeline<'a> {
    /// Validates the configuration before anything is queried
    pub fn new(
        config: PipelineConfig,
        source: &'a dyn RasterSource,
        elevation: &'a dyn ElevationSource,
    ) -> LandcoverResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            elevation,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Seasonal and terrain features assembled on `grid`
    pub fn build_features(&self, grid: &TargetGrid) -> LandcoverResult<FeatureStack> {
        log::info!(
            "Building features for {} seasons on a {}x{} grid",
            self.config.seasons.len(),
            grid.rows,
            grid.cols
        );

        let (seasonal, terrain) = self.build_tiles(grid);
        FeatureStack::assemble(&seasonal?, &terrain?)
    }

    #[cfg(feature = "parallel")]
    fn build_tiles(&self, grid: &TargetGrid) -> (LandcoverResult<Vec<RasterTile>>, LandcoverResult<RasterTile>) {
        use rayon::prelude::*;

        let builder = SeasonalFeatureBuilder::new(self.source, self.config.seasonal.clone());
        let terrain = TerrainFeatureBuilder::with_params(self.elevation, self.config.terrain.clone());
        rayon::join(
            || {
                self.config
                    .seasons
                    .par_iter()
                    .map(|season| builder.build(season, grid))
                    .collect()
            },
            || terrain.build(grid),
        )
    }

    #[cfg(not(feature = "parallel"))]
    fn build_tiles(&self, grid: &TargetGrid) -> (LandcoverResult<Vec<RasterTile>>, LandcoverResult<RasterTile>) {
        let builder = SeasonalFeatureBuilder::new(self.source, self.config.seasonal.clone());
        let terrain = TerrainFeatureBuilder::with_params(self.elevation, self.config.terrain.clone());
        let seasonal = self
            .config
            .seasons
            .iter()
            .map(|season| builder.build(season, grid))
            .collect();
        (seasonal, terrain.build(grid))
    }

    /// Full run with labels supplied by the caller
    pub fn run(&self, grid: &TargetGrid, labels: &[SampleLabel]) -> LandcoverResult<PipelineOutput> {
        log::info!("Starting land-cover run with {} sample labels", labels.len());

        let legend = self.config.class_codes();
        let unknown: Vec<ClassCode> = labels
            .iter()
            .map(|l| l.class_code)
            .filter(|c| legend.binary_search(c).is_err())
            .collect();
        if !unknown.is_empty() {
            log::warn!("{} labels carry classes outside the legend: {:?}", unknown.len(), unknown);
        }

        let feature_stack = self.build_features(grid)?;

        let samples = TrainingSampler::with_params(self.config.sampling.clone()).sample(&feature_stack, labels)?;
        let (training, testing) = samples.split(self.config.sampling.split.fraction)?;
        let class_histogram = samples.class_histogram();
        log::info!(
            "Sample count per class: {:?} ({} training, {} test)",
            class_histogram,
            training.len(),
            testing.len()
        );

        let classes = samples.classes();
        let model = SvmClassifier::with_params(self.config.svm.clone()).train(&training, &classes)?;

        let (assessment, classified) = self.evaluate_and_classify(&model, &testing, &classes, &feature_stack);
        let assessment = assessment?;
        let classified = classified?;

        let cleaned = SpatialCleaner::with_params(self.config.cleanup.clone()).clean(&classified)?;
        log::info!("Final map class counts: {:?}", cleaned.class_counts());

        Ok(PipelineOutput {
            feature_stack,
            samples,
            class_histogram,
            model,
            assessment,
            classified,
            cleaned,
            visualization: self.config.visualization(),
        })
    }

    /// Full run with labels read from a GeoJSON file
    pub fn run_with_label_file<P: AsRef<Path>>(&self, grid: &TargetGrid, labels: P) -> LandcoverResult<PipelineOutput> {
        let labels = read_sample_labels(labels, &self.config.class_property)?;
        self.run(grid, &labels)
    }

    #[cfg(feature = "parallel")]
    fn evaluate_and_classify(
        &self,
        model: &SvmModel,
        testing: &SampleTable,
        classes: &[ClassCode],
        stack: &FeatureStack,
    ) -> (LandcoverResult<AccuracyAssessment>, LandcoverResult<ClassifiedRaster>) {
        rayon::join(
            || Evaluator::assess(model, testing, classes),
            || model.classify(stack),
        )
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_and_classify(
        &self,
        model: &SvmModel,
        testing: &SampleTable,
        classes: &[ClassCode],
        stack: &FeatureStack,
    ) -> (LandcoverResult<AccuracyAssessment>, LandcoverResult<ClassifiedRaster>) {
        (Evaluator::assess(model, testing, classes), model.classify(stack))
    }
}
