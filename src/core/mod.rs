//! Core land-cover processing modules

pub mod cloud_mask;
pub mod scene_merge;
pub mod composite;
pub mod gap_fill;
pub mod indices;
pub mod seasonal;
pub mod terrain;
pub mod feature_stack;
pub mod sampling;
pub mod svm;
pub mod evaluate;
pub mod spatial_clean;

// Re-export main types
pub use cloud_mask::{CloudMasker, CloudMaskParams};
pub use scene_merge::{SceneMerger, SceneJoin};
pub use composite::Compositor;
pub use gap_fill::{GapFiller, GapFillParams};
pub use indices::{IndexCalculator, IndexDefinition, normalized_difference};
pub use seasonal::{SeasonalFeatureBuilder, SeasonalFeatureParams, OpticalParams, RadarParams};
pub use terrain::{TerrainFeatureBuilder, TerrainParams, ElevationThreshold, ThresholdOp};
pub use feature_stack::FeatureStack;
pub use sampling::{TrainingSampler, SamplingParams, SplitParams, SampleTable, SampleRow};
pub use svm::{SvmClassifier, SvmModel, SvmParams, Kernel, KernelFunction, FeatureScaler};
pub use evaluate::{Evaluator, ConfusionMatrix, AccuracyAssessment};
pub use spatial_clean::{SpatialCleaner, SpatialCleanParams, Connectivity, connected_pixel_count};
