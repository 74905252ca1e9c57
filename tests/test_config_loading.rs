mod common;

use common::init_logging;
use landcover::core::{Kernel, ThresholdOp};
use landcover::{LandcoverError, PipelineConfig};
use tempfile::TempDir;

#[test]
fn test_load_config_from_file() {
    init_logging();

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{
            "seasons": [
                {"name": "early", "start": "2023-05-01", "end": "2023-07-01"},
                {"name": "late", "start": "2023-07-01", "end": "2023-09-15"}
            ],
            "seasonal": {
                "optical": {"cloud_mask": {"threshold": 35}},
                "gap_fill": {"radius": 3, "iterations": 5}
            },
            "terrain": {
                "thresholds": [
                    {"name": "Above_4000m", "op": "AtOrAbove", "threshold": 4000.0}
                ]
            },
            "svm": {"cost": 10.0, "kernel": {"type": "Rbf", "gamma": 0.05}, "standardize": true}
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&path).expect("Failed to load configuration");

    assert_eq!(config.seasons.len(), 2);
    assert_eq!(config.seasons[1].name, "late");
    assert_eq!(config.seasonal.optical.cloud_mask.threshold, 35);
    assert_eq!(config.seasonal.optical.cloud_mask.probability_band, "probability");
    assert_eq!(config.seasonal.optical.feature_bands.len(), 8);
    assert_eq!(config.seasonal.indices.len(), 4);
    assert_eq!(config.seasonal.gap_fill.radius, 3);
    assert_eq!(config.terrain.thresholds.len(), 1);
    assert_eq!(config.terrain.thresholds[0].op, ThresholdOp::AtOrAbove);
    assert_eq!(config.svm.cost, 10.0);
    assert_eq!(config.svm.kernel, Kernel::Rbf { gamma: Some(0.05) });
    assert!(config.svm.standardize);
    assert_eq!(config.svm.cache_size_mb, 100.0);
    assert_eq!(config.legend.len(), 13);

    let names = config.feature_names();
    assert_eq!(names.len(), 2 * 14 + 3);
    assert!(names.contains(&"MNDWI_early".to_string()));
    assert!(names.contains(&"VH_late".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("Above_4000m"));
}

#[test]
fn test_malformed_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    std::fs::write(&path, r#"{"seasons": 4"#).unwrap();

    assert!(matches!(
        PipelineConfig::from_json_file(&path),
        Err(LandcoverError::Config(_))
    ));
    assert!(matches!(
        PipelineConfig::from_json_file(temp_dir.path().join("missing.json")),
        Err(LandcoverError::Io(_))
    ));
}

#[test]
fn test_reversed_season_is_rejected() {
    let json = r#"{"seasons": [{"name": "winter", "start": "2024-03-31", "end": "2024-02-01"}]}"#;
    assert!(matches!(
        PipelineConfig::from_json_str(json),
        Err(LandcoverError::InvalidParameter(_))
    ));
}
