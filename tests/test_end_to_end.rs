mod common;

use common::{class_archive, grid, init_logging, optical_dn, point_label, summer, OPTICAL_BANDS};
use landcover::core::{GapFiller, SeasonalFeatureBuilder, SeasonalFeatureParams};
use landcover::{ClassCode, LandcoverPipeline, PipelineConfig};
use ndarray::Array2;

#[test]
fn test_single_clear_observation_passes_through() {
    init_logging();

    let classes = Array2::from_shape_vec((2, 2), vec![0, 1, 2, 3]).unwrap();
    let archive = class_archive(&classes, 5.0);
    let builder = SeasonalFeatureBuilder::new(&archive, SeasonalFeatureParams::default());

    let composite = builder
        .optical_composite(&summer(), &grid(2, 2))
        .expect("Failed to build optical composite");

    for (k, name) in OPTICAL_BANDS.iter().enumerate() {
        let band = composite.band(name).unwrap();
        assert_eq!(band.valid_count(), 4);
        for ((row, col), class) in classes.indexed_iter() {
            let expected = optical_dn(*class, k) * 1.0e-4;
            assert_eq!(band.get(row, col), Some(expected), "{} at ({}, {})", name, row, col);
        }
    }

    // Nothing to fill
    let filled = GapFiller::new().fill(&composite).unwrap();
    assert_eq!(filled, composite);
}

#[test]
fn test_cloudy_observation_yields_invalid_optical_features() {
    init_logging();

    let classes = Array2::from_elem((2, 2), 1);
    let archive = class_archive(&classes, 80.0);
    let builder = SeasonalFeatureBuilder::new(&archive, SeasonalFeatureParams::default());

    let seasonal = builder.build(&summer(), &grid(2, 2)).unwrap();
    assert_eq!(seasonal.band("B8_summer").unwrap().valid_count(), 0);
    assert_eq!(seasonal.band("NDVI_summer").unwrap().valid_count(), 0);
    // Radar is unaffected by optical clouds
    assert_eq!(seasonal.band("VV_summer").unwrap().valid_count(), 4);
}

#[test]
fn test_full_run_recovers_class_stripes() {
    init_logging();

    // Three vertical stripes, four columns each
    let classes: Array2<ClassCode> = Array2::from_shape_fn((12, 12), |(_, col)| (col / 4) as ClassCode * 2);
    let archive = class_archive(&classes, 0.0);
    let target = grid(12, 12);

    let config = PipelineConfig {
        seasons: vec![summer()],
        ..Default::default()
    };
    let pipeline = LandcoverPipeline::new(config, &archive, &archive).expect("Invalid configuration");

    let labels: Vec<_> = classes
        .indexed_iter()
        .map(|((row, col), class)| point_label(&target, row, col, *class))
        .collect();

    let output = pipeline.run(&target, &labels).expect("Pipeline run failed");

    assert_eq!(output.feature_stack.band_count(), 14 + 5);
    assert_eq!(output.samples.len(), 144);
    assert_eq!(output.model.classes(), &[0, 2, 4]);

    assert_eq!(output.classified.classes, classes);
    assert!(output.classified.valid.iter().all(|v| *v));
    assert_eq!(output.cleaned, output.classified);

    assert_eq!(output.assessment.overall_accuracy, 1.0);
    assert_eq!(output.assessment.kappa, 1.0);
    assert_eq!(output.visualization.max, 12);

    let sampled: usize = output.class_histogram.values().sum();
    assert_eq!(sampled, 144);
    assert_eq!(output.class_histogram.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
    assert!(output.assessment.test_samples > 0 && output.assessment.test_samples < 144);
}

#[test]
fn test_run_with_geojson_labels() {
    init_logging();

    let classes: Array2<ClassCode> = Array2::from_shape_fn((10, 10), |(row, _)| if row < 5 { 4 } else { 9 });
    let archive = class_archive(&classes, 0.0);
    let target = grid(10, 10);

    // Two polygons covering the top and bottom halves
    let geojson = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"landcover": 4, "name": "Lake"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [500000.0, 4000000.0], [500100.0, 4000000.0],
                    [500100.0, 3999950.0], [500000.0, 3999950.0],
                    [500000.0, 4000000.0]
                ]]}
            },
            {
                "type": "Feature",
                "properties": {"landcover": 9, "name": "Alpine Wetland"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [500000.0, 3999950.0], [500100.0, 3999950.0],
                    [500100.0, 3999900.0], [500000.0, 3999900.0],
                    [500000.0, 3999950.0]
                ]]}
            }
        ]
    }"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("samples.geojson");
    std::fs::write(&path, geojson).unwrap();

    let config = PipelineConfig {
        seasons: vec![summer()],
        ..Default::default()
    };
    let pipeline = LandcoverPipeline::new(config, &archive, &archive).unwrap();
    let output = pipeline.run_with_label_file(&target, &path).unwrap();

    assert_eq!(output.samples.len(), 100);
    assert_eq!(output.samples.class_histogram().get(&4), Some(&50));
    assert_eq!(output.cleaned.classes, classes);
}
