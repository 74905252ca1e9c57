#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use geo::{Geometry, Point};
use landcover::{
    AcquisitionMode, Band, ClassCode, CoordinateSystem, GeoTransform, InMemoryArchive, OrbitPass,
    Polarization, RadarMetadata, RasterTile, SampleLabel, SceneId, SceneMetadata, Season, Sensor,
    TargetGrid,
};
use ndarray::Array2;

pub const OPTICAL_BANDS: [&str; 8] = ["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B11"];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn grid(rows: usize, cols: usize) -> TargetGrid {
    TargetGrid {
        rows,
        cols,
        geo_transform: GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0),
        crs: CoordinateSystem::Projected { epsg: 32646 },
    }
}

pub fn summer() -> Season {
    Season::new(
        "summer",
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 8, 31).unwrap(),
    )
}

fn metadata(id: &str, day: u32, radar: Option<RadarMetadata>) -> SceneMetadata {
    SceneMetadata {
        scene_id: Some(SceneId::new(id)),
        acquired: Some(Utc.with_ymd_and_hms(2024, 7, day, 4, 37, 0).unwrap()),
        radar,
    }
}

/// Digital number of optical band `band` over a pixel of class `class`
pub fn optical_dn(class: ClassCode, band: usize) -> f32 {
    1000.0 + 1500.0 * class as f32 + 120.0 * band as f32 * (class as f32 + 1.0)
}

fn per_pixel<F: Fn(ClassCode) -> f32>(classes: &Array2<ClassCode>, f: F) -> Array2<f32> {
    classes.mapv(f)
}

/// Optical, cloud-probability and radar scenes plus a DEM whose values
/// depend only on each pixel's class
pub fn class_archive(classes: &Array2<ClassCode>, cloud_probability: f32) -> InMemoryArchive {
    let (rows, cols) = classes.dim();
    let target = grid(rows, cols);
    let mut archive = InMemoryArchive::new();

    let optical: Vec<Band> = OPTICAL_BANDS
        .iter()
        .enumerate()
        .map(|(k, name)| Band::new(*name, per_pixel(classes, |c| optical_dn(c, k))))
        .collect();
    archive.add_scene(
        Sensor::OpticalReflectance,
        RasterTile::from_bands(&target, optical)
            .unwrap()
            .with_metadata(metadata("S2_0712", 12, None)),
    );
    archive.add_scene(
        Sensor::CloudProbability,
        RasterTile::from_bands(
            &target,
            vec![Band::new("probability", Array2::from_elem((rows, cols), cloud_probability))],
        )
        .unwrap()
        .with_metadata(metadata("S2_0712", 12, None)),
    );

    let radar = RadarMetadata {
        acquisition_mode: AcquisitionMode::IW,
        orbit_pass: OrbitPass::Descending,
        polarizations: vec![Polarization::VV, Polarization::VH],
    };
    archive.add_scene(
        Sensor::RadarBackscatter,
        RasterTile::from_bands(
            &target,
            vec![
                Band::new("VV", per_pixel(classes, |c| -8.0 - 3.0 * c as f32)),
                Band::new("VH", per_pixel(classes, |c| -14.0 - 3.0 * c as f32)),
            ],
        )
        .unwrap()
        .with_metadata(metadata("S1_0715", 15, Some(radar))),
    );

    archive.add_elevation(
        RasterTile::from_bands(
            &target,
            vec![Band::new("DEM", per_pixel(classes, |c| 3100.0 + 350.0 * c as f32))],
        )
        .unwrap(),
    );
    archive
}

/// Point label at the centre of pixel (row, col)
pub fn point_label(target: &TargetGrid, row: usize, col: usize, class_code: ClassCode) -> SampleLabel {
    let (x, y) = target.geo_transform.pixel_center(row, col);
    SampleLabel {
        geometry: Geometry::Point(Point::new(x, y)),
        class_code,
        class_name: format!("class_{}", class_code),
    }
}
