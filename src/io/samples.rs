//! Ground-truth sample labels from GeoJSON
//!
//! Each feature carries its class code in a numeric property (by default
//! `landcover`) and optionally a human-readable `name`.

use crate::types::{ClassCode, LandcoverError, LandcoverResult, SampleLabel};
use geojson::{Feature, GeoJson};
use std::path::Path;

/// Read sample labels from a GeoJSON file
pub fn read_sample_labels<P: AsRef<Path>>(path: P, class_property: &str) -> LandcoverResult<Vec<SampleLabel>> {
    log::info!("Reading sample labels from: {}", path.as_ref().display());
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_sample_labels(&text, class_property)
}

/// Parse sample labels from a GeoJSON Feature or FeatureCollection
pub fn parse_sample_labels(text: &str, class_property: &str) -> LandcoverResult<Vec<SampleLabel>> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(LandcoverError::InvalidParameter(
                "sample labels must be GeoJSON features carrying a class property".to_string(),
            ))
        }
    };

    let labels = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| feature_to_label(index, feature, class_property))
        .collect::<LandcoverResult<Vec<_>>>()?;

    log::debug!("Parsed {} sample labels", labels.len());
    Ok(labels)
}

fn feature_to_label(index: usize, feature: Feature, class_property: &str) -> LandcoverResult<SampleLabel> {
    let class_code = feature
        .property(class_property)
        .and_then(|v| v.as_u64())
        .and_then(|v| ClassCode::try_from(v).ok())
        .ok_or_else(|| {
            LandcoverError::InvalidParameter(format!(
                "feature {} has no non-negative integer '{}' property",
                index, class_property
            ))
        })?;

    let class_name = feature
        .property("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("class_{}", class_code));

    let geometry = feature.geometry.ok_or_else(|| {
        LandcoverError::InvalidParameter(format!("feature {} has no geometry", index))
    })?;
    let geometry = geo::Geometry::<f64>::try_from(geometry)?;

    Ok(SampleLabel {
        geometry,
        class_code,
        class_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"landcover": 4, "name": "Lake"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 20.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"landcover": 12},
                "geometry": {"type": "Point", "coordinates": [5.0, 5.0]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let labels = parse_sample_labels(LABELS, "landcover").unwrap();
        assert_eq!(labels.len(), 2);

        assert_eq!(labels[0].class_code, 4);
        assert_eq!(labels[0].class_name, "Lake");
        assert!(matches!(labels[0].geometry, geo::Geometry::Polygon(_)));

        assert_eq!(labels[1].class_code, 12);
        assert_eq!(labels[1].class_name, "class_12");
        assert!(matches!(labels[1].geometry, geo::Geometry::Point(_)));
    }

    #[test]
    fn test_missing_class_property() {
        let result = parse_sample_labels(LABELS, "class");
        assert!(matches!(result, Err(LandcoverError::InvalidParameter(_))));
    }

    #[test]
    fn test_bare_geometry_rejected() {
        let result = parse_sample_labels(r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#, "landcover");
        assert!(result.is_err());
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.geojson");
        std::fs::write(&path, LABELS).unwrap();

        let labels = read_sample_labels(&path, "landcover").unwrap();
        assert_eq!(labels.len(), 2);
    }
}
