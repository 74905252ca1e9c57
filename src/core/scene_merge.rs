use crate::raster::{RasterCollection, RasterTile};
use crate::types::{LandcoverError, LandcoverResult, SceneId};
use std::collections::{BTreeMap, BTreeSet};

/// Result of joining two collections on their scene identifiers
#[derive(Debug, Clone)]
pub struct SceneJoin {
    /// One band-concatenated tile per identifier present in both inputs
    pub merged: RasterCollection,
    /// Identifiers only present in the primary collection
    pub unmatched_primary: Vec<SceneId>,
    /// Identifiers only present in the secondary collection
    pub unmatched_secondary: Vec<SceneId>,
}

/// Inner join of co-registered products by scene identifier
pub struct SceneMerger;

impl SceneMerger {
    /// Pair every primary tile with the secondary tile sharing its scene id
    /// and concatenate their bands, primary bands first.
    ///
    /// Output order follows the primary collection. Tiles without an id
    /// cannot be matched and are skipped with a warning.
    pub fn merge(primary: &RasterCollection, secondary: &RasterCollection) -> LandcoverResult<SceneJoin> {
        log::info!(
            "Joining {} primary and {} secondary scenes by scene id",
            primary.len(),
            secondary.len()
        );

        let secondary_index = Self::index_by_id(secondary)?;
        // Validates uniqueness on the primary side as well
        let primary_index = Self::index_by_id(primary)?;

        let mut merged = RasterCollection::default();
        let mut unmatched_primary = Vec::new();

        for tile in primary.iter() {
            let Some(id) = tile.metadata.scene_id.as_ref() else {
                continue;
            };
            match secondary_index.get(id) {
                Some(partner) => merged.push(tile.add_bands(partner)?),
                None => unmatched_primary.push(id.clone()),
            }
        }

        let primary_ids: BTreeSet<&SceneId> = primary_index.keys().copied().collect();
        let unmatched_secondary: Vec<SceneId> = secondary_index
            .keys()
            .filter(|id| !primary_ids.contains(*id))
            .map(|id| (*id).clone())
            .collect();

        if !unmatched_primary.is_empty() || !unmatched_secondary.is_empty() {
            log::warn!(
                "Dropped {} primary and {} secondary scenes without a partner",
                unmatched_primary.len(),
                unmatched_secondary.len()
            );
        }
        if merged.is_empty() && !(primary.is_empty() && secondary.is_empty()) {
            log::warn!(
                "{} primary and {} secondary scenes share no identifier",
                primary.len(),
                secondary.len()
            );
        }

        log::info!("Scene join produced {} merged scenes", merged.len());
        Ok(SceneJoin {
            merged,
            unmatched_primary,
            unmatched_secondary,
        })
    }

    fn index_by_id(collection: &RasterCollection) -> LandcoverResult<BTreeMap<&SceneId, &RasterTile>> {
        let mut index = BTreeMap::new();
        let mut anonymous = 0usize;
        for tile in collection.iter() {
            match tile.metadata.scene_id.as_ref() {
                Some(id) => {
                    if index.insert(id, tile).is_some() {
                        return Err(LandcoverError::AmbiguousJoin(id.to_string()));
                    }
                }
                None => anonymous += 1,
            }
        }
        if anonymous > 0 {
            log::warn!("{} scenes carry no scene id and cannot be joined", anonymous);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::constant_tile;
    use crate::types::SceneMetadata;

    fn scene(id: &str, bands: &[(&str, f32)]) -> RasterTile {
        constant_tile(2, 2, bands).with_metadata(SceneMetadata {
            scene_id: Some(SceneId::new(id)),
            ..Default::default()
        })
    }

    #[test]
    fn test_inner_join_band_counts() {
        let optical = RasterCollection::new(vec![
            scene("20240702T041709", &[("B2", 0.1), ("B3", 0.2), ("B4", 0.3)]),
            scene("20240707T041711", &[("B2", 0.1), ("B3", 0.2), ("B4", 0.3)]),
            scene("20240712T041709", &[("B2", 0.1), ("B3", 0.2), ("B4", 0.3)]),
        ]);
        let clouds = RasterCollection::new(vec![
            scene("20240712T041709", &[("probability", 5.0)]),
            scene("20240702T041709", &[("probability", 60.0)]),
            scene("20240801T041709", &[("probability", 0.0)]),
        ]);

        let join = SceneMerger::merge(&optical, &clouds).unwrap();

        assert_eq!(join.merged.len(), 2);
        for tile in join.merged.iter() {
            assert_eq!(tile.band_count(), 4);
        }
        let ids: Vec<_> = join
            .merged
            .iter()
            .map(|t| t.metadata.scene_id.clone().unwrap().0)
            .collect();
        assert_eq!(ids, vec!["20240702T041709", "20240712T041709"]);
        assert_eq!(join.unmatched_primary, vec![SceneId::new("20240707T041711")]);
        assert_eq!(join.unmatched_secondary, vec![SceneId::new("20240801T041709")]);

        let first = &join.merged.tiles()[0];
        assert_eq!(first.band_names(), vec!["B2", "B3", "B4", "probability"]);
        assert_eq!(first.band("probability").unwrap().get(0, 0), Some(60.0));
    }

    #[test]
    fn test_disjoint_ids_give_empty_collection() {
        let optical = RasterCollection::new(vec![scene("a", &[("B2", 0.1)])]);
        let clouds = RasterCollection::new(vec![scene("b", &[("probability", 0.0)])]);

        let join = SceneMerger::merge(&optical, &clouds).unwrap();
        assert!(join.merged.is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_ambiguous() {
        let optical = RasterCollection::new(vec![scene("a", &[("B2", 0.1)])]);
        let clouds = RasterCollection::new(vec![
            scene("a", &[("probability", 0.0)]),
            scene("a", &[("probability", 50.0)]),
        ]);

        let result = SceneMerger::merge(&optical, &clouds);
        assert!(matches!(result, Err(LandcoverError::AmbiguousJoin(id)) if id == "a"));
    }
}
