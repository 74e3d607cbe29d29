//! Builds all buckets of one tile.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    bucket::{
        Bucket, BucketParameters, CircleBucket, FillBucket, FillExtrusionBucket, ImagePositions,
        IndexedFeature, LineBucket, PopulateParameters, TileBucket,
    },
    coords::OverscaledTileId,
    error::BucketError,
    segment::MAX_VERTEX_ARRAY_LENGTH,
    style::{granularity::SubdivisionGranularitySetting, LayerProperties, StyleLayer},
    vector_tile::{decode_tile, VectorTileData},
};

mod transferables;

pub use transferables::{Context, Message, WorkerError};

/// The finished buckets of a tile. Ownership moves to whoever receives it.
#[derive(Serialize, Deserialize, Debug)]
pub struct TileBuckets {
    pub tile_id: OverscaledTileId,
    pub buckets: Vec<TileBucket>,
    /// Images which patterned layers asked for
    pub pattern_dependencies: BTreeSet<String>,
}

impl TileBuckets {
    pub fn bucket(&self, layer_id: &str) -> Option<&TileBucket> {
        self.buckets
            .iter()
            .find(|bucket| bucket.layer_ids().iter().any(|id| id == layer_id))
    }
}

pub struct WorkerTile {
    pub tile_id: OverscaledTileId,
    pub subdivision_granularity: SubdivisionGranularitySetting,
    pub max_vertex_array_length: usize,
}

impl WorkerTile {
    pub fn new(tile_id: OverscaledTileId) -> Self {
        Self {
            tile_id,
            subdivision_granularity: SubdivisionGranularitySetting::none(),
            max_vertex_array_length: MAX_VERTEX_ARRAY_LENGTH,
        }
    }

    pub fn with_subdivision_granularity(mut self, setting: SubdivisionGranularitySetting) -> Self {
        self.subdivision_granularity = setting;
        self
    }

    /// Creates one bucket per group of layers with the same layout and fills it with the
    /// features of the source layer. Empty buckets are dropped.
    pub fn parse(
        &self,
        data: &VectorTileData,
        layers: &[StyleLayer],
        image_positions: &ImagePositions,
    ) -> Result<TileBuckets, BucketError> {
        let canonical = &self.tile_id.canonical;
        let zoom = u8::from(self.tile_id.overscaled_z);

        let mut options = PopulateParameters {
            subdivision_granularity: self.subdivision_granularity.clone(),
            ..PopulateParameters::default()
        };

        let mut source_layers: HashMap<&str, Vec<IndexedFeature>> = HashMap::new();
        let mut buckets = Vec::new();

        for group in group_by_layout(layers) {
            let Some(first) = group.first() else {
                continue;
            };

            if matches!(first.properties, LayerProperties::Unsupported)
                || !first.is_visible_at(zoom as f64)
            {
                continue;
            }

            let Some(source_layer) = first.source_layer.as_deref() else {
                log::debug!("layer {} has no source layer", first.id);
                continue;
            };

            if !source_layers.contains_key(source_layer) {
                let Some(index) = data
                    .layers
                    .iter()
                    .position(|layer| layer.name == source_layer)
                else {
                    log::debug!(
                        "source layer {source_layer} of layer {} not found in {}",
                        first.id,
                        self.tile_id
                    );
                    continue;
                };

                let features = data.layers[index]
                    .features
                    .iter()
                    .enumerate()
                    .map(|(i, feature)| IndexedFeature {
                        feature: feature.clone(),
                        index: i,
                        source_layer_index: index,
                    })
                    .collect();
                source_layers.insert(source_layer, features);
            }
            let features = &source_layers[source_layer];

            let parameters = BucketParameters {
                index: buckets.len(),
                layers: group.iter().map(|layer| (*layer).clone()).collect(),
                zoom,
                overscaling: self.tile_id.overscale_factor(),
                max_vertex_array_length: self.max_vertex_array_length,
            };

            let mut bucket = match first.properties {
                LayerProperties::Circle { .. } | LayerProperties::Heatmap {} => {
                    TileBucket::Circle(CircleBucket::new(&parameters))
                }
                LayerProperties::Fill { .. } => TileBucket::Fill(FillBucket::new(&parameters)),
                LayerProperties::FillExtrusion { .. } => {
                    TileBucket::FillExtrusion(FillExtrusionBucket::new(&parameters))
                }
                LayerProperties::Line { .. } => TileBucket::Line(LineBucket::new(&parameters)),
                LayerProperties::Unsupported => continue,
            };

            bucket.populate(features, &mut options, canonical)?;
            buckets.push(bucket);
        }

        // Patterned features are added once every bucket registered its images
        for bucket in &mut buckets {
            bucket.add_features(&options, canonical, image_positions)?;
        }

        buckets.retain(|bucket| !bucket.is_empty());

        log::info!("built {} buckets for tile {}", buckets.len(), self.tile_id);

        Ok(TileBuckets {
            tile_id: self.tile_id,
            buckets,
            pattern_dependencies: options.pattern_dependencies,
        })
    }
}

/// Groups layers which can share a bucket: same type, same source layer, same layout and same
/// zoom range. Groups keep the order of their first layer.
pub fn group_by_layout(layers: &[StyleLayer]) -> Vec<Vec<&StyleLayer>> {
    let mut groups: Vec<Vec<&StyleLayer>> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for layer in layers {
        let key = layout_key(layer);
        match group_index.get(&key) {
            Some(index) => groups[*index].push(layer),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![layer]);
            }
        }
    }

    groups
}

fn layout_key(layer: &StyleLayer) -> String {
    let properties = match &layer.properties {
        // Paint properties of patterned layers differ per layer
        LayerProperties::Fill { layout, .. } => serde_json::to_string(layout),
        LayerProperties::Line { layout, .. } => serde_json::to_string(layout),
        LayerProperties::Circle { layout, paint } => serde_json::to_string(&(layout, paint)),
        other => serde_json::to_string(other.type_name()),
    }
    .unwrap_or_else(|_| layer.id.clone());

    format!(
        "{}/{:?}/{:?}/{:?}/{}",
        layer.properties.type_name(),
        layer.source_layer,
        layer.minzoom,
        layer.maxzoom,
        properties
    )
}

/// Decodes `data`, builds its buckets and sends the result through `context`. Failures of the
/// build are reported as [`Message::TileFailed`].
pub fn process_vector_tile<C: Context>(
    data: &[u8],
    worker: &WorkerTile,
    layers: &[StyleLayer],
    image_positions: &ImagePositions,
    context: &C,
) -> Result<(), WorkerError> {
    let result = decode_tile(data).and_then(|tile| worker.parse(&tile, layers, image_positions));

    match result {
        Ok(tile_buckets) => context.send(Message::TileBuilt(tile_buckets)),
        Err(error) => {
            log::warn!("building tile {} failed: {error}", worker.tile_id);
            context.send(Message::TileFailed {
                tile_id: worker.tile_id,
                error: error.to_string(),
            })
        }
    }
}
