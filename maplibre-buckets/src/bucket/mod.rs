//! Buckets collect the tessellated geometry of one or more style layers within a tile.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    coords::CanonicalTileId,
    error::BucketError,
    geometry::{load_geometry, FeatureType, GeometryCollection, PropertyMap, VectorTileFeature},
    segment::{SegmentVector, MAX_VERTEX_ARRAY_LENGTH},
    struct_array::StructArrayMember,
    style::{granularity::SubdivisionGranularitySetting, PropertyValue, StyleLayer},
};

mod circle_bucket;
mod fill_bucket;
mod fill_extrusion_bucket;
mod line_bucket;
mod pattern;

pub use circle_bucket::CircleBucket;
pub use fill_bucket::FillBucket;
pub use fill_extrusion_bucket::FillExtrusionBucket;
pub use line_bucket::{LineBucket, LineClips};

/// Position of an image within the image atlas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ImagePosition {
    pub pixel_ratio: f64,
    /// Top left corner of the image without padding
    pub tl: [u16; 2],
    /// Bottom right corner of the image without padding
    pub br: [u16; 2],
}

pub type ImagePositions = HashMap<String, ImagePosition>;

/// Describes which bucket is created for which layers.
#[derive(Debug, Clone)]
pub struct BucketParameters {
    /// Index of the bucket within the tile
    pub index: usize,
    /// Layers which share this bucket. The first layer decides the layout.
    pub layers: Vec<StyleLayer>,
    pub zoom: u8,
    pub overscaling: u32,
    /// Vertex limit of every segment the bucket creates
    pub max_vertex_array_length: usize,
}

impl BucketParameters {
    pub fn new(layers: Vec<StyleLayer>, zoom: u8) -> Self {
        Self {
            index: 0,
            layers,
            zoom,
            overscaling: 1,
            max_vertex_array_length: MAX_VERTEX_ARRAY_LENGTH,
        }
    }

    pub(crate) fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    pub(crate) fn segment_vector(&self) -> SegmentVector {
        SegmentVector::with_max_vertex_array_length(self.max_vertex_array_length)
    }
}

/// Options which are shared by every bucket of a tile while it is populated.
#[derive(Debug, Clone, Default)]
pub struct PopulateParameters {
    /// Names of the images which patterned buckets need before [`Bucket::add_features`]
    pub pattern_dependencies: BTreeSet<String>,
    pub subdivision_granularity: SubdivisionGranularitySetting,
}

/// A feature of a source layer together with its position in that layer.
#[derive(Debug, Clone)]
pub struct IndexedFeature {
    pub feature: VectorTileFeature,
    pub index: usize,
    pub source_layer_index: usize,
}

impl IndexedFeature {
    pub fn new(feature: VectorTileFeature, index: usize) -> Self {
        Self {
            feature,
            index,
            source_layer_index: 0,
        }
    }
}

/// A feature with its geometry scaled to tile space, ready to be tessellated.
#[derive(Debug, Clone)]
pub struct BucketFeature {
    pub id: Option<u64>,
    pub index: usize,
    pub source_layer_index: usize,
    pub feature_type: FeatureType,
    pub properties: PropertyMap,
    pub geometry: GeometryCollection,
    /// Pattern image per layer id
    pub patterns: HashMap<String, String>,
    pub sort_key: Option<f64>,
}

/// Receives finished buffers. Implemented by the upload stage.
pub trait UploadContext {
    fn create_vertex_buffer(&mut self, members: &'static [StructArrayMember], bytes: &[u8]);
    fn create_index_buffer(&mut self, bytes: &[u8]);
}

pub trait Bucket {
    /// Ids of all layers drawn from this bucket.
    fn layer_ids(&self) -> &[String];

    /// Tessellates `features`. Features which need images are kept until
    /// [`Bucket::add_features`] is called.
    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: &CanonicalTileId,
    ) -> Result<(), BucketError>;

    /// Tessellates the features which waited for images.
    fn add_features(
        &mut self,
        _options: &PopulateParameters,
        _canonical: &CanonicalTileId,
        _image_positions: &ImagePositions,
    ) -> Result<(), BucketError> {
        Ok(())
    }

    fn is_empty(&self) -> bool;

    fn upload_pending(&self) -> bool;

    fn upload(&mut self, context: &mut dyn UploadContext);
}

/// All bucket kinds. This is what gets transferred once a tile is built.
#[derive(Serialize, Deserialize, Debug)]
pub enum TileBucket {
    Circle(CircleBucket),
    Fill(FillBucket),
    FillExtrusion(FillExtrusionBucket),
    Line(LineBucket),
}

impl TileBucket {
    pub fn as_bucket(&self) -> &dyn Bucket {
        match self {
            TileBucket::Circle(bucket) => bucket,
            TileBucket::Fill(bucket) => bucket,
            TileBucket::FillExtrusion(bucket) => bucket,
            TileBucket::Line(bucket) => bucket,
        }
    }

    pub fn as_bucket_mut(&mut self) -> &mut dyn Bucket {
        match self {
            TileBucket::Circle(bucket) => bucket,
            TileBucket::Fill(bucket) => bucket,
            TileBucket::FillExtrusion(bucket) => bucket,
            TileBucket::Line(bucket) => bucket,
        }
    }
}

impl Bucket for TileBucket {
    fn layer_ids(&self) -> &[String] {
        self.as_bucket().layer_ids()
    }

    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: &CanonicalTileId,
    ) -> Result<(), BucketError> {
        self.as_bucket_mut().populate(features, options, canonical)
    }

    fn add_features(
        &mut self,
        options: &PopulateParameters,
        canonical: &CanonicalTileId,
        image_positions: &ImagePositions,
    ) -> Result<(), BucketError> {
        self.as_bucket_mut()
            .add_features(options, canonical, image_positions)
    }

    fn is_empty(&self) -> bool {
        self.as_bucket().is_empty()
    }

    fn upload_pending(&self) -> bool {
        self.as_bucket().upload_pending()
    }

    fn upload(&mut self, context: &mut dyn UploadContext) {
        self.as_bucket_mut().upload(context)
    }
}

/// Loads the geometry of `features` and evaluates their sort key. Features are ordered by the
/// sort key unless it is constant.
pub(crate) fn bucket_features(
    features: &[IndexedFeature],
    sort_key: Option<&PropertyValue<f64>>,
) -> Vec<BucketFeature> {
    let sort_features_by_key = sort_key.map_or(false, |sort_key| !sort_key.is_constant());

    let mut bucket_features: Vec<BucketFeature> = features
        .iter()
        .map(|indexed| {
            let feature = &indexed.feature;
            BucketFeature {
                id: feature.id,
                index: indexed.index,
                source_layer_index: indexed.source_layer_index,
                feature_type: feature.feature_type,
                properties: feature.properties.clone(),
                geometry: load_geometry(feature),
                patterns: HashMap::new(),
                sort_key: sort_key
                    .filter(|_| sort_features_by_key)
                    .and_then(|sort_key| sort_key.evaluate(&feature.properties)),
            }
        })
        .collect();

    if sort_features_by_key {
        bucket_features.sort_by(|a, b| {
            a.sort_key
                .unwrap_or_default()
                .total_cmp(&b.sort_key.unwrap_or_default())
        });
    }

    bucket_features
}

/// Fails for feature types which the layer can not draw.
pub(crate) fn check_geometry(
    feature: &BucketFeature,
    layer: &StyleLayer,
    supported: &[FeatureType],
) -> Result<(), BucketError> {
    if supported.contains(&feature.feature_type) {
        Ok(())
    } else {
        Err(BucketError::UnsupportedGeometry {
            layer_id: layer.id.clone(),
            layer_type: layer.properties.type_name(),
            feature_type: feature.feature_type,
            index: feature.index,
        })
    }
}
