use serde::{Deserialize, Serialize};

use crate::{
    bucket::{
        bucket_features, check_geometry,
        pattern::{add_pattern_dependencies, has_pattern, log_missing_images},
        Bucket, BucketFeature, BucketParameters, ImagePositions, IndexedFeature,
        PopulateParameters, UploadContext,
    },
    coords::CanonicalTileId,
    error::BucketError,
    geometry::{FeatureType, GeometryCoordinates},
    segment::SegmentVector,
    struct_array::{FillLayoutArray, LineIndexArray, TriangleIndexArray},
    style::{LayerProperties, StyleLayer},
    tessellation::{
        classify_rings::classify_rings,
        fill_large_mesh_arrays::{fill_large_mesh_arrays, LineListMesh},
        subdivision::subdivide_fill,
        EARCUT_MAX_RINGS,
    },
};

/// Polygons of fill layers. Triangles and outlines share the vertex buffer but have their own
/// index buffers and segments.
#[derive(Serialize, Deserialize, Debug)]
pub struct FillBucket {
    pub index: usize,
    pub zoom: u8,
    pub layer_ids: Vec<String>,
    #[serde(skip)]
    layers: Vec<StyleLayer>,
    pub has_pattern: bool,
    /// Features which are tessellated once their pattern images are known
    #[serde(skip)]
    pattern_features: Vec<BucketFeature>,

    pub layout_vertex_array: FillLayoutArray,
    pub index_array: TriangleIndexArray,
    pub index_array2: LineIndexArray,
    pub segments: SegmentVector,
    pub segments2: SegmentVector,

    #[serde(skip)]
    uploaded: bool,
}

impl FillBucket {
    pub fn new(parameters: &BucketParameters) -> Self {
        Self {
            index: parameters.index,
            zoom: parameters.zoom,
            layer_ids: parameters.layer_ids(),
            layers: parameters.layers.clone(),
            has_pattern: false,
            pattern_features: Vec::new(),
            layout_vertex_array: FillLayoutArray::new(),
            index_array: TriangleIndexArray::new(),
            index_array2: LineIndexArray::new(),
            segments: parameters.segment_vector(),
            segments2: parameters.segment_vector(),
            uploaded: false,
        }
    }

    /// Tessellates every polygon of `feature`, including its outlines.
    pub fn add_feature(
        &mut self,
        feature: &BucketFeature,
        canonical: &CanonicalTileId,
        options: &PopulateParameters,
    ) -> Result<(), BucketError> {
        if let Some(layer) = self.layers.first() {
            check_geometry(feature, layer, &[FeatureType::Polygon])?;
        }

        let granularity = options
            .subdivision_granularity
            .fill
            .get_granularity_for_zoom_level(canonical.z.into());

        for polygon in classify_rings(&feature.geometry, Some(EARCUT_MAX_RINGS)) {
            let rings: Vec<GeometryCoordinates> =
                polygon.into_iter().map(|classified| classified.ring).collect();
            let subdivided = subdivide_fill(&rings, granularity, true);

            fill_large_mesh_arrays(
                |array: &mut FillLayoutArray, x, y| {
                    array.emplace_back(x as i16, y as i16);
                },
                &mut self.segments,
                &mut self.layout_vertex_array,
                &mut self.index_array,
                &subdivided.vertices_flattened,
                &subdivided.indices_triangles,
                Some(LineListMesh {
                    segments: &mut self.segments2,
                    index_array: &mut self.index_array2,
                    line_list: &subdivided.indices_line_list,
                }),
            );
        }

        Ok(())
    }
}

impl Bucket for FillBucket {
    fn layer_ids(&self) -> &[String] {
        &self.layer_ids
    }

    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: &CanonicalTileId,
    ) -> Result<(), BucketError> {
        self.has_pattern = has_pattern(&self.layers, options);

        let sort_key = match self.layers.first().map(|layer| &layer.properties) {
            Some(LayerProperties::Fill { layout, .. }) => layout.fill_sort_key.as_ref(),
            _ => None,
        };

        for feature in bucket_features(features, sort_key) {
            if self.has_pattern {
                let feature = add_pattern_dependencies(&self.layers, feature, options);
                self.pattern_features.push(feature);
            } else {
                self.add_feature(&feature, canonical, options)?;
            }
        }

        Ok(())
    }

    fn add_features(
        &mut self,
        options: &PopulateParameters,
        canonical: &CanonicalTileId,
        image_positions: &ImagePositions,
    ) -> Result<(), BucketError> {
        for feature in std::mem::take(&mut self.pattern_features) {
            log_missing_images(&feature, image_positions);
            self.add_feature(&feature, canonical, options)?;
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.layout_vertex_array.is_empty()
    }

    fn upload_pending(&self) -> bool {
        !self.uploaded
    }

    fn upload(&mut self, context: &mut dyn UploadContext) {
        if !self.uploaded {
            context.create_vertex_buffer(
                FillLayoutArray::members(),
                self.layout_vertex_array.as_bytes(),
            );
            context.create_index_buffer(self.index_array.as_bytes());
            context.create_index_buffer(self.index_array2.as_bytes());
        }
        self.uploaded = true;
    }
}
