use serde::{Deserialize, Serialize};

use crate::{
    bucket::{
        bucket_features, Bucket, BucketFeature, BucketParameters, IndexedFeature,
        PopulateParameters, UploadContext,
    },
    coords::{CanonicalTileId, EXTENT},
    error::BucketError,
    segment::SegmentVector,
    struct_array::{CircleLayoutArray, TriangleIndexArray},
    style::{LayerProperties, PitchAlignment, StyleLayer},
};

/// Positions of the vertices along one axis of a circle quad, per granularity. A vertex stores
/// the circle center, so only 3 bits are left for its position within the quad.
fn extrudes(granularity: u32) -> Result<&'static [i32], BucketError> {
    match granularity {
        1 => Ok(&[0, 7]),
        3 => Ok(&[0, 2, 5, 7]),
        5 => Ok(&[0, 1, 3, 4, 6, 7]),
        7 => Ok(&[0, 1, 2, 3, 4, 5, 6, 7]),
        _ => Err(BucketError::InvalidCircleGranularity(granularity)),
    }
}

fn add_circle_vertex(
    layout_vertex_array: &mut CircleLayoutArray,
    x: i32,
    y: i32,
    extrude_x: i32,
    extrude_y: i32,
) {
    layout_vertex_array.emplace_back(
        (i16::MIN as i32 + x * 8 + extrude_x) as i16,
        (i16::MIN as i32 + y * 8 + extrude_y) as i16,
    );
}

/// Circles of circle and heatmap layers. Every point becomes a quad, which is tessellated into
/// a grid if it has to follow the curvature of the map.
#[derive(Serialize, Deserialize, Debug)]
pub struct CircleBucket {
    pub index: usize,
    pub zoom: u8,
    pub layer_ids: Vec<String>,
    #[serde(skip)]
    layers: Vec<StyleLayer>,

    pub layout_vertex_array: CircleLayoutArray,
    pub index_array: TriangleIndexArray,
    pub segments: SegmentVector,

    #[serde(skip)]
    uploaded: bool,
}

impl CircleBucket {
    pub fn new(parameters: &BucketParameters) -> Self {
        Self {
            index: parameters.index,
            zoom: parameters.zoom,
            layer_ids: parameters.layer_ids(),
            layers: parameters.layers.clone(),
            layout_vertex_array: CircleLayoutArray::new(),
            index_array: TriangleIndexArray::new(),
            segments: parameters.segment_vector(),
            uploaded: false,
        }
    }

    /// Tessellates every point of `feature` which lies within the tile.
    pub fn add_feature(
        &mut self,
        feature: &BucketFeature,
        granularity: u32,
    ) -> Result<(), BucketError> {
        let extrudes = extrudes(granularity)?;
        let vertices_per_axis = extrudes.len();
        let vertex_count = vertices_per_axis * vertices_per_axis;

        for ring in &feature.geometry {
            for point in ring.iter() {
                if point.x < 0 || point.x >= EXTENT || point.y < 0 || point.y >= EXTENT {
                    continue;
                }

                let segment = self.segments.prepare_segment(
                    vertex_count,
                    &self.layout_vertex_array,
                    &self.index_array,
                    feature.sort_key,
                );
                let index = segment.vertex_length;

                for extrude_y in extrudes {
                    for extrude_x in extrudes {
                        add_circle_vertex(
                            &mut self.layout_vertex_array,
                            point.x,
                            point.y,
                            *extrude_x,
                            *extrude_y,
                        );
                    }
                }

                for y in 0..vertices_per_axis - 1 {
                    for x in 0..vertices_per_axis - 1 {
                        let lower_index = index + y * vertices_per_axis + x;
                        let upper_index = index + (y + 1) * vertices_per_axis + x;
                        self.index_array.emplace_back(
                            lower_index as u16,
                            (upper_index + 1) as u16,
                            (lower_index + 1) as u16,
                        );
                        self.index_array.emplace_back(
                            lower_index as u16,
                            upper_index as u16,
                            (upper_index + 1) as u16,
                        );
                    }
                }

                segment.vertex_length += vertex_count;
                segment.primitive_length += (vertices_per_axis - 1) * (vertices_per_axis - 1) * 2;
            }
        }

        Ok(())
    }
}

impl Bucket for CircleBucket {
    fn layer_ids(&self) -> &[String] {
        &self.layer_ids
    }

    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: &CanonicalTileId,
    ) -> Result<(), BucketError> {
        let (sort_key, subdivide) = match self.layers.first().map(|layer| &layer.properties) {
            Some(LayerProperties::Circle { layout, paint }) => (
                layout.circle_sort_key.as_ref(),
                paint.circle_pitch_alignment == PitchAlignment::Map,
            ),
            // Heatmap circles are usually large, so they always follow the curvature
            Some(LayerProperties::Heatmap {}) => (None, true),
            _ => (None, false),
        };

        let granularity = if subdivide {
            options
                .subdivision_granularity
                .circle
                .get_granularity_for_zoom_level(canonical.z.into())
        } else {
            1
        };

        for feature in bucket_features(features, sort_key) {
            self.add_feature(&feature, granularity)?;
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
                CircleLayoutArray::members(),
                self.layout_vertex_array.as_bytes(),
            );
            context.create_index_buffer(self.index_array.as_bytes());
        }
        self.uploaded = true;
    }
}
