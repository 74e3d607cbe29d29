use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    bucket::{
        bucket_features, check_geometry,
        pattern::{add_pattern_dependencies, has_pattern, log_missing_images},
        Bucket, BucketFeature, BucketParameters, ImagePositions, IndexedFeature,
        PopulateParameters, UploadContext,
    },
    coords::{CanonicalTileId, EXTENT},
    error::BucketError,
    geometry::{FeatureType, GeometryCoordinate, GeometryCoordinates},
    segment::SegmentVector,
    struct_array::{FillExtrusionLayoutArray, PosArray, TriangleIndexArray},
    style::StyleLayer,
    tessellation::{
        classify_rings::{classify_rings, ClassifiedPolygon},
        fill_large_mesh_arrays::fill_large_mesh_arrays,
        subdivision::{subdivide_fill, subdivide_vertex_line},
        EARCUT_MAX_RINGS,
    },
    util::math::{dist, perp, round_half_up, unit},
};

/// Normals are stored as fixed point numbers with 13 fractional bits, doubled to make room for
/// the top flag in the lowest bit of `a_normal_x`.
const FACTOR: f64 = (1 << 13) as f64;

/// Edge distances restart at 0 once they would exceed this.
const MAX_EDGE_DISTANCE: f64 = 32768.0;

#[allow(clippy::too_many_arguments)]
fn add_vertex(
    vertex_array: &mut FillExtrusionLayoutArray,
    x: i32,
    y: i32,
    nx: f64,
    ny: f64,
    nz: f64,
    t: i32,
    e: f64,
) {
    vertex_array.emplace_back(
        x as i16,
        y as i16,
        ((nx * FACTOR).floor() as i32 * 2 + t) as i16,
        (ny * FACTOR * 2.0) as i16,
        (nz * FACTOR * 2.0) as i16,
        round_half_up(e) as i16,
    );
}

/// Edges along the tile border are drawn by the neighbouring tile.
fn is_boundary_edge(p1: &GeometryCoordinate, p2: &GeometryCoordinate) -> bool {
    (p1.x == p2.x && (p1.x <= 0 || p1.x >= EXTENT))
        || (p1.y == p2.y && (p1.y <= 0 || p1.y >= EXTENT))
}

fn is_entirely_outside(ring: &[GeometryCoordinate]) -> bool {
    ring.iter().all(|p| p.x < 0)
        || ring.iter().all(|p| p.x > EXTENT)
        || ring.iter().all(|p| p.y < 0)
        || ring.iter().all(|p| p.y > EXTENT)
}

/// Average of the outer ring, ignoring a closing point.
fn centroid(outer: &[GeometryCoordinate]) -> Option<GeometryCoordinate> {
    let points = match outer {
        [first, .., last] if first == last => &outer[..outer.len() - 1],
        _ => outer,
    };
    if points.is_empty() {
        return None;
    }

    let (sum_x, sum_y) = points.iter().fold((0i64, 0i64), |(x, y), point| {
        (x + point.x as i64, y + point.y as i64)
    });
    let count = points.len() as i64;
    Some(GeometryCoordinate::new(
        sum_x.div_euclid(count) as i32,
        sum_y.div_euclid(count) as i32,
    ))
}

/// Extruded polygons. Every edge becomes a wall quad and polygons get a roof. The centroid of a
/// polygon is stored for each of its vertices so that the height can be sampled once per
/// building.
#[derive(Serialize, Deserialize, Debug)]
pub struct FillExtrusionBucket {
    pub index: usize,
    pub zoom: u8,
    pub layer_ids: Vec<String>,
    #[serde(skip)]
    layers: Vec<StyleLayer>,
    pub has_pattern: bool,
    #[serde(skip)]
    pattern_features: Vec<BucketFeature>,

    pub layout_vertex_array: FillExtrusionLayoutArray,
    pub centroid_vertex_array: PosArray,
    pub index_array: TriangleIndexArray,
    pub segments: SegmentVector,

    #[serde(skip)]
    uploaded: bool,
}

impl FillExtrusionBucket {
    pub fn new(parameters: &BucketParameters) -> Self {
        Self {
            index: parameters.index,
            zoom: parameters.zoom,
            layer_ids: parameters.layer_ids(),
            layers: parameters.layers.clone(),
            has_pattern: false,
            pattern_features: Vec::new(),
            layout_vertex_array: FillExtrusionLayoutArray::new(),
            centroid_vertex_array: PosArray::new(),
            index_array: TriangleIndexArray::new(),
            segments: parameters.segment_vector(),
            uploaded: false,
        }
    }

    pub fn add_feature(
        &mut self,
        feature: &BucketFeature,
        canonical: &CanonicalTileId,
        options: &PopulateParameters,
    ) -> Result<(), BucketError> {
        if let Some(layer) = self.layers.first() {
            check_geometry(
                feature,
                layer,
                &[FeatureType::LineString, FeatureType::Polygon],
            )?;
        }

        let granularity = options
            .subdivision_granularity
            .fill
            .get_granularity_for_zoom_level(canonical.z.into());

        for polygon in classify_rings(&feature.geometry, Some(EARCUT_MAX_RINGS)) {
            let vertices_before = self.layout_vertex_array.len();
            let centroid = polygon.first().and_then(|outer| centroid(outer));

            self.add_walls(
                &polygon,
                granularity,
                feature.feature_type == FeatureType::Polygon,
            );

            // Lines have no area which could be covered by a roof
            if feature.feature_type == FeatureType::Polygon {
                self.add_roof(polygon, granularity);
            }

            if let Some(centroid) = centroid {
                for _ in vertices_before..self.layout_vertex_array.len() {
                    self.centroid_vertex_array
                        .emplace_back(centroid.x as i16, centroid.y as i16);
                }
            }
        }

        Ok(())
    }

    /// Open lines get a wall per edge, rings are closed first.
    fn add_walls(&mut self, polygon: &ClassifiedPolygon, granularity: u32, is_ring: bool) {
        let max_vertex_array_length = self.segments.max_vertex_array_length();
        let mut segment = self.segments.prepare_segment(
            4,
            &self.layout_vertex_array,
            &self.index_array,
            None,
        );

        for ring in polygon {
            if ring.is_empty() || is_entirely_outside(ring) {
                continue;
            }

            let subdivided = subdivide_vertex_line(ring, granularity, is_ring);
            let mut edge_distance = 0.0;

            for edge in subdivided.windows(2) {
                let (p2, p1) = (edge[0], edge[1]);
                if is_boundary_edge(&p1, &p2) {
                    continue;
                }

                if segment.vertex_length + 4 > max_vertex_array_length {
                    segment = self.segments.prepare_segment(
                        4,
                        &self.layout_vertex_array,
                        &self.index_array,
                        None,
                    );
                }

                let normal = unit(perp(Vector2::new(
                    (p1.x - p2.x) as f64,
                    (p1.y - p2.y) as f64,
                )));
                let distance = dist(&p2, &p1);
                if edge_distance + distance > MAX_EDGE_DISTANCE {
                    edge_distance = 0.0;
                }

                let array = &mut self.layout_vertex_array;
                add_vertex(array, p1.x, p1.y, normal.x, normal.y, 0.0, 0, edge_distance);
                add_vertex(array, p1.x, p1.y, normal.x, normal.y, 0.0, 1, edge_distance);
                edge_distance += distance;
                add_vertex(array, p2.x, p2.y, normal.x, normal.y, 0.0, 0, edge_distance);
                add_vertex(array, p2.x, p2.y, normal.x, normal.y, 0.0, 1, edge_distance);

                // 0 1
                // 2 3, counter clockwise
                let bottom_right = segment.vertex_length;
                self.index_array.emplace_back(
                    bottom_right as u16,
                    (bottom_right + 2) as u16,
                    (bottom_right + 1) as u16,
                );
                self.index_array.emplace_back(
                    (bottom_right + 1) as u16,
                    (bottom_right + 2) as u16,
                    (bottom_right + 3) as u16,
                );

                segment.vertex_length += 4;
                segment.primitive_length += 2;
            }
        }
    }

    fn add_roof(&mut self, polygon: ClassifiedPolygon, granularity: u32) {
        let rings: Vec<GeometryCoordinates> =
            polygon.into_iter().map(|classified| classified.ring).collect();
        // Walls were already subdivided, so no outlines are needed
        let subdivided = subdivide_fill(&rings, granularity, false);

        fill_large_mesh_arrays(
            |array: &mut FillExtrusionLayoutArray, x, y| {
                add_vertex(array, x, y, 0.0, 0.0, 1.0, 1, 0.0);
            },
            &mut self.segments,
            &mut self.layout_vertex_array,
            &mut self.index_array,
            &subdivided.vertices_flattened,
            &subdivided.indices_triangles,
            None,
        );
    }
}

impl Bucket for FillExtrusionBucket {
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

        for feature in bucket_features(features, None) {
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
        self.layout_vertex_array.is_empty() && self.centroid_vertex_array.is_empty()
    }

    fn upload_pending(&self) -> bool {
        !self.uploaded
    }

    fn upload(&mut self, context: &mut dyn UploadContext) {
        if !self.uploaded {
            context.create_vertex_buffer(
                FillExtrusionLayoutArray::members(),
                self.layout_vertex_array.as_bytes(),
            );
            context.create_vertex_buffer(
                PosArray::members(),
                self.centroid_vertex_array.as_bytes(),
            );
            context.create_index_buffer(self.index_array.as_bytes());
        }
        self.uploaded = true;
    }
}
