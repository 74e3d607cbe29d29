use cgmath::{InnerSpace, Vector2};
use serde::{Deserialize, Serialize};

use crate::{
    bucket::{
        bucket_features, check_geometry,
        pattern::{add_pattern_dependencies, has_pattern, log_missing_images},
        Bucket, BucketFeature, BucketParameters, ImagePositions, IndexedFeature,
        PopulateParameters, UploadContext,
    },
    coords::{CanonicalTileId, EXTENT, TILE_SIZE},
    error::BucketError,
    geometry::{FeatureType, GeometryCoordinate, PropertyMap},
    segment::SegmentVector,
    struct_array::{LineExtLayoutArray, LineLayoutArray, TriangleIndexArray},
    style::{LayerProperties, LineCap, LineJoin, LineLayout, StyleLayer},
    tessellation::subdivision::subdivide_vertex_line,
    util::math::{dist, perp, rad2deg, round_half_up, segment_normal, unit},
};

/// Extrusion vectors are scaled so that a unit normal has this length.
const EXTRUDE_SCALE: f64 = 63.0;

/// Corners where the half angle has a smaller cosine than this get extra vertices, so that
/// dashes are not skewed over the whole length of the adjacent segments. This is a 75 degree
/// turn.
const COS_HALF_SHARP_CORNER: f64 = 0.7933533402912352;

/// Distance of the extra vertices of sharp corners, in pixels.
const SHARP_CORNER_OFFSET: f64 = 15.0;

/// Turn per triangle of approximated round joins.
const DEG_PER_TRIANGLE: f64 = 20.0;

/// Bits which store the distance along the line.
const LINE_DISTANCE_BUFFER_BITS: i32 = 15;

/// The distance along the line is scaled down to fit longer lines into the buffer.
const LINE_DISTANCE_SCALE: f64 = 0.5;

/// Largest distance along the line, in tile units, which fits into the buffer.
const MAX_LINE_DISTANCE: f64 = (1 << (LINE_DISTANCE_BUFFER_BITS - 1)) as f64 / LINE_DISTANCE_SCALE;

/// The part of a line feature which lies within this tile, as fractions of the whole line.
/// Read from the `mapbox_clip_start` and `mapbox_clip_end` feature properties.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LineClips {
    pub start: f64,
    pub end: f64,
}

impl LineClips {
    pub fn from_properties(properties: &PropertyMap) -> Option<Self> {
        let start = properties.get("mapbox_clip_start")?.as_f64()?;
        let end = properties.get("mapbox_clip_end")?.as_f64()?;
        Some(Self { start, end })
    }
}

/// Joins and caps after the layout is applied to a single vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentJoin {
    Miter,
    Bevel,
    FlipBevel,
    FakeRound,
    Round,
    Butt,
    Square,
}

impl From<LineJoin> for CurrentJoin {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Bevel => CurrentJoin::Bevel,
            LineJoin::Round => CurrentJoin::Round,
            LineJoin::Miter => CurrentJoin::Miter,
            LineJoin::FakeRound => CurrentJoin::FakeRound,
            LineJoin::FlipBevel => CurrentJoin::FlipBevel,
        }
    }
}

impl From<LineCap> for CurrentJoin {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => CurrentJoin::Butt,
            LineCap::Round => CurrentJoin::Round,
            LineCap::Square => CurrentJoin::Square,
        }
    }
}

/// Layout of the line which is currently tessellated.
#[derive(Debug, Clone, Copy)]
struct LineStyle {
    join: LineJoin,
    cap: LineCap,
    miter_limit: f64,
    round_limit: f64,
    sharp_corner_offset: f64,
}

/// Lines of line layers and outlines of polygons, extruded to triangle strips.
#[derive(Serialize, Deserialize, Debug)]
pub struct LineBucket {
    pub index: usize,
    pub zoom: u8,
    pub overscaling: u32,
    pub layer_ids: Vec<String>,
    #[serde(skip)]
    layers: Vec<StyleLayer>,
    pub has_pattern: bool,
    #[serde(skip)]
    pattern_features: Vec<BucketFeature>,

    /// Clips of every clipped line, in the order the lines were added
    pub line_clips_array: Vec<LineClips>,
    /// Length of the longest clipped line in tile units
    pub max_line_length: f64,

    pub layout_vertex_array: LineLayoutArray,
    /// Progress along clipped lines, only written for lines with clips
    pub layout_vertex_array2: LineExtLayoutArray,
    pub index_array: TriangleIndexArray,
    pub segments: SegmentVector,

    #[serde(skip)]
    uploaded: bool,
}

impl LineBucket {
    pub fn new(parameters: &BucketParameters) -> Self {
        Self {
            index: parameters.index,
            zoom: parameters.zoom,
            overscaling: parameters.overscaling,
            layer_ids: parameters.layer_ids(),
            layers: parameters.layers.clone(),
            has_pattern: false,
            pattern_features: Vec::new(),
            line_clips_array: Vec::new(),
            max_line_length: 0.0,
            layout_vertex_array: LineLayoutArray::new(),
            layout_vertex_array2: LineExtLayoutArray::new(),
            index_array: TriangleIndexArray::new(),
            segments: parameters.segment_vector(),
            uploaded: false,
        }
    }

    fn layout(&self) -> LineLayout {
        match self.layers.first().map(|layer| &layer.properties) {
            Some(LayerProperties::Line { layout, .. }) => layout.clone(),
            _ => LineLayout::default(),
        }
    }

    /// Tessellates every line of `feature`. Polygon rings are drawn as closed lines.
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

        let layout = self.layout();
        let style = LineStyle {
            join: layout
                .line_join
                .evaluate_or(&feature.properties, LineJoin::Miter),
            cap: layout.line_cap,
            miter_limit: layout.line_miter_limit,
            round_limit: layout.line_round_limit,
            sharp_corner_offset: if self.overscaling <= 16 {
                SHARP_CORNER_OFFSET * EXTENT as f64 / (TILE_SIZE * self.overscaling.max(1) as f64)
            } else {
                0.0
            },
        };

        let granularity = options
            .subdivision_granularity
            .line
            .get_granularity_for_zoom_level(canonical.z.into());
        let is_polygon = feature.feature_type == FeatureType::Polygon;

        let mut builder = LineBuilder {
            layout_vertex_array: &mut self.layout_vertex_array,
            layout_vertex_array2: &mut self.layout_vertex_array2,
            index_array: &mut self.index_array,
            segments: &mut self.segments,
            line_clips_array: &mut self.line_clips_array,
            max_line_length: &mut self.max_line_length,
            line_clips: LineClips::from_properties(&feature.properties),
            sort_key: feature.sort_key,
            distance: 0.0,
            total_distance: 0.0,
            scaled_distance: 0.0,
            e1: None,
            e2: None,
        };

        for line in &feature.geometry {
            let vertices = subdivide_vertex_line(line, granularity, is_polygon);
            builder.add_line(&vertices, is_polygon, &style);
        }

        Ok(())
    }
}

/// Cursor over the buffers of a [`LineBucket`] while a feature is tessellated.
struct LineBuilder<'a> {
    layout_vertex_array: &'a mut LineLayoutArray,
    layout_vertex_array2: &'a mut LineExtLayoutArray,
    index_array: &'a mut TriangleIndexArray,
    segments: &'a mut SegmentVector,
    line_clips_array: &'a mut Vec<LineClips>,
    max_line_length: &'a mut f64,

    line_clips: Option<LineClips>,
    sort_key: Option<f64>,

    /// Distance along the current line in tile units
    distance: f64,
    /// Length of the current line, only known for clipped lines
    total_distance: f64,
    scaled_distance: f64,

    /// The latest vertices on each side of the line, relative to the current segment
    e1: Option<usize>,
    e2: Option<usize>,
}

impl LineBuilder<'_> {
    fn add_line(&mut self, vertices: &[GeometryCoordinate], is_polygon: bool, style: &LineStyle) {
        self.distance = 0.0;
        self.scaled_distance = 0.0;
        self.total_distance = 0.0;

        if let Some(line_clips) = self.line_clips {
            self.line_clips_array.push(line_clips);
            self.total_distance = vertices
                .windows(2)
                .map(|pair| dist(&pair[0], &pair[1]))
                .sum();
            self.update_scaled_distance();
            *self.max_line_length = self.max_line_length.max(self.total_distance);
        }

        let mut len = vertices.len();
        while len >= 2 && vertices[len - 1] == vertices[len - 2] {
            len -= 1;
        }
        let mut first = 0;
        while first + 1 < len && vertices[first] == vertices[first + 1] {
            first += 1;
        }

        if len < if is_polygon { 3 } else { 2 } {
            return;
        }

        let miter_limit = if style.join == LineJoin::Bevel {
            1.05
        } else {
            style.miter_limit
        };

        // More than enough for most lines
        self.segments.prepare_segment(
            len * 10,
            self.layout_vertex_array,
            self.index_array,
            self.sort_key,
        );

        self.e1 = None;
        self.e2 = None;

        let mut current_vertex: Option<GeometryCoordinate> = None;
        let mut prev_vertex: Option<GeometryCoordinate> = None;
        let mut prev_normal: Option<Vector2<f64>> = None;
        let mut next_normal: Option<Vector2<f64>> = None;

        if is_polygon {
            let current = vertices[len - 2];
            current_vertex = Some(current);
            next_normal = Some(segment_normal(&current, &vertices[first]));
        }

        for i in first..len {
            let next_vertex = if i == len - 1 {
                // The last vertex of a ring joins the first segment
                is_polygon.then(|| vertices[first + 1])
            } else {
                Some(vertices[i + 1])
            };

            if next_vertex == Some(vertices[i]) {
                continue;
            }

            if next_normal.is_some() {
                prev_normal = next_normal;
            }
            if current_vertex.is_some() {
                prev_vertex = current_vertex;
            }

            let current = vertices[i];
            current_vertex = Some(current);

            // Without a next vertex the line continues straight
            let next_n = match (next_vertex, prev_normal) {
                (Some(next), _) => segment_normal(&current, &next),
                (None, Some(prev_n)) => prev_n,
                (None, None) => continue,
            };
            next_normal = Some(next_n);
            let prev_n = *prev_normal.get_or_insert(next_n);

            // Bisector of both segments. Opposite normals cancel out, which gives an infinite
            // miter length below.
            let join_normal = unit(prev_n + next_n);

            let cos_angle = prev_n.dot(next_n);
            let cos_half_angle = join_normal.dot(next_n);
            let miter_length = if cos_half_angle != 0.0 {
                1.0 / cos_half_angle
            } else {
                f64::INFINITY
            };
            let approx_angle = 2.0 * (2.0 - 2.0 * cos_half_angle).sqrt();
            let is_sharp_corner = cos_half_angle < COS_HALF_SHARP_CORNER
                && prev_vertex.is_some()
                && next_vertex.is_some();
            let line_turns_left = prev_n.x * next_n.y - prev_n.y * next_n.x > 0.0;

            if is_sharp_corner && i > first {
                if let Some(prev) = prev_vertex {
                    let prev_segment_length = dist(&current, &prev);
                    if prev_segment_length > 2.0 * style.sharp_corner_offset {
                        let new_prev_vertex = offset_towards(
                            current,
                            prev,
                            style.sharp_corner_offset / prev_segment_length,
                        );
                        self.update_distance(&prev, &new_prev_vertex);
                        self.add_current_vertex(new_prev_vertex, prev_n, 0.0, 0.0, false);
                        prev_vertex = Some(new_prev_vertex);
                    }
                }
            }

            let middle_vertex = prev_vertex.is_some() && next_vertex.is_some();
            let mut current_join = if middle_vertex {
                CurrentJoin::from(style.join)
            } else if is_polygon {
                CurrentJoin::Butt
            } else {
                CurrentJoin::from(style.cap)
            };

            if middle_vertex && current_join == CurrentJoin::Round {
                if miter_length < style.round_limit {
                    current_join = CurrentJoin::Miter;
                } else if miter_length <= 2.0 {
                    current_join = CurrentJoin::FakeRound;
                }
            }

            if current_join == CurrentJoin::Miter && miter_length > miter_limit {
                current_join = CurrentJoin::Bevel;
            }

            if current_join == CurrentJoin::Bevel {
                // Extrusions are at most twice the line width, longer miters need a flipped bevel
                if miter_length > 2.0 {
                    current_join = CurrentJoin::FlipBevel;
                }
                // A bevel this small would not be visible
                if miter_length < miter_limit {
                    current_join = CurrentJoin::Miter;
                }
            }

            if let Some(prev) = prev_vertex {
                self.update_distance(&prev, &current);
            }

            match current_join {
                CurrentJoin::Miter => {
                    self.add_current_vertex(current, join_normal * miter_length, 0.0, 0.0, false);
                }
                CurrentJoin::FlipBevel => {
                    let join_normal = if miter_length > 100.0 {
                        // Almost parallel lines
                        -next_n
                    } else {
                        let bevel_length = miter_length * (prev_n + next_n).magnitude()
                            / (prev_n - next_n).magnitude();
                        let direction = if line_turns_left { -1.0 } else { 1.0 };
                        perp(join_normal) * bevel_length * direction
                    };
                    self.add_current_vertex(current, join_normal, 0.0, 0.0, false);
                    self.add_current_vertex(current, -join_normal, 0.0, 0.0, false);
                }
                CurrentJoin::Bevel | CurrentJoin::FakeRound => {
                    let offset = -(miter_length * miter_length - 1.0).sqrt();
                    let (offset_a, offset_b) = if line_turns_left {
                        (offset, 0.0)
                    } else {
                        (0.0, offset)
                    };

                    // Close the previous segment with a bevel
                    if prev_vertex.is_some() {
                        self.add_current_vertex(current, prev_n, offset_a, offset_b, false);
                    }

                    if current_join == CurrentJoin::FakeRound {
                        // A fan of pie slices which looks round at the sizes lines are drawn at
                        let n = (rad2deg(approx_angle) / DEG_PER_TRIANGLE).round() as usize;
                        for m in 1..n {
                            let t = slerp_t(m as f64 / n as f64, cos_angle);
                            let direction = if line_turns_left { -1.0 } else { 1.0 };
                            let extrude = unit((next_n - prev_n) * t + prev_n) * direction;
                            self.add_half_vertex(current, extrude, false, line_turns_left, 0.0);
                        }
                    }

                    // Start the next segment
                    if next_vertex.is_some() {
                        self.add_current_vertex(current, next_n, -offset_a, -offset_b, false);
                    }
                }
                CurrentJoin::Butt => {
                    self.add_current_vertex(current, join_normal, 0.0, 0.0, false);
                }
                CurrentJoin::Square => {
                    let offset = if prev_vertex.is_some() { 1.0 } else { -1.0 };
                    self.add_current_vertex(current, join_normal, offset, offset, false);
                }
                CurrentJoin::Round => {
                    if prev_vertex.is_some() {
                        // Close the previous segment with a butt, then the round cap
                        self.add_current_vertex(current, prev_n, 0.0, 0.0, false);
                        self.add_current_vertex(current, prev_n, 1.0, 1.0, true);
                    }
                    if next_vertex.is_some() {
                        self.add_current_vertex(current, next_n, -1.0, -1.0, true);
                        self.add_current_vertex(current, next_n, 0.0, 0.0, false);
                    }
                }
            }

            if is_sharp_corner && i < len - 1 {
                if let Some(next) = next_vertex {
                    let next_segment_length = dist(&current, &next);
                    if next_segment_length > 2.0 * style.sharp_corner_offset {
                        let new_current_vertex = offset_towards(
                            current,
                            next,
                            style.sharp_corner_offset / next_segment_length,
                        );
                        self.update_distance(&current, &new_current_vertex);
                        self.add_current_vertex(new_current_vertex, next_n, 0.0, 0.0, false);
                        current_vertex = Some(new_current_vertex);
                    }
                }
            }
        }
    }

    /// Adds the left and right vertex of `point`. `end_left` and `end_right` shift the extrusion
    /// along the line, for caps and bevels.
    fn add_current_vertex(
        &mut self,
        point: GeometryCoordinate,
        normal: Vector2<f64>,
        end_left: f64,
        end_right: f64,
        round: bool,
    ) {
        let left = Vector2::new(normal.x + normal.y * end_left, normal.y - normal.x * end_left);
        let right = Vector2::new(
            -normal.x + normal.y * end_right,
            -normal.y - normal.x * end_right,
        );
        self.add_half_vertex(point, left, round, false, end_left);
        self.add_half_vertex(point, right, round, true, -end_right);

        // Unclipped lines restart their distance before it exceeds what the buffer can store
        if self.distance > MAX_LINE_DISTANCE / 2.0 && self.total_distance == 0.0 {
            self.distance = 0.0;
            self.update_scaled_distance();
            self.add_current_vertex(point, normal, end_left, end_right, round);
        }
    }

    fn add_half_vertex(
        &mut self,
        point: GeometryCoordinate,
        extrude: Vector2<f64>,
        round: bool,
        up: bool,
        dir: f64,
    ) {
        self.reserve_vertex();

        let total_distance = if self.line_clips.is_some() {
            self.scaled_distance * (MAX_LINE_DISTANCE - 1.0)
        } else {
            self.scaled_distance
        };
        let linesofar = (total_distance * LINE_DISTANCE_SCALE) as i32;
        let direction = if dir == 0.0 {
            0
        } else if dir < 0.0 {
            -1
        } else {
            1
        };

        self.layout_vertex_array.emplace_back(
            ((point.x << 1) + round as i32) as i16,
            ((point.y << 1) + up as i32) as i16,
            (round_half_up(EXTRUDE_SCALE * extrude.x) as i32 + 128) as u8,
            (round_half_up(EXTRUDE_SCALE * extrude.y) as i32 + 128) as u8,
            ((direction + 1) | ((linesofar & 0x3f) << 2)) as u8,
            (linesofar >> 6) as u8,
        );

        if let Some(line_clips) = self.line_clips {
            let progress = self.scaled_distance - line_clips.start;
            let clip_length = line_clips.end - line_clips.start;
            self.layout_vertex_array2
                .emplace_back((progress / clip_length) as f32, self.line_clips_array.len() as f32);
        }

        let Some(segment) = self.segments.last_mut() else {
            return;
        };
        let e = segment.vertex_length;
        segment.vertex_length += 1;

        if let (Some(e1), Some(e2)) = (self.e1, self.e2) {
            self.index_array.emplace_back(e1 as u16, e2 as u16, e as u16);
            segment.primitive_length += 1;
        }

        if up {
            self.e2 = Some(e);
        } else {
            self.e1 = Some(e);
        }
    }

    /// Starts a new segment if the current one is full. The strip continues in the new
    /// segment from copies of the latest left and right vertex.
    fn reserve_vertex(&mut self) {
        let max_vertex_array_length = self.segments.max_vertex_array_length();
        let Some(segment) = self.segments.segments().last() else {
            self.segments.create_new_segment(
                self.layout_vertex_array,
                self.index_array,
                self.sort_key,
            );
            return;
        };
        if segment.vertex_length < max_vertex_array_length {
            return;
        }

        let vertex_offset = segment.vertex_offset;
        self.segments
            .create_new_segment(self.layout_vertex_array, self.index_array, self.sort_key);

        let e1 = self.e1.take().map(|e1| self.copy_vertex(vertex_offset + e1));
        let e2 = self.e2.take().map(|e2| self.copy_vertex(vertex_offset + e2));
        self.e1 = e1;
        self.e2 = e2;
    }

    /// Copies the vertex at the absolute `index` into the current segment.
    fn copy_vertex(&mut self, index: usize) -> usize {
        self.layout_vertex_array.duplicate(index);
        if self.line_clips.is_some() && index < self.layout_vertex_array2.len() {
            self.layout_vertex_array2.duplicate(index);
        }

        match self.segments.last_mut() {
            Some(segment) => {
                segment.vertex_length += 1;
                segment.vertex_length - 1
            }
            None => 0,
        }
    }

    fn update_distance(&mut self, from: &GeometryCoordinate, to: &GeometryCoordinate) {
        self.distance += dist(from, to);
        self.update_scaled_distance();
    }

    /// Clipped lines store their distance relative to the whole line feature.
    fn update_scaled_distance(&mut self) {
        self.scaled_distance = match self.line_clips {
            Some(line_clips) if self.total_distance > 0.0 => {
                line_clips.start
                    + (line_clips.end - line_clips.start) * self.distance / self.total_distance
            }
            _ => self.distance,
        };
    }
}

/// The point `fraction` of the way from `from` towards `to`, rounded to tile units.
fn offset_towards(
    from: GeometryCoordinate,
    to: GeometryCoordinate,
    fraction: f64,
) -> GeometryCoordinate {
    GeometryCoordinate::new(
        from.x + round_half_up((to.x - from.x) as f64 * fraction) as i32,
        from.y + round_half_up((to.y - from.y) as f64 * fraction) as i32,
    )
}

/// Approximates spherical interpolation between two normals with a polynomial in `t`, see
/// <https://observablehq.com/@mourner/approximating-geometric-slerp>.
fn slerp_t(t: f64, cos_angle: f64) -> f64 {
    if t == 0.5 {
        return t;
    }
    let t2 = t - 0.5;
    let a = 1.0904 + cos_angle * (-3.2452 + cos_angle * (3.55645 - cos_angle * 1.43519));
    let b = 0.848013 + cos_angle * (-1.06021 + cos_angle * 0.215638);
    t + t * t2 * (t - 1.0) * (a * t2 * t2 + b)
}

impl Bucket for LineBucket {
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
            Some(LayerProperties::Line { layout, .. }) => layout.line_sort_key.as_ref(),
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
            if !self.layout_vertex_array2.is_empty() {
                context.create_vertex_buffer(
                    LineExtLayoutArray::members(),
                    self.layout_vertex_array2.as_bytes(),
                );
            }
            context.create_vertex_buffer(
                LineLayoutArray::members(),
                self.layout_vertex_array.as_bytes(),
            );
            context.create_index_buffer(self.index_array.as_bytes());
        }
        self.uploaded = true;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        bucket::{
            tests::{feature, RecordingContext},
            Bucket, BucketParameters, IndexedFeature, LineBucket, LineClips, PopulateParameters,
        },
        coords::CanonicalTileId,
        error::BucketError,
        geometry::FeatureType,
        segment::Segment,
        style::{LayerProperties, LineJoin, LineLayout, LinePaint, PropertyValue, StyleLayer},
    };

    fn line_layer(layout: LineLayout) -> StyleLayer {
        StyleLayer::new(
            "roads",
            "transportation",
            LayerProperties::Line {
                layout,
                paint: LinePaint::default(),
            },
        )
    }

    fn line_bucket(layout: LineLayout, max_vertex_array_length: usize) -> LineBucket {
        let mut parameters = BucketParameters::new(vec![line_layer(layout)], 0);
        parameters.max_vertex_array_length = max_vertex_array_length;
        LineBucket::new(&parameters)
    }

    fn populate(bucket: &mut LineBucket, features: &[IndexedFeature]) {
        bucket
            .populate(
                features,
                &mut PopulateParameters::default(),
                &CanonicalTileId::new(0, 0, 0),
            )
            .unwrap();
    }

    fn diagonal(num_points: i32) -> Vec<(i32, i32)> {
        (0..num_points).map(|i| (i, i)).collect()
    }

    fn segment(
        vertex_offset: usize,
        vertex_length: usize,
        primitive_offset: usize,
        primitive_length: usize,
    ) -> Segment {
        Segment {
            vertex_offset,
            primitive_offset,
            vertex_length,
            primitive_length,
            sort_key: None,
        }
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        populate(
            &mut bucket,
            &[
                feature(FeatureType::LineString, &[&[(0, 0)]], json!({}), 0),
                feature(FeatureType::Polygon, &[&[(0, 0)]], json!({}), 1),
                feature(FeatureType::LineString, &[&[(0, 0), (0, 0)]], json!({}), 2),
                feature(FeatureType::Polygon, &[&[(0, 0), (0, 0)]], json!({}), 3),
            ],
        );
        assert!(bucket.is_empty());
        assert!(bucket.index_array.is_empty());
    }

    #[test]
    fn test_lines_and_rings_do_not_panic() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        let shapes: [&[(i32, i32)]; 3] = [
            &[(0, 0), (10, 10), (0, 0)],
            &[(0, 0), (10, 10), (10, 20)],
            &[(0, 0), (10, 10), (10, 20), (0, 0)],
        ];
        let mut features = Vec::new();
        for (i, shape) in shapes.into_iter().enumerate() {
            features.push(feature(FeatureType::LineString, &[shape], json!({}), i * 2));
            features.push(feature(FeatureType::Polygon, &[shape], json!({}), i * 2 + 1));
        }
        populate(&mut bucket, &features);

        assert!(!bucket.is_empty());
        for segment in bucket.segments.segments() {
            for i in segment.primitive_offset..segment.primitive_offset + segment.primitive_length {
                let triangle = bucket.index_array.get(i);
                for index in [triangle.vertex0, triangle.vertex1, triangle.vertex2] {
                    assert!((index as usize) < segment.vertex_length);
                }
            }
        }
    }

    #[test]
    fn test_miter_join() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (10, 10), (10, 20)]],
                json!({}),
                0,
            )],
        );

        assert_eq!(bucket.layout_vertex_array.len(), 6);
        assert_eq!(bucket.index_array.len(), 4);

        let start = bucket.layout_vertex_array.get(0);
        assert_eq!((start.a_pos_normal_x, start.a_pos_normal_y), (0, 0));
        // The left extrusion of a butt cap is the segment normal, (-0.707, 0.707)
        assert_eq!((start.a_extrude_x, start.a_extrude_y), (83, 173));
        assert_eq!(start.a_direction_linesofar, 1);

        let right = bucket.layout_vertex_array.get(1);
        // The lowest bit marks the upper side
        assert_eq!(right.a_pos_normal_y, 1);

        let triangle = bucket.index_array.get(0);
        assert_eq!((triangle.vertex0, triangle.vertex1, triangle.vertex2), (0, 1, 2));
        let triangle = bucket.index_array.get(1);
        assert_eq!((triangle.vertex0, triangle.vertex1, triangle.vertex2), (2, 1, 3));
    }

    #[test]
    fn test_round_join_becomes_fakeround() {
        let layout = LineLayout {
            line_join: PropertyValue::Constant(LineJoin::Round),
            ..LineLayout::default()
        };
        let mut bucket = line_bucket(layout, 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (10, 10), (10, 20)]],
                json!({}),
                0,
            )],
        );

        // Cap, bevel with a single pie slice, cap
        assert_eq!(bucket.layout_vertex_array.len(), 2 + 5 + 2);
        assert_eq!(bucket.index_array.len(), 7);
    }

    #[test]
    fn test_right_angle_fakeround_fan() {
        let layout = LineLayout {
            line_join: PropertyValue::Constant(LineJoin::Round),
            ..LineLayout::default()
        };
        let mut bucket = line_bucket(layout, 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (100, 0), (100, 100)]],
                json!({}),
                0,
            )],
        );

        // The segments are too short for extra sharp corner vertices
        assert_eq!(bucket.layout_vertex_array.len(), 2 + 2 + 3 + 2 + 2);
        assert_eq!(bucket.index_array.len(), 9);
    }

    #[test]
    fn test_sharp_corner_vertices() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (1000, 0), (1000, 1000)]],
                json!({}),
                0,
            )],
        );

        // The right angle gets extra vertices 240 units before and after the corner
        assert_eq!(bucket.layout_vertex_array.len(), 2 + 2 + 2 + 2 + 2);
        let before_corner = bucket.layout_vertex_array.get(2);
        assert_eq!(before_corner.a_pos_normal_x, 760 << 1);
        let after_corner = bucket.layout_vertex_array.get(6);
        assert_eq!(after_corner.a_pos_normal_x >> 1, 1000);
        assert_eq!(after_corner.a_pos_normal_y >> 1, 240);
    }

    #[test]
    fn test_data_driven_join() {
        let layout = LineLayout {
            line_join: PropertyValue::Expression(json!(["get", "join"])),
            ..LineLayout::default()
        };
        let mut bucket = line_bucket(layout, 65535);
        populate(
            &mut bucket,
            &[
                feature(
                    FeatureType::LineString,
                    &[&[(0, 0), (10, 10), (10, 20)]],
                    json!({"join": "round"}),
                    0,
                ),
                feature(
                    FeatureType::LineString,
                    &[&[(0, 0), (10, 10), (10, 20)]],
                    json!({}),
                    1,
                ),
            ],
        );
        assert_eq!(bucket.layout_vertex_array.len(), 9 + 6);
    }

    #[test]
    fn test_segmentation() {
        let mut bucket = line_bucket(LineLayout::default(), 256);

        // The first line makes sure the second one starts at a non-zero offset
        let short = diagonal(10);
        let long = diagonal(128);
        populate(
            &mut bucket,
            &[
                feature(FeatureType::LineString, &[&short], json!({}), 0),
                feature(FeatureType::LineString, &[&long], json!({}), 1),
            ],
        );

        assert_eq!(bucket.layout_vertex_array.len(), 276);
        assert_eq!(
            bucket.segments.segments(),
            &[segment(0, 20, 0, 18), segment(20, 256, 18, 254)]
        );
    }

    #[test]
    fn test_long_line_continues_in_new_segment() {
        let mut bucket = line_bucket(LineLayout::default(), 16);
        let points: Vec<(i32, i32)> = (0..20).map(|i| (i * 10, 0)).collect();
        populate(
            &mut bucket,
            &[feature(FeatureType::LineString, &[&points], json!({}), 0)],
        );

        // 40 vertices, plus the last two vertices copied into each new segment
        assert_eq!(bucket.layout_vertex_array.len(), 44);
        assert_eq!(
            bucket.segments.segments(),
            &[
                segment(0, 16, 0, 14),
                segment(16, 16, 14, 14),
                segment(32, 12, 28, 10),
            ]
        );
        assert_eq!(
            bucket.layout_vertex_array.get(16),
            bucket.layout_vertex_array.get(14)
        );
        assert_eq!(
            bucket.layout_vertex_array.get(17),
            bucket.layout_vertex_array.get(15)
        );

        let triangle = bucket.index_array.get(14);
        assert_eq!((triangle.vertex0, triangle.vertex1, triangle.vertex2), (0, 1, 2));
    }

    #[test]
    fn test_line_clips() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (100, 0), (200, 0)]],
                json!({"mapbox_clip_start": 0.25, "mapbox_clip_end": 0.75}),
                0,
            )],
        );

        assert_eq!(bucket.line_clips_array, vec![LineClips { start: 0.25, end: 0.75 }]);
        assert_eq!(bucket.max_line_length, 200.0);
        assert_eq!(bucket.layout_vertex_array2.len(), bucket.layout_vertex_array.len());

        let start = bucket.layout_vertex_array2.get(0);
        assert_eq!(start.a_uv_x, 0.0);
        assert_eq!(start.a_split_index, 1.0);
        let middle = bucket.layout_vertex_array2.get(2);
        assert_eq!(middle.a_uv_x, 0.5);
        let end = bucket.layout_vertex_array2.get(5);
        assert_eq!(end.a_uv_x, 1.0);

        let mut context = RecordingContext::default();
        bucket.upload(&mut context);
        assert_eq!(context.vertex_buffers, vec![(2, 6 * 8), (6, 6 * 8)]);
    }

    #[test]
    fn test_unclipped_distance_is_stored() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        populate(
            &mut bucket,
            &[feature(
                FeatureType::LineString,
                &[&[(0, 0), (1000, 0)]],
                json!({}),
                0,
            )],
        );

        // 1000 tile units are stored as 500, split into 52 and 7 * 64
        let end = bucket.layout_vertex_array.get(2);
        assert_eq!(end.a_direction_linesofar >> 2, 52);
        assert_eq!(end.a_linesofar, 7);
        assert!(bucket.layout_vertex_array2.is_empty());
    }

    #[test]
    fn test_point_is_rejected() {
        let mut bucket = line_bucket(LineLayout::default(), 65535);
        let result = bucket.populate(
            &[feature(FeatureType::Point, &[&[(0, 0)]], json!({}), 0)],
            &mut PopulateParameters::default(),
            &CanonicalTileId::new(0, 0, 0),
        );
        assert!(matches!(result, Err(BucketError::UnsupportedGeometry { .. })));
    }
}
