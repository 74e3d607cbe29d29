//! Subdivision of lines and polygons along a regular grid of cells.
//!
//! Geometry which is drawn on a curved surface needs enough vertices to follow the curvature.
//! The tile is split into `granularity` by `granularity` cells and every line segment or
//! triangle which crosses a cell border is split at that border. A granularity below 2 leaves
//! geometry as is.

use std::collections::HashMap;

use crate::{
    coords::EXTENT,
    geometry::{GeometryCoordinate, GeometryCoordinates},
    tessellation::{earcut_polygon, IndexDataType},
};

/// Triangles and outlines of a subdivided polygon. Indices point into `vertices_flattened`,
/// which holds `x, y` pairs.
#[derive(Default, Clone, Debug)]
pub struct SubdivisionResult {
    pub vertices_flattened: Vec<i32>,
    pub indices_triangles: Vec<IndexDataType>,
    /// One list of index pairs per ring
    pub indices_line_list: Vec<Vec<IndexDataType>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

fn cell_size(granularity: u32) -> i32 {
    (EXTENT / granularity.min(EXTENT as u32) as i32).max(1)
}

fn coordinate(point: &GeometryCoordinate, axis: Axis) -> i32 {
    match axis {
        Axis::X => point.x,
        Axis::Y => point.y,
    }
}

/// Where the segment `a`-`b` crosses the grid line `axis = value`. The result does not depend
/// on the direction of the segment, so that neighbouring triangles and outlines agree on it.
fn crossing(
    a: GeometryCoordinate,
    b: GeometryCoordinate,
    axis: Axis,
    value: i32,
) -> GeometryCoordinate {
    let (a, b) = if (a.x, a.y) <= (b.x, b.y) { (a, b) } else { (b, a) };
    match axis {
        Axis::X => {
            let t = (value - a.x) as f64 / (b.x - a.x) as f64;
            let y = a.y as f64 + t * (b.y - a.y) as f64;
            GeometryCoordinate::new(value, y.round() as i32)
        }
        Axis::Y => {
            let t = (value - a.y) as f64 / (b.y - a.y) as f64;
            let x = a.x as f64 + t * (b.x - a.x) as f64;
            GeometryCoordinate::new(x.round() as i32, value)
        }
    }
}

/// Grid lines strictly between `from` and `to`.
fn grid_lines_between(from: i32, to: i32, cell_size: i32) -> impl Iterator<Item = i32> {
    let (min, max) = (from.min(to), from.max(to));
    let first = min.div_euclid(cell_size) + 1;
    (first..)
        .map(move |k| k * cell_size)
        .take_while(move |line| *line < max)
}

/// Appends the points where `a`-`b` crosses cell borders to `out`, ordered from `a` to `b`.
/// Neither `a` nor `b` are appended.
fn push_crossings(
    a: GeometryCoordinate,
    b: GeometryCoordinate,
    cell_size: i32,
    out: &mut Vec<GeometryCoordinate>,
) {
    let mut crossings: Vec<(f64, GeometryCoordinate)> = Vec::new();
    for axis in [Axis::X, Axis::Y] {
        let (from, to) = (coordinate(&a, axis), coordinate(&b, axis));
        for line in grid_lines_between(from, to, cell_size) {
            let t = (line - from) as f64 / (to - from) as f64;
            crossings.push((t, crossing(a, b, axis, line)));
        }
    }
    crossings.sort_by(|(t1, _), (t2, _)| t1.total_cmp(t2));

    for (_, point) in crossings {
        if out.last() != Some(&point) && point != b {
            out.push(point);
        }
    }
}

/// Inserts a vertex wherever `line` crosses a cell border. Rings are returned closed, with the
/// first point repeated at the end.
pub fn subdivide_vertex_line(
    line: &[GeometryCoordinate],
    granularity: u32,
    is_ring: bool,
) -> GeometryCoordinates {
    let mut points = line.to_vec();
    if is_ring && !points.is_empty() && points.first() != points.last() {
        points.push(points[0]);
    }

    if granularity < 2 || points.len() < 2 {
        return points.into();
    }

    let cell_size = cell_size(granularity);
    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        if a == b {
            continue;
        }
        push_crossings(a, b, cell_size, &mut out);
        out.push(b);
    }

    out.into()
}

#[derive(Copy, Clone, Debug)]
enum EdgeSource {
    /// Part of a triangle edge between two input vertices
    Original(GeometryCoordinate, GeometryCoordinate),
    /// Runs along a cell border
    Grid,
}

#[derive(Copy, Clone, Debug)]
struct ClipVertex {
    point: GeometryCoordinate,
    /// Origin of the edge from this vertex to the next one
    next_edge: EdgeSource,
}

fn push_clip_vertex(polygon: &mut Vec<ClipVertex>, vertex: ClipVertex) {
    match polygon.last_mut() {
        Some(last) if last.point == vertex.point => last.next_edge = vertex.next_edge,
        _ => polygon.push(vertex),
    }
}

/// Clips `polygon` against the half plane `axis >= value` (or `axis <= value` if `keep_less`).
fn clip_polygon(
    polygon: &[ClipVertex],
    axis: Axis,
    value: i32,
    keep_less: bool,
) -> Vec<ClipVertex> {
    let inside = |vertex: &ClipVertex| {
        let c = coordinate(&vertex.point, axis);
        if keep_less {
            c <= value
        } else {
            c >= value
        }
    };

    let mut out = Vec::with_capacity(polygon.len() + 2);
    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (current_inside, next_inside) = (inside(current), inside(next));

        if current_inside {
            push_clip_vertex(&mut out, *current);
        }

        if current_inside != next_inside {
            let point = match current.next_edge {
                EdgeSource::Original(a, b) => crossing(a, b, axis, value),
                EdgeSource::Grid => match axis {
                    Axis::X => GeometryCoordinate::new(value, current.point.y),
                    Axis::Y => GeometryCoordinate::new(current.point.x, value),
                },
            };
            let next_edge = if current_inside {
                EdgeSource::Grid
            } else {
                current.next_edge
            };
            push_clip_vertex(&mut out, ClipVertex { point, next_edge });
        }
    }

    if out.len() > 1 && out.first().map(|v| v.point) == out.last().map(|v| v.point) {
        out.pop();
    }
    out
}

fn is_degenerate(a: GeometryCoordinate, b: GeometryCoordinate, c: GeometryCoordinate) -> bool {
    let cross = (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64)
        - (b.y as i64 - a.y as i64) * (c.x as i64 - a.x as i64);
    cross == 0
}

/// Deduplicating vertex list of a subdivided polygon.
#[derive(Default)]
struct VertexList {
    vertices_flattened: Vec<i32>,
    indices: HashMap<(i32, i32), IndexDataType>,
}

impl VertexList {
    fn index(&mut self, point: GeometryCoordinate) -> IndexDataType {
        let next = (self.vertices_flattened.len() / 2) as IndexDataType;
        *self.indices.entry((point.x, point.y)).or_insert_with(|| {
            self.vertices_flattened.push(point.x);
            self.vertices_flattened.push(point.y);
            next
        })
    }
}

/// Triangulates a convex polygon as a fan. The apex is chosen so that no triangle is
/// degenerate; if there is no such vertex the fan is built around the centroid.
fn triangulate_convex(
    polygon: &[GeometryCoordinate],
    vertices: &mut VertexList,
    indices: &mut Vec<IndexDataType>,
) {
    let n = polygon.len();
    if n < 3 {
        return;
    }

    let apex = (0..n).find(|apex| {
        (1..n - 1).all(|j| {
            !is_degenerate(
                polygon[*apex],
                polygon[(apex + j) % n],
                polygon[(apex + j + 1) % n],
            )
        })
    });

    if let Some(apex) = apex {
        for j in 1..n - 1 {
            for point in [
                polygon[apex],
                polygon[(apex + j) % n],
                polygon[(apex + j + 1) % n],
            ] {
                indices.push(vertices.index(point));
            }
        }
        return;
    }

    let (sum_x, sum_y) = polygon.iter().fold((0f64, 0f64), |(x, y), point| {
        (x + point.x as f64, y + point.y as f64)
    });
    let centroid = GeometryCoordinate::new(
        (sum_x / n as f64).round() as i32,
        (sum_y / n as f64).round() as i32,
    );

    for j in 0..n {
        let (a, b) = (polygon[j], polygon[(j + 1) % n]);
        if is_degenerate(centroid, a, b) {
            continue;
        }
        for point in [centroid, a, b] {
            indices.push(vertices.index(point));
        }
    }
}

/// Triangulates `polygon` (outer ring first, then holes) and splits the triangles along the
/// cell borders of `granularity`. Outlines for every ring are produced if `with_lines` is set.
pub fn subdivide_fill(
    polygon: &[GeometryCoordinates],
    granularity: u32,
    with_lines: bool,
) -> SubdivisionResult {
    let (flattened, triangles) = earcut_polygon(polygon);

    if granularity < 2 {
        let mut indices_line_list = Vec::new();
        if with_lines {
            let mut base = 0;
            for ring in polygon.iter().filter(|ring| !ring.is_empty()) {
                let len = ring.len() as IndexDataType;
                let mut line_indices = vec![base + len - 1, base];
                for i in 1..len {
                    line_indices.push(base + i - 1);
                    line_indices.push(base + i);
                }
                indices_line_list.push(line_indices);
                base += len;
            }
        }

        return SubdivisionResult {
            vertices_flattened: flattened,
            indices_triangles: triangles,
            indices_line_list,
        };
    }

    let cell_size = cell_size(granularity);
    let point = |index: IndexDataType| {
        let index = index as usize * 2;
        GeometryCoordinate::new(flattened[index], flattened[index + 1])
    };

    let mut vertices = VertexList::default();
    let mut indices_triangles = Vec::with_capacity(triangles.len());

    for triangle in triangles.chunks_exact(3) {
        let corners = [point(triangle[0]), point(triangle[1]), point(triangle[2])];
        if is_degenerate(corners[0], corners[1], corners[2]) {
            continue;
        }

        let min_x = corners.iter().map(|p| p.x).min().unwrap_or_default();
        let max_x = corners.iter().map(|p| p.x).max().unwrap_or_default();
        let min_y = corners.iter().map(|p| p.y).min().unwrap_or_default();
        let max_y = corners.iter().map(|p| p.y).max().unwrap_or_default();

        let cells_x = min_x.div_euclid(cell_size)..=(max_x - 1).div_euclid(cell_size);
        let cells_y = min_y.div_euclid(cell_size)..=(max_y - 1).div_euclid(cell_size);

        if cells_x.start() == cells_x.end() && cells_y.start() == cells_y.end() {
            for corner in corners {
                indices_triangles.push(vertices.index(corner));
            }
            continue;
        }

        let triangle: Vec<ClipVertex> = (0..3)
            .map(|i| ClipVertex {
                point: corners[i],
                next_edge: EdgeSource::Original(corners[i], corners[(i + 1) % 3]),
            })
            .collect();

        for cell_x in cells_x {
            let x0 = cell_x * cell_size;
            let column = clip_polygon(&triangle, Axis::X, x0, false);
            let column = clip_polygon(&column, Axis::X, x0 + cell_size, true);
            if column.len() < 3 {
                continue;
            }

            for cell_y in cells_y.clone() {
                let y0 = cell_y * cell_size;
                let piece = clip_polygon(&column, Axis::Y, y0, false);
                let piece = clip_polygon(&piece, Axis::Y, y0 + cell_size, true);
                let piece: Vec<GeometryCoordinate> = piece.iter().map(|v| v.point).collect();
                triangulate_convex(&piece, &mut vertices, &mut indices_triangles);
            }
        }
    }

    let mut indices_line_list = Vec::new();
    if with_lines {
        for ring in polygon.iter().filter(|ring| !ring.is_empty()) {
            let subdivided = subdivide_vertex_line(ring, granularity, true);
            let mut line_indices = Vec::with_capacity(subdivided.len() * 2);
            for edge in subdivided.windows(2) {
                if edge[0] == edge[1] {
                    continue;
                }
                line_indices.push(vertices.index(edge[0]));
                line_indices.push(vertices.index(edge[1]));
            }
            indices_line_list.push(line_indices);
        }
    }

    SubdivisionResult {
        vertices_flattened: vertices.vertices_flattened,
        indices_triangles,
        indices_line_list,
    }
}
