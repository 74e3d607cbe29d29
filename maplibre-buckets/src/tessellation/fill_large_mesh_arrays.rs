//! Writes meshes of any size into segmented buffers.
//!
//! A mesh with fewer vertices than the segment limit is written as is. Larger meshes, which
//! mostly come from subdivision, are split into several segments. Vertices which are referenced
//! from more than one segment are copied into each of them. This assumes that primitives use
//! their vertices in roughly ascending order, like a grid which is built row by row.

use crate::{
    segment::SegmentVector,
    struct_array::{LineIndexArray, StructArray, StructArrayLayout, TriangleIndexArray},
};

/// Outlines of a mesh, drawn with their own segments.
pub struct LineListMesh<'a> {
    pub segments: &'a mut SegmentVector,
    pub index_array: &'a mut LineIndexArray,
    /// Pairs of indices into the flattened vertices, one list per ring
    pub line_list: &'a [Vec<u32>],
}

/// Writes the vertices in `flattened` (pairs of x and y) through `add_vertex` and the
/// triangles in `triangle_indices` into `triangle_index_array`. Outlines are written if `lines`
/// is given. Triangles and outlines share the vertex buffer.
pub fn fill_large_mesh_arrays<V, F>(
    mut add_vertex: F,
    segments_triangles: &mut SegmentVector,
    vertex_array: &mut StructArray<V>,
    triangle_index_array: &mut TriangleIndexArray,
    flattened: &[i32],
    triangle_indices: &[u32],
    lines: Option<LineListMesh<'_>>,
) where
    V: StructArrayLayout,
    F: FnMut(&mut StructArray<V>, i32, i32),
{
    let num_vertices = flattened.len() / 2;

    if num_vertices < segments_triangles.max_vertex_array_length() {
        let triangle_segment = segments_triangles.prepare_segment(
            num_vertices,
            vertex_array,
            triangle_index_array,
            None,
        );
        let triangle_index = triangle_segment.vertex_length;

        for triangle in triangle_indices.chunks_exact(3) {
            triangle_index_array.emplace_back(
                (triangle_index + triangle[0] as usize) as u16,
                (triangle_index + triangle[1] as usize) as u16,
                (triangle_index + triangle[2] as usize) as u16,
            );
        }

        triangle_segment.vertex_length += num_vertices;
        triangle_segment.primitive_length += triangle_indices.len() / 3;

        // The line segment must be created before the vertices are written
        let lines = lines.map(|lines| {
            let line_segment =
                lines
                    .segments
                    .prepare_segment(num_vertices, vertex_array, lines.index_array, None);
            let line_indices_start = line_segment.vertex_length;
            line_segment.vertex_length += num_vertices;
            (lines, line_indices_start)
        });

        for vertex in flattened.chunks_exact(2) {
            add_vertex(vertex_array, vertex[0], vertex[1]);
        }

        if let Some((lines, line_indices_start)) = lines {
            let mut primitive_length = 0;
            for line_indices in lines.line_list {
                for line in line_indices.chunks_exact(2) {
                    lines.index_array.emplace_back(
                        (line_indices_start + line[0] as usize) as u16,
                        (line_indices_start + line[1] as usize) as u16,
                    );
                    primitive_length += 1;
                }
            }

            if let Some(line_segment) = lines.segments.last_mut() {
                line_segment.primitive_length += primitive_length;
            }
        }
    } else {
        fill_segments(
            &mut add_vertex,
            segments_triangles,
            vertex_array,
            triangle_index_array,
            flattened,
            triangle_indices
                .chunks_exact(3)
                .map(|triangle| [triangle[0], triangle[1], triangle[2]]),
            |index_array, [i0, i1, i2]| {
                index_array.emplace_back(i0, i1, i2);
            },
        );

        // The triangles and lines copied a different number of vertices, so they can not share
        // the next segment.
        segments_triangles.force_new_segment_on_next_prepare();

        if let Some(lines) = lines {
            fill_segments(
                &mut add_vertex,
                lines.segments,
                vertex_array,
                lines.index_array,
                flattened,
                lines
                    .line_list
                    .iter()
                    .flat_map(|line_indices| line_indices.chunks_exact(2))
                    .map(|line| [line[0], line[1]]),
                |index_array, [i0, i1]| {
                    index_array.emplace_back(i0, i1);
                },
            );
            lines.segments.force_new_segment_on_next_prepare();
        }
    }
}

/// Writes `primitives` with `N` vertices each, starting a new segment whenever the vertices a
/// primitive needs do not fit into the current one.
fn fill_segments<V, I, F, const N: usize>(
    add_vertex: &mut F,
    segments: &mut SegmentVector,
    vertex_array: &mut StructArray<V>,
    index_array: &mut StructArray<I>,
    flattened: &[i32],
    primitives: impl Iterator<Item = [u32; N]>,
    mut emit: impl FnMut(&mut StructArray<I>, [u16; N]),
) where
    V: StructArrayLayout,
    I: StructArrayLayout,
    F: FnMut(&mut StructArray<V>, i32, i32),
{
    let max_vertex_array_length = segments.max_vertex_array_length();

    // Original vertex index -> number of copies made before the latest copy of this vertex
    let mut actual_vertex_indices: Vec<Option<usize>> = vec![None; flattened.len() / 2];
    let mut total_vertices_created = 0;
    let mut current_segment_cutoff = 0;

    let mut segment = segments.get_or_create_latest_segment(vertex_array, index_array, None);
    if segment.vertex_offset + segment.vertex_length != vertex_array.len() {
        // Vertices were written after the latest segment, so it can not be continued.
        segment = segments.create_new_segment(vertex_array, index_array, None);
    }
    let mut base_vertex = segment.vertex_length;

    for primitive in primitives {
        let mut needs_copy = primitive.map(|index| {
            actual_vertex_indices[index as usize]
                .map_or(true, |actual| actual < current_segment_cutoff)
        });
        let copy_count = needs_copy.iter().filter(|needs_copy| **needs_copy).count();

        if segment.vertex_length + copy_count > max_vertex_array_length {
            segment = segments.create_new_segment(vertex_array, index_array, None);
            current_segment_cutoff = total_vertices_created;
            needs_copy = [true; N];
            base_vertex = 0;
        }

        let mut indices = [0u16; N];
        for (i, &index) in primitive.iter().enumerate() {
            let index = index as usize;
            let actual = if needs_copy[i] {
                add_vertex(vertex_array, flattened[index * 2], flattened[index * 2 + 1]);
                actual_vertex_indices[index] = Some(total_vertices_created);
                total_vertices_created += 1;
                segment.vertex_length += 1;
                total_vertices_created - 1
            } else {
                actual_vertex_indices[index].unwrap_or_default()
            };
            indices[i] = (base_vertex + actual - current_segment_cutoff) as u16;
        }

        emit(index_array, indices);
        segment.primitive_length += 1;
    }
}
