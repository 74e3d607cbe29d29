//! Draw call ranges within a shared vertex and index buffer pair.

use serde::{Deserialize, Serialize};

use crate::{
    struct_array::{StructArray, StructArrayLayout},
    util::warn_once,
};

/// The largest number of vertices a 16-bit index can address.
pub const MAX_VERTEX_ARRAY_LENGTH: usize = u16::MAX as usize;

/// A contiguous range of vertices and primitives which is drawn with one draw call. Indices
/// within a segment are relative to `vertex_offset`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub vertex_offset: usize,
    pub primitive_offset: usize,
    pub vertex_length: usize,
    pub primitive_length: usize,
    pub sort_key: Option<f64>,
}

/// Append-only list of [`Segment`]s tied to one vertex and index buffer pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentVector {
    segments: Vec<Segment>,
    max_vertex_array_length: usize,
    force_new_segment_on_next_prepare: bool,
}

impl Default for SegmentVector {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentVector {
    pub fn new() -> Self {
        Self::with_max_vertex_array_length(MAX_VERTEX_ARRAY_LENGTH)
    }

    /// Segments of this vector will never hold more than `max_vertex_array_length` vertices,
    /// unless a single [`SegmentVector::prepare_segment`] call asks for more.
    pub fn with_max_vertex_array_length(max_vertex_array_length: usize) -> Self {
        Self {
            segments: Vec::new(),
            max_vertex_array_length,
            force_new_segment_on_next_prepare: false,
        }
    }

    /// A vector with a single segment.
    pub fn simple_segment(
        vertex_offset: usize,
        primitive_offset: usize,
        vertex_length: usize,
        primitive_length: usize,
    ) -> Self {
        let mut vector = Self::new();
        vector.segments.push(Segment {
            vertex_offset,
            primitive_offset,
            vertex_length,
            primitive_length,
            sort_key: None,
        });
        vector
    }

    pub fn max_vertex_array_length(&self) -> usize {
        self.max_vertex_array_length
    }

    /// Returns a segment which can take `num_vertices` more vertices. The latest segment is
    /// reused if it has room, has the same `sort_key` and no new segment was forced.
    pub fn prepare_segment<V: StructArrayLayout, I: StructArrayLayout>(
        &mut self,
        num_vertices: usize,
        layout_vertex_array: &StructArray<V>,
        index_array: &StructArray<I>,
        sort_key: Option<f64>,
    ) -> &mut Segment {
        if num_vertices > self.max_vertex_array_length {
            warn_once(
                "segment-overflow",
                format_args!(
                    "Max vertices per segment is {}: bucket requested {num_vertices}. \
                     Consider using fill_large_mesh_arrays if you require meshes with more than {} vertices.",
                    self.max_vertex_array_length, self.max_vertex_array_length
                ),
            );
        }

        let reuse = match self.segments.last() {
            Some(last) => {
                !self.force_new_segment_on_next_prepare
                    && last.vertex_length + num_vertices <= self.max_vertex_array_length
                    && last.sort_key == sort_key
            }
            None => false,
        };

        if reuse {
            let last = self.segments.len() - 1;
            &mut self.segments[last]
        } else {
            self.create_new_segment(layout_vertex_array, index_array, sort_key)
        }
    }

    /// Appends an empty segment starting at the current ends of the buffers.
    pub fn create_new_segment<V: StructArrayLayout, I: StructArrayLayout>(
        &mut self,
        layout_vertex_array: &StructArray<V>,
        index_array: &StructArray<I>,
        sort_key: Option<f64>,
    ) -> &mut Segment {
        let segment = Segment {
            vertex_offset: layout_vertex_array.len(),
            primitive_offset: index_array.len(),
            vertex_length: 0,
            primitive_length: 0,
            sort_key,
        };

        if let Some(last) = self.segments.last() {
            debug_assert!(last.vertex_offset + last.vertex_length <= segment.vertex_offset);
        }

        self.segments.push(segment);
        self.force_new_segment_on_next_prepare = false;

        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }

    /// Returns the latest segment, or a new one if there is none or a new segment was forced.
    pub fn get_or_create_latest_segment<V: StructArrayLayout, I: StructArrayLayout>(
        &mut self,
        layout_vertex_array: &StructArray<V>,
        index_array: &StructArray<I>,
        sort_key: Option<f64>,
    ) -> &mut Segment {
        self.prepare_segment(0, layout_vertex_array, index_array, sort_key)
    }

    /// The next [`SegmentVector::prepare_segment`] will not reuse the latest segment.
    pub fn force_new_segment_on_next_prepare(&mut self) {
        self.force_new_segment_on_next_prepare = true;
    }

    pub fn last_mut(&mut self) -> Option<&mut Segment> {
        self.segments.last_mut()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        segment::SegmentVector,
        struct_array::{PosArray, TriangleIndexArray},
        util::warn_once,
    };

    /// Prepares a segment for `vertices` vertices and writes them like a bucket would.
    fn use_segment(
        segments: &mut SegmentVector,
        vertices: &mut PosArray,
        indices: &TriangleIndexArray,
        count: usize,
    ) -> usize {
        let segment = segments.prepare_segment(count, vertices, indices, None);
        segment.vertex_length += count;
        vertices.resize(vertices.len() + count);
        segments.len() - 1
    }

    #[test]
    fn test_simple_segment() {
        let segments = SegmentVector::simple_segment(0, 0, 10, 0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments.segments()[0].vertex_length, 10);
    }

    #[test]
    fn test_prepare_segment_returns_segment() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let segment =
            segments.prepare_segment(10, &PosArray::new(), &TriangleIndexArray::new(), None);
        assert_eq!(segment.vertex_length, 0);
        assert_eq!(segment.vertex_offset, 0);
    }

    #[test]
    fn test_prepare_segment_handles_overflow() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        let first = use_segment(&mut segments, &mut vertices, &indices, 10);
        let second = use_segment(&mut segments, &mut vertices, &indices, 10);

        assert_ne!(first, second);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments.segments()[0].vertex_length, 10);
        assert_eq!(segments.segments()[1].vertex_length, 10);
        assert_eq!(segments.segments()[1].vertex_offset, 10);
    }

    #[test]
    fn test_prepare_segment_reuses_segments() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        let first = use_segment(&mut segments, &mut vertices, &indices, 5);
        let second = use_segment(&mut segments, &mut vertices, &indices, 5);

        assert_eq!(first, second);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments.segments()[0].vertex_length, 10);
    }

    #[test]
    fn test_prepare_segment_splits_sort_keys() {
        let mut segments = SegmentVector::new();
        let vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        segments.prepare_segment(4, &vertices, &indices, Some(1.0));
        segments.prepare_segment(4, &vertices, &indices, Some(1.0));
        assert_eq!(segments.len(), 1);

        segments.prepare_segment(4, &vertices, &indices, Some(2.0));
        assert_eq!(segments.len(), 2);

        segments.prepare_segment(4, &vertices, &indices, None);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments.segments()[2].sort_key, None);
    }

    #[test]
    fn test_create_new_segment() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        let first = use_segment(&mut segments, &mut vertices, &indices, 5);
        segments
            .create_new_segment(&vertices, &indices, None)
            .vertex_length += 5;
        let second = segments.len() - 1;
        vertices.resize(vertices.len() + 5);
        let third = use_segment(&mut segments, &mut vertices, &indices, 5);

        assert_ne!(first, second);
        assert_eq!(second, third);
        assert_eq!(segments.segments()[0].vertex_length, 5);
        assert_eq!(segments.segments()[1].vertex_length, 10);
        assert_eq!(segments.segments()[1].vertex_offset, 5);
    }

    #[test]
    fn test_force_new_segment() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        let first = use_segment(&mut segments, &mut vertices, &indices, 5);
        segments.force_new_segment_on_next_prepare();
        let second = use_segment(&mut segments, &mut vertices, &indices, 5);
        let third = use_segment(&mut segments, &mut vertices, &indices, 5);

        assert_ne!(first, second);
        assert_eq!(second, third);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_create_new_segment_resets_force_flag() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        use_segment(&mut segments, &mut vertices, &indices, 5);
        segments.force_new_segment_on_next_prepare();
        segments.create_new_segment(&vertices, &indices, None);
        let latest = segments
            .get_or_create_latest_segment(&vertices, &indices, None)
            .vertex_offset;

        assert_eq!(segments.len(), 2);
        assert_eq!(latest, 5);
    }

    #[test]
    fn test_oversized_request_still_creates_segment() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        use_segment(&mut segments, &mut vertices, &indices, 4);
        use_segment(&mut segments, &mut vertices, &indices, 40);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments.segments()[1].vertex_length, 40);
    }

    #[test]
    fn test_oversized_request_warns_once() {
        let mut segments = SegmentVector::with_max_vertex_array_length(16);
        let mut vertices = PosArray::new();
        let indices = TriangleIndexArray::new();

        use_segment(&mut segments, &mut vertices, &indices, 40);
        use_segment(&mut segments, &mut vertices, &indices, 50);

        assert!(!warn_once("segment-overflow", format_args!("requested 60")));
    }
}
