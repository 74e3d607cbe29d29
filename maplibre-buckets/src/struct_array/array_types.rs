//! Buffer layouts consumed by the upload stage. Member order and widths must stay stable.

struct_array! {
    /// Positions in tile space, also used for fill extrusion centroids.
    pub struct PosArray(PosLayout, align = 4) -> Pos {
        a_pos_x: i16,
        a_pos_y: i16,
    }
}

struct_array! {
    /// Circle center multiplied by 8 plus an extrusion in `0..8`, offset by `i16::MIN`.
    pub struct CircleLayoutArray(CircleLayout, align = 4) -> CircleLayoutVertex {
        a_pos_x: i16,
        a_pos_y: i16,
    }
}

struct_array! {
    pub struct FillLayoutArray(FillLayout, align = 4) -> FillLayoutVertex {
        a_pos_x: i16,
        a_pos_y: i16,
    }
}

struct_array! {
    /// Position plus the packed wall normal, the top flag and the edge distance.
    pub struct FillExtrusionLayoutArray(FillExtrusionLayout, align = 4) -> FillExtrusionLayoutVertex {
        a_pos_x: i16,
        a_pos_y: i16,
        a_normal_x: i16,
        a_normal_y: i16,
        a_normal_z: i16,
        a_edge_distance: i16,
    }
}

struct_array! {
    /// Doubled position with the round and up flags in the lowest bit, the extrusion scaled to
    /// `0..=255` and the distance along the line split over the remaining bytes.
    pub struct LineLayoutArray(LineLayout, align = 4) -> LineLayoutVertex {
        a_pos_normal_x: i16,
        a_pos_normal_y: i16,
        a_extrude_x: u8,
        a_extrude_y: u8,
        a_direction_linesofar: u8,
        a_linesofar: u8,
    }
}

struct_array! {
    /// Progress along a clipped line, used for gradients.
    pub struct LineExtLayoutArray(LineExtLayout, align = 4) -> LineExtLayoutVertex {
        a_uv_x: f32,
        a_split_index: f32,
    }
}

struct_array! {
    pub struct TriangleIndexArray(TriangleIndexLayout, align = 1) -> Triangle {
        vertex0: u16,
        vertex1: u16,
        vertex2: u16,
    }
}

struct_array! {
    pub struct LineIndexArray(LineIndexLayout, align = 1) -> LineIndex {
        vertex0: u16,
        vertex1: u16,
    }
}
