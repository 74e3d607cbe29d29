//! Tessellation for polygons and meshes is implemented here. Lines are tessellated by the
//! [`crate::bucket::LineBucket`] itself.

use crate::geometry::GeometryCoordinates;

pub mod classify_rings;
pub mod fill_large_mesh_arrays;
pub mod subdivision;

/// Polygons with more rings are reduced to this many, dropping the smallest holes.
pub const EARCUT_MAX_RINGS: usize = 500;

/// Index data type of the triangulation, local to the flattened vertex list.
pub type IndexDataType = u32;

/// Flattens `rings` into `x, y` pairs and returns them together with the triangle indices of the
/// polygon. The first ring is the outer ring, all other rings are holes.
pub fn earcut_polygon(rings: &[GeometryCoordinates]) -> (Vec<i32>, Vec<IndexDataType>) {
    let mut flattened = Vec::new();
    let mut hole_indices = Vec::new();

    for (i, ring) in rings.iter().enumerate() {
        if ring.is_empty() {
            continue;
        }
        if i != 0 {
            hole_indices.push(flattened.len() / 2);
        }
        for point in ring.iter() {
            flattened.push(point.x);
            flattened.push(point.y);
        }
    }

    let coordinates: Vec<f64> = flattened.iter().map(|v| *v as f64).collect();
    let indices = match earcutr::earcut(&coordinates, &hole_indices, 2) {
        Ok(indices) => indices.into_iter().map(|i| i as IndexDataType).collect(),
        Err(e) => {
            log::warn!("triangulation of polygon with {} rings failed: {e:?}", rings.len());
            Vec::new()
        }
    };

    (flattened, indices)
}
