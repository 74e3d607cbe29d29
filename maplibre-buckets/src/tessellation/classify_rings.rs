//! Groups the rings of a polygon feature into outer rings and their holes.

use std::ops::Deref;

use crate::{
    geometry::{GeometryCoordinate, GeometryCoordinates},
    util::math::{point_in_ring, signed_area},
};

/// A ring together with its absolute area. The area is twice the geometric area, which is
/// what the shoelace sum yields.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedRing {
    pub ring: GeometryCoordinates,
    pub area: u64,
}

impl Deref for ClassifiedRing {
    type Target = GeometryCoordinates;

    fn deref(&self) -> &Self::Target {
        &self.ring
    }
}

/// An outer ring followed by its holes.
pub type ClassifiedPolygon = Vec<ClassifiedRing>;

struct Bounds {
    min: GeometryCoordinate,
    max: GeometryCoordinate,
}

impl Bounds {
    fn of(ring: &[GeometryCoordinate]) -> Self {
        let mut min = GeometryCoordinate::new(i32::MAX, i32::MAX);
        let mut max = GeometryCoordinate::new(i32::MIN, i32::MIN);
        for point in ring {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }
        Self { min, max }
    }

    fn contains(&self, other: &Bounds) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }
}

/// Splits `rings` into polygons. The winding of the first ring with an area defines the winding
/// of outer rings. A ring with the opposite winding becomes a hole of the most recent outer ring
/// which contains it, or of the most recent outer ring if none does. Rings without area are
/// dropped, unless the feature has a single ring.
///
/// Polygons with more than `max_rings` rings keep their outer ring and the largest holes.
pub fn classify_rings(
    rings: &[GeometryCoordinates],
    max_rings: Option<usize>,
) -> Vec<ClassifiedPolygon> {
    if rings.len() <= 1 {
        return rings
            .iter()
            .map(|ring| {
                vec![ClassifiedRing {
                    ring: ring.clone(),
                    area: signed_area(ring).unsigned_abs(),
                }]
            })
            .collect();
    }

    let mut polygons: Vec<(ClassifiedPolygon, Bounds)> = Vec::new();
    let mut outer_is_negative = None;

    for ring in rings {
        let signed_area = signed_area(ring);
        if signed_area == 0 {
            continue;
        }

        let is_negative = signed_area < 0;
        let outer_is_negative = *outer_is_negative.get_or_insert(is_negative);
        let classified = ClassifiedRing {
            ring: ring.clone(),
            area: signed_area.unsigned_abs(),
        };

        if is_negative == outer_is_negative {
            polygons.push((vec![classified], Bounds::of(ring)));
            continue;
        }

        let bounds = Bounds::of(ring);
        let container = polygons.iter_mut().rev().position(|(polygon, outer_bounds)| {
            outer_bounds.contains(&bounds) && point_in_ring(&ring[0], &polygon[0])
        });
        let index = match container {
            Some(reverse_index) => polygons.len() - 1 - reverse_index,
            // A hole before any outer ring can not be drawn
            None if polygons.is_empty() => continue,
            None => polygons.len() - 1,
        };
        polygons[index].0.push(classified);
    }

    polygons
        .into_iter()
        .map(|(mut polygon, _)| {
            if let Some(max_rings) = max_rings {
                if polygon.len() > max_rings {
                    polygon[1..].sort_by(|a, b| b.area.cmp(&a.area));
                    polygon.truncate(max_rings.max(1));
                }
            }
            polygon
        })
        .collect()
}
