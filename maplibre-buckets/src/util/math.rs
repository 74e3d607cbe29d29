//! Small vector helpers shared by the tessellators.

use std::f64::consts::PI;

use cgmath::{InnerSpace, Vector2};

use crate::geometry::GeometryCoordinate;

/// Rotates `a` by 90 degrees counter clockwise in a y-down coordinate system.
pub fn perp(a: Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-a.y, a.x)
}

/// Normalizes `a`, leaving the zero vector untouched.
pub fn unit(a: Vector2<f64>) -> Vector2<f64> {
    let magnitude = a.magnitude();
    if magnitude == 0.0 {
        a
    } else {
        a / magnitude
    }
}

/// Rounds half-way cases towards positive infinity, so `-0.5` becomes `0`.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn rad2deg(rad: f64) -> f64 {
    rad * 180.0 / PI
}

pub fn dist(a: &GeometryCoordinate, b: &GeometryCoordinate) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Unit normal of the segment from `from` to `to`.
pub fn segment_normal(from: &GeometryCoordinate, to: &GeometryCoordinate) -> Vector2<f64> {
    let direction = Vector2::new((to.x - from.x) as f64, (to.y - from.y) as f64);
    perp(unit(direction))
}

/// Twice the signed area of `ring`. Positive for clockwise rings in a y-down coordinate system.
pub fn signed_area(ring: &[GeometryCoordinate]) -> i64 {
    let mut sum = 0i64;
    let len = ring.len();
    let mut j = len.wrapping_sub(1);
    for i in 0..len {
        let p1 = ring[i];
        let p2 = ring[j];
        sum += (p2.x as i64 - p1.x as i64) * (p1.y as i64 + p2.y as i64);
        j = i;
    }
    sum
}

/// Even-odd containment test of `point` in `ring`.
pub fn point_in_ring(point: &GeometryCoordinate, ring: &[GeometryCoordinate]) -> bool {
    let mut inside = false;
    let len = ring.len();
    let mut j = len.wrapping_sub(1);
    for i in 0..len {
        let p1 = ring[i];
        let p2 = ring[j];
        if (p1.y > point.y) != (p2.y > point.y) {
            let x_intersection = (p2.x - p1.x) as f64 * (point.y - p1.y) as f64
                / (p2.y - p1.y) as f64
                + p1.x as f64;
            if (point.x as f64) < x_intersection {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
