//! Geometry of decoded vector tile features in tile space.
//!
//! Features are stored in the extent of the layer they were decoded from. [`load_geometry`]
//! scales them to [`EXTENT`] before any bucket sees them.

use std::ops::{Deref, DerefMut};

use cgmath::Point2;
use serde::{Deserialize, Serialize};

use crate::{
    coords::EXTENT,
    util::{math::round_half_up, warn_once},
};

/// A point in tile space. Tessellators expect coordinates in `[0, EXTENT)` but must tolerate
/// values slightly outside, e.g. from tile buffers.
pub type GeometryCoordinate = Point2<i32>;

/// One ring of a polygon, one line string or a set of points.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct GeometryCoordinates(pub Vec<GeometryCoordinate>);

impl GeometryCoordinates {
    pub fn new() -> Self {
        Self(Vec::new())
    }
}

impl Deref for GeometryCoordinates {
    type Target = Vec<GeometryCoordinate>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for GeometryCoordinates {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<GeometryCoordinate>> for GeometryCoordinates {
    fn from(points: Vec<GeometryCoordinate>) -> Self {
        Self(points)
    }
}

impl FromIterator<GeometryCoordinate> for GeometryCoordinates {
    fn from_iter<T: IntoIterator<Item = GeometryCoordinate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub type GeometryCollection = Vec<GeometryCoordinates>;

pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl From<i32> for FeatureType {
    fn from(value: i32) -> Self {
        match value {
            1 => FeatureType::Point,
            2 => FeatureType::LineString,
            3 => FeatureType::Polygon,
            _ => FeatureType::Unknown,
        }
    }
}

/// A decoded feature of a vector tile layer.
#[derive(Clone, Debug)]
pub struct VectorTileFeature {
    pub id: Option<u64>,
    pub feature_type: FeatureType,
    pub properties: PropertyMap,
    /// Geometry in the coordinate space of `extent`
    pub geometry: GeometryCollection,
    pub extent: u32,
}

impl VectorTileFeature {
    pub fn new(feature_type: FeatureType, geometry: GeometryCollection) -> Self {
        Self {
            id: None,
            feature_type,
            properties: PropertyMap::new(),
            geometry,
            extent: EXTENT as u32,
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }
}

/// Line vertices store their position doubled in a signed 16-bit integer, so only 15 bits are
/// available.
const BITS: u32 = 15;
pub const MAX_COORDINATE: i32 = (1 << (BITS - 1)) - 1;
pub const MIN_COORDINATE: i32 = -MAX_COORDINATE - 1;

/// Scales the geometry of `feature` to [`EXTENT`]. Coordinates outside of the encodable range
/// are clamped.
pub fn load_geometry(feature: &VectorTileFeature) -> GeometryCollection {
    let scale = EXTENT as f64 / feature.extent.max(1) as f64;

    feature
        .geometry
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|point| {
                    let x = round_half_up(point.x as f64 * scale) as i32;
                    let y = round_half_up(point.y as f64 * scale) as i32;

                    if !(MIN_COORDINATE..=MAX_COORDINATE).contains(&x)
                        || !(MIN_COORDINATE..=MAX_COORDINATE).contains(&y)
                    {
                        warn_once(
                            "geometry-extent",
                            format_args!(
                                "Geometry exceeds allowed extent, reduce your vector tile buffer size"
                            ),
                        );
                    }

                    Point2::new(
                        x.clamp(MIN_COORDINATE, MAX_COORDINATE),
                        y.clamp(MIN_COORDINATE, MAX_COORDINATE),
                    )
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use crate::geometry::{
        load_geometry, FeatureType, GeometryCoordinates, VectorTileFeature, MAX_COORDINATE,
        MIN_COORDINATE,
    };

    #[test]
    fn test_scales_to_extent() {
        let mut feature = VectorTileFeature::new(
            FeatureType::LineString,
            vec![GeometryCoordinates(vec![
                Point2::new(0, 0),
                Point2::new(2048, 4096),
            ])],
        );
        feature.extent = 4096;

        let geometry = load_geometry(&feature);
        assert_eq!(
            geometry[0].0,
            vec![Point2::new(0, 0), Point2::new(4096, 8192)]
        );
    }

    #[test]
    fn test_clamps_out_of_range() {
        let feature = VectorTileFeature::new(
            FeatureType::Point,
            vec![GeometryCoordinates(vec![
                Point2::new(-100000, 5),
                Point2::new(5, 100000),
            ])],
        );

        let geometry = load_geometry(&feature);
        assert_eq!(
            geometry[0].0,
            vec![
                Point2::new(MIN_COORDINATE, 5),
                Point2::new(5, MAX_COORDINATE)
            ]
        );
    }
}
