//! Provides utilities related to coordinates.

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

/// Size of the integer coordinate space of one tile.
pub const EXTENT: i32 = 8192;
pub const TILE_SIZE: f64 = 512.0;

#[derive(
    Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Debug, Default, Serialize, Deserialize,
)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const fn new(z: u8) -> Self {
        ZoomLevel(z)
    }
}

impl Display for ZoomLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ZoomLevel {
    fn from(zoom_level: u8) -> Self {
        ZoomLevel(zoom_level)
    }
}

impl From<ZoomLevel> for u8 {
    fn from(val: ZoomLevel) -> Self {
        val.0
    }
}

/// [Slippy map tile names](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames) of the
/// data a tile was cut from.
///
/// # Coordinate System Origin
///
/// For Web Mercator the origin of the coordinate system is in the upper-left corner.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalTileId {
    pub z: ZoomLevel,
    pub x: u32,
    pub y: u32,
}

impl CanonicalTileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self {
            z: ZoomLevel::new(z),
            x,
            y,
        }
    }
}

impl From<(u32, u32, ZoomLevel)> for CanonicalTileId {
    fn from(tuple: (u32, u32, ZoomLevel)) -> Self {
        CanonicalTileId {
            x: tuple.0,
            y: tuple.1,
            z: tuple.2,
        }
    }
}

/// A tile which is displayed at `overscaled_z` while its data comes from `canonical`.
/// Rendering a zoom 14 tile at zoom 16 gives an overscale factor of 4.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct OverscaledTileId {
    pub overscaled_z: ZoomLevel,
    pub wrap: i16,
    pub canonical: CanonicalTileId,
}

impl OverscaledTileId {
    pub fn new(overscaled_z: u8, wrap: i16, z: u8, x: u32, y: u32) -> Self {
        debug_assert!(overscaled_z >= z);
        Self {
            overscaled_z: ZoomLevel::new(overscaled_z),
            wrap,
            canonical: CanonicalTileId::new(z, x, y),
        }
    }

    pub fn overscale_factor(&self) -> u32 {
        let overscaled_z = u8::from(self.overscaled_z);
        let z = u8::from(self.canonical.z);
        1 << overscaled_z.saturating_sub(z)
    }
}

impl Display for CanonicalTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T(x={x},y={y},z={z})",
            x = self.x,
            y = self.y,
            z = self.z
        )
    }
}

impl Display for OverscaledTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OT(x={x},y={y},z={z},oz={oz},w={w})",
            x = self.canonical.x,
            y = self.canonical.y,
            z = self.canonical.z,
            oz = self.overscaled_z,
            w = self.wrap
        )
    }
}
