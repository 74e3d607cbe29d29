//! How finely geometry is subdivided at a given zoom level.

use serde::{Deserialize, Serialize};

use crate::error::BucketError;

/// Granularity which halves with every zoom level, starting at `base_zoom_granularity` for
/// zoom 0 and never going below `min_granularity`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "RawGranularityExpression")]
pub struct SubdivisionGranularityExpression {
    base_zoom_granularity: u32,
    min_granularity: u32,
}

#[derive(Deserialize)]
struct RawGranularityExpression {
    base_zoom_granularity: u32,
    min_granularity: u32,
}

impl TryFrom<RawGranularityExpression> for SubdivisionGranularityExpression {
    type Error = BucketError;

    fn try_from(raw: RawGranularityExpression) -> Result<Self, Self::Error> {
        Self::new(raw.base_zoom_granularity, raw.min_granularity)
    }
}

impl SubdivisionGranularityExpression {
    pub fn new(base_zoom_granularity: u32, min_granularity: u32) -> Result<Self, BucketError> {
        if min_granularity > base_zoom_granularity {
            return Err(BucketError::InvalidGranularity {
                base: base_zoom_granularity,
                min: min_granularity,
            });
        }
        Ok(Self {
            base_zoom_granularity,
            min_granularity,
        })
    }

    /// No subdivision at any zoom level.
    pub const fn none() -> Self {
        Self {
            base_zoom_granularity: 0,
            min_granularity: 0,
        }
    }

    pub fn get_granularity_for_zoom_level(&self, zoom: u8) -> u32 {
        let divisor = 1u64 << zoom.min(63);
        let granularity = (self.base_zoom_granularity as u64 / divisor) as u32;
        granularity.max(self.min_granularity).max(1)
    }
}

/// Granularity of tessellated circles, either constant or stepping with the zoom level.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CircleGranularity {
    Constant(u32),
    /// Pairs of minimum zoom and granularity, ordered by zoom
    Stops(Vec<(u8, u32)>),
}

impl CircleGranularity {
    pub fn get_granularity_for_zoom_level(&self, zoom: u8) -> u32 {
        match self {
            CircleGranularity::Constant(granularity) => *granularity,
            CircleGranularity::Stops(stops) => stops
                .iter()
                .take_while(|(stop_zoom, _)| *stop_zoom <= zoom)
                .last()
                .or_else(|| stops.first())
                .map_or(1, |(_, granularity)| *granularity),
        }
    }
}

impl Default for CircleGranularity {
    fn default() -> Self {
        CircleGranularity::Constant(1)
    }
}

/// Subdivision settings of a projection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubdivisionGranularitySetting {
    pub fill: SubdivisionGranularityExpression,
    pub line: SubdivisionGranularityExpression,
    #[serde(default)]
    pub circle: CircleGranularity,
}

impl SubdivisionGranularitySetting {
    /// Settings which never subdivide, used for flat projections.
    pub const fn none() -> Self {
        Self {
            fill: SubdivisionGranularityExpression::none(),
            line: SubdivisionGranularityExpression::none(),
            circle: CircleGranularity::Constant(1),
        }
    }

    /// Settings for geometry drawn on a globe.
    pub fn globe() -> Self {
        Self {
            fill: SubdivisionGranularityExpression {
                base_zoom_granularity: 128,
                min_granularity: 1,
            },
            line: SubdivisionGranularityExpression {
                base_zoom_granularity: 512,
                min_granularity: 1,
            },
            circle: CircleGranularity::Constant(3),
        }
    }
}

impl Default for SubdivisionGranularitySetting {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::style::granularity::{
        CircleGranularity, SubdivisionGranularityExpression, SubdivisionGranularitySetting,
    };

    #[test]
    fn test_granularity_halves_per_zoom() {
        let expression = SubdivisionGranularityExpression::new(128, 2).unwrap();
        assert_eq!(expression.get_granularity_for_zoom_level(0), 128);
        assert_eq!(expression.get_granularity_for_zoom_level(1), 64);
        assert_eq!(expression.get_granularity_for_zoom_level(5), 4);
        assert_eq!(expression.get_granularity_for_zoom_level(6), 2);
        assert_eq!(expression.get_granularity_for_zoom_level(12), 2);
    }

    #[test]
    fn test_granularity_is_at_least_one() {
        assert_eq!(
            SubdivisionGranularityExpression::none().get_granularity_for_zoom_level(0),
            1
        );
        let expression = SubdivisionGranularityExpression::new(8, 0).unwrap();
        assert_eq!(expression.get_granularity_for_zoom_level(20), 1);
    }

    #[test]
    fn test_min_above_base_is_rejected() {
        assert!(SubdivisionGranularityExpression::new(4, 8).is_err());
        let result: Result<SubdivisionGranularityExpression, _> =
            serde_json::from_value(json!({"base_zoom_granularity": 4, "min_granularity": 8}));
        assert!(result.is_err());
    }

    #[test]
    fn test_circle_stops() {
        let circle = CircleGranularity::Stops(vec![(0, 7), (4, 5), (8, 3)]);
        assert_eq!(circle.get_granularity_for_zoom_level(0), 7);
        assert_eq!(circle.get_granularity_for_zoom_level(5), 5);
        assert_eq!(circle.get_granularity_for_zoom_level(14), 3);
        assert_eq!(CircleGranularity::Constant(3).get_granularity_for_zoom_level(2), 3);
    }

    #[test]
    fn test_deserialize_setting() {
        let setting: SubdivisionGranularitySetting = serde_json::from_value(json!({
            "fill": {"base_zoom_granularity": 128, "min_granularity": 1},
            "line": {"base_zoom_granularity": 512, "min_granularity": 1},
            "circle": 3
        }))
        .unwrap();
        assert_eq!(setting, SubdivisionGranularitySetting::globe());
    }
}
