//! Errors which can happen while building buckets.

use thiserror::Error;

use crate::geometry::FeatureType;

#[derive(Error, Debug)]
pub enum BucketError {
    /// Circles can only be tessellated with 1, 3, 5 or 7 subdivisions per axis
    #[error("invalid circle bucket granularity: {0}; valid values are 1, 3, 5, 7")]
    InvalidCircleGranularity(u32),
    /// The bucket of a layer can not handle the geometry of a feature
    #[error("{feature_type:?} geometry of feature {index} is not supported by {layer_type} layer `{layer_id}`")]
    UnsupportedGeometry {
        layer_id: String,
        layer_type: &'static str,
        feature_type: FeatureType,
        index: usize,
    },
    /// A granularity expression is not usable
    #[error("min granularity {min} must not be larger than base granularity {base}")]
    InvalidGranularity { base: u32, min: u32 },
    /// The raw tile could not be decoded
    #[error("decoding vector tile failed")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}
