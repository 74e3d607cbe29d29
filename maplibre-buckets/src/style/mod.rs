//! Style layers with the layout and paint properties which shape the buckets.
//!
//! Only properties which change the produced geometry are modelled. Layers deserialize from the
//! usual style JSON, other keys are ignored.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::geometry::PropertyMap;

pub mod granularity;

/// A property which is either constant or read from the feature properties.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue<T> {
    Constant(T),
    Expression(serde_json::Value),
}

impl<T: DeserializeOwned + Clone> PropertyValue<T> {
    pub fn is_constant(&self) -> bool {
        matches!(self, PropertyValue::Constant(_))
    }

    /// Evaluates the property for a feature. Supports `["get", name]` and
    /// `["match", ["get", name], label, value, ..., fallback]`.
    pub fn evaluate(&self, properties: &PropertyMap) -> Option<T> {
        match self {
            PropertyValue::Constant(value) => Some(value.clone()),
            PropertyValue::Expression(expression) => evaluate_expression(expression, properties)
                .and_then(|value| serde_json::from_value(value).ok()),
        }
    }

    /// Like [`PropertyValue::evaluate`], falling back to `default`.
    pub fn evaluate_or(&self, properties: &PropertyMap, default: T) -> T {
        self.evaluate(properties).unwrap_or(default)
    }
}

fn evaluate_expression(
    expression: &serde_json::Value,
    properties: &PropertyMap,
) -> Option<serde_json::Value> {
    let array = expression.as_array()?;
    match array.first()?.as_str()? {
        "get" => properties.get(array.get(1)?.as_str()?).cloned(),
        "literal" => array.get(1).cloned(),
        "match" if array.len() > 3 => {
            let input = evaluate_expression(array.get(1)?, properties);
            let fallback = array.last().cloned();

            let Some(input) = input else {
                return fallback;
            };

            for pair in array[2..array.len() - 1].chunks_exact(2) {
                let matches = match &pair[0] {
                    serde_json::Value::Array(labels) => labels.contains(&input),
                    label => *label == input,
                };
                if matches {
                    return Some(pair[1].clone());
                }
            }
            fallback
        }
        _ => None,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Bevel,
    Round,
    Miter,
    /// Round join approximated with a triangle fan
    FakeRound,
    /// Bevel join for corners too sharp for a regular bevel
    FlipBevel,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PitchAlignment {
    Map,
    #[default]
    Viewport,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct CircleLayout {
    #[serde(rename = "circle-sort-key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_sort_key: Option<PropertyValue<f64>>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct CirclePaint {
    #[serde(rename = "circle-pitch-alignment", default)]
    pub circle_pitch_alignment: PitchAlignment,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct FillLayout {
    #[serde(rename = "fill-sort-key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_sort_key: Option<PropertyValue<f64>>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct FillPaint {
    #[serde(rename = "fill-pattern")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_pattern: Option<PropertyValue<String>>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct FillExtrusionPaint {
    #[serde(rename = "fill-extrusion-pattern")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_extrusion_pattern: Option<PropertyValue<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LineLayout {
    #[serde(rename = "line-cap", default = "LineLayout::default_cap")]
    pub line_cap: LineCap,
    #[serde(rename = "line-join", default = "LineLayout::default_join")]
    pub line_join: PropertyValue<LineJoin>,
    #[serde(rename = "line-miter-limit", default = "LineLayout::default_miter_limit")]
    pub line_miter_limit: f64,
    #[serde(rename = "line-round-limit", default = "LineLayout::default_round_limit")]
    pub line_round_limit: f64,
    #[serde(rename = "line-sort-key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_sort_key: Option<PropertyValue<f64>>,
}

impl LineLayout {
    fn default_cap() -> LineCap {
        LineCap::Butt
    }

    fn default_join() -> PropertyValue<LineJoin> {
        PropertyValue::Constant(LineJoin::Miter)
    }

    fn default_miter_limit() -> f64 {
        2.0
    }

    fn default_round_limit() -> f64 {
        1.05
    }
}

impl Default for LineLayout {
    fn default() -> Self {
        Self {
            line_cap: Self::default_cap(),
            line_join: Self::default_join(),
            line_miter_limit: Self::default_miter_limit(),
            line_round_limit: Self::default_round_limit(),
            line_sort_key: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct LinePaint {
    #[serde(rename = "line-pattern")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_pattern: Option<PropertyValue<String>>,
}

/// The layer types which produce geometry buckets.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerProperties {
    Circle {
        #[serde(default)]
        layout: CircleLayout,
        #[serde(default)]
        paint: CirclePaint,
    },
    /// Heatmaps are drawn from circle buckets
    Heatmap {},
    Fill {
        #[serde(default)]
        layout: FillLayout,
        #[serde(default)]
        paint: FillPaint,
    },
    FillExtrusion {
        #[serde(default)]
        paint: FillExtrusionPaint,
    },
    Line {
        #[serde(default)]
        layout: LineLayout,
        #[serde(default)]
        paint: LinePaint,
    },
    /// Layers like symbols or rasters which have no bucket here
    #[serde(other)]
    Unsupported,
}

impl LayerProperties {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerProperties::Circle { .. } => "circle",
            LayerProperties::Heatmap {} => "heatmap",
            LayerProperties::Fill { .. } => "fill",
            LayerProperties::FillExtrusion { .. } => "fill-extrusion",
            LayerProperties::Line { .. } => "line",
            LayerProperties::Unsupported => "unsupported",
        }
    }
}

/// A style layer which draws features of one source layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "source-layer")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
    #[serde(flatten)]
    pub properties: LayerProperties,
}

impl StyleLayer {
    pub fn new(
        id: impl Into<String>,
        source_layer: impl Into<String>,
        properties: LayerProperties,
    ) -> Self {
        Self {
            id: id.into(),
            source_layer: Some(source_layer.into()),
            minzoom: None,
            maxzoom: None,
            properties,
        }
    }

    /// Whether the layer is drawn at `zoom`.
    pub fn is_visible_at(&self, zoom: f64) -> bool {
        self.minzoom.map_or(true, |minzoom| zoom >= minzoom)
            && self.maxzoom.map_or(true, |maxzoom| zoom < maxzoom)
    }

    /// The pattern property of the layer, if its type supports patterns.
    pub fn pattern(&self) -> Option<&PropertyValue<String>> {
        match &self.properties {
            LayerProperties::Fill { paint, .. } => paint.fill_pattern.as_ref(),
            LayerProperties::FillExtrusion { paint } => paint.fill_extrusion_pattern.as_ref(),
            LayerProperties::Line { paint, .. } => paint.line_pattern.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        geometry::PropertyMap,
        style::{LayerProperties, LineCap, LineJoin, PitchAlignment, PropertyValue, StyleLayer},
    };

    fn properties(value: serde_json::Value) -> PropertyMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => PropertyMap::new(),
        }
    }

    #[test]
    fn test_deserialize_line_layer() {
        let layer: StyleLayer = serde_json::from_value(json!({
            "id": "roads",
            "type": "line",
            "source": "openmaptiles",
            "source-layer": "transportation",
            "layout": {
                "line-join": "round",
                "line-cap": "square",
                "line-miter-limit": 3
            },
            "paint": {
                "line-color": "#fff"
            }
        }))
        .unwrap();

        assert_eq!(layer.id, "roads");
        assert_eq!(layer.source_layer.as_deref(), Some("transportation"));
        let LayerProperties::Line { layout, paint } = layer.properties else {
            panic!("expected a line layer");
        };
        assert_eq!(layout.line_join, PropertyValue::Constant(LineJoin::Round));
        assert_eq!(layout.line_cap, LineCap::Square);
        assert_eq!(layout.line_miter_limit, 3.0);
        assert_eq!(layout.line_round_limit, 1.05);
        assert!(paint.line_pattern.is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let layer: StyleLayer = serde_json::from_value(json!({
            "id": "points",
            "type": "circle",
            "source-layer": "poi"
        }))
        .unwrap();

        let LayerProperties::Circle { layout, paint } = layer.properties else {
            panic!("expected a circle layer");
        };
        assert!(layout.circle_sort_key.is_none());
        assert_eq!(paint.circle_pitch_alignment, PitchAlignment::Viewport);
    }

    #[test]
    fn test_deserialize_unsupported_layer() {
        let layer: StyleLayer = serde_json::from_value(json!({
            "id": "labels",
            "type": "symbol",
            "source-layer": "place",
            "layout": {"text-field": "{name}"}
        }))
        .unwrap();
        assert!(matches!(layer.properties, LayerProperties::Unsupported));
    }

    #[test]
    fn test_evaluate_get() {
        let sort_key: PropertyValue<f64> = serde_json::from_value(json!(["get", "rank"])).unwrap();
        assert!(!sort_key.is_constant());
        assert_eq!(sort_key.evaluate(&properties(json!({"rank": 4}))), Some(4.0));
        assert_eq!(sort_key.evaluate(&properties(json!({}))), None);
        assert_eq!(sort_key.evaluate_or(&properties(json!({})), 0.0), 0.0);
    }

    #[test]
    fn test_evaluate_match() {
        let join: PropertyValue<LineJoin> = serde_json::from_value(json!([
            "match",
            ["get", "class"],
            ["motorway", "trunk"],
            "round",
            "rail",
            "bevel",
            "miter"
        ]))
        .unwrap();

        assert_eq!(
            join.evaluate(&properties(json!({"class": "trunk"}))),
            Some(LineJoin::Round)
        );
        assert_eq!(
            join.evaluate(&properties(json!({"class": "rail"}))),
            Some(LineJoin::Bevel)
        );
        assert_eq!(
            join.evaluate(&properties(json!({"class": "path"}))),
            Some(LineJoin::Miter)
        );
        assert_eq!(join.evaluate(&properties(json!({}))), Some(LineJoin::Miter));
    }

    #[test]
    fn test_visibility() {
        let mut layer = StyleLayer::new("a", "b", LayerProperties::Heatmap {});
        layer.minzoom = Some(5.0);
        layer.maxzoom = Some(10.0);
        assert!(!layer.is_visible_at(4.0));
        assert!(layer.is_visible_at(5.0));
        assert!(!layer.is_visible_at(10.0));
    }
}
