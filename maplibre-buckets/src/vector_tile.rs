//! Decodes [Mapbox Vector Tiles](https://github.com/mapbox/vector-tile-spec) into
//! [`VectorTileFeature`]s.

use geozero::{
    mvt::{tile, Message, Tile},
    ColumnValue, FeatureProcessor, GeomProcessor, GeozeroDatasource, PropertyProcessor,
};

use crate::{
    error::BucketError,
    geometry::{
        FeatureType, GeometryCollection, GeometryCoordinate, GeometryCoordinates, PropertyMap,
        VectorTileFeature,
    },
};

type GeoResult<T> = geozero::error::Result<T>;

/// Extent of layers which do not specify one.
pub const DEFAULT_LAYER_EXTENT: u32 = 4096;

#[derive(Debug, Clone)]
pub struct VectorTileLayer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<VectorTileFeature>,
}

/// All layers of a decoded tile.
#[derive(Debug, Clone, Default)]
pub struct VectorTileData {
    pub layers: Vec<VectorTileLayer>,
}

impl VectorTileData {
    pub fn layer(&self, name: &str) -> Option<&VectorTileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

pub fn decode_tile(data: &[u8]) -> Result<VectorTileData, BucketError> {
    let mut tile = Tile::decode(data).map_err(|e| BucketError::Decode(Box::new(e)))?;

    let layers = tile
        .layers
        .iter_mut()
        .map(decode_layer)
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("decoded {} layers", layers.len());
    Ok(VectorTileData { layers })
}

pub fn decode_layer(layer: &mut tile::Layer) -> Result<VectorTileLayer, BucketError> {
    let extent = layer.extent.unwrap_or(DEFAULT_LAYER_EXTENT);

    let mut collector = FeatureCollector::new(extent);
    layer
        .process(&mut collector)
        .map_err(|e| BucketError::Decode(Box::new(e)))?;

    let mut features = collector.features;
    for (feature, raw) in features.iter_mut().zip(&layer.features) {
        feature.id = raw.id;
    }

    Ok(VectorTileLayer {
        name: layer.name.clone(),
        extent,
        features,
    })
}

/// Collects the features of a layer in their raw integer coordinates.
struct FeatureCollector {
    extent: u32,
    features: Vec<VectorTileFeature>,

    feature_type: FeatureType,
    properties: PropertyMap,
    geometry: GeometryCollection,
    ring: GeometryCoordinates,
    in_multipoint: bool,
}

impl FeatureCollector {
    fn new(extent: u32) -> Self {
        Self {
            extent,
            features: Vec::new(),
            feature_type: FeatureType::Unknown,
            properties: PropertyMap::new(),
            geometry: GeometryCollection::new(),
            ring: GeometryCoordinates::new(),
            in_multipoint: false,
        }
    }

    fn finish_ring(&mut self) {
        let ring = std::mem::take(&mut self.ring);
        if !ring.is_empty() {
            self.geometry.push(ring);
        }
    }
}

impl GeomProcessor for FeatureCollector {
    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> GeoResult<()> {
        let point = GeometryCoordinate::new(x as i32, y as i32);
        if self.in_multipoint {
            // Every point of a multi point is a ring of its own
            self.geometry.push(GeometryCoordinates(vec![point]));
        } else {
            self.ring.push(point);
        }
        Ok(())
    }

    fn point_begin(&mut self, _idx: usize) -> GeoResult<()> {
        self.feature_type = FeatureType::Point;
        self.ring = GeometryCoordinates::new();
        Ok(())
    }

    fn point_end(&mut self, _idx: usize) -> GeoResult<()> {
        self.finish_ring();
        Ok(())
    }

    fn multipoint_begin(&mut self, _size: usize, _idx: usize) -> GeoResult<()> {
        self.feature_type = FeatureType::Point;
        self.in_multipoint = true;
        Ok(())
    }

    fn multipoint_end(&mut self, _idx: usize) -> GeoResult<()> {
        self.in_multipoint = false;
        Ok(())
    }

    fn linestring_begin(&mut self, tagged: bool, size: usize, _idx: usize) -> GeoResult<()> {
        // Untagged line strings are usually rings of a polygon
        if tagged || self.feature_type == FeatureType::Unknown {
            self.feature_type = FeatureType::LineString;
        }
        self.ring = GeometryCoordinates(Vec::with_capacity(size));
        Ok(())
    }

    fn linestring_end(&mut self, _tagged: bool, _idx: usize) -> GeoResult<()> {
        self.finish_ring();
        Ok(())
    }

    fn multilinestring_begin(&mut self, _size: usize, _idx: usize) -> GeoResult<()> {
        self.feature_type = FeatureType::LineString;
        Ok(())
    }

    fn polygon_begin(&mut self, _tagged: bool, _size: usize, _idx: usize) -> GeoResult<()> {
        self.feature_type = FeatureType::Polygon;
        Ok(())
    }

    fn multipolygon_begin(&mut self, _size: usize, _idx: usize) -> GeoResult<()> {
        self.feature_type = FeatureType::Polygon;
        Ok(())
    }
}

impl PropertyProcessor for FeatureCollector {
    fn property(&mut self, _idx: usize, name: &str, value: &ColumnValue) -> GeoResult<bool> {
        let value = match value {
            ColumnValue::Byte(v) => serde_json::Value::from(*v),
            ColumnValue::UByte(v) => serde_json::Value::from(*v),
            ColumnValue::Bool(v) => serde_json::Value::from(*v),
            ColumnValue::Short(v) => serde_json::Value::from(*v),
            ColumnValue::UShort(v) => serde_json::Value::from(*v),
            ColumnValue::Int(v) => serde_json::Value::from(*v),
            ColumnValue::UInt(v) => serde_json::Value::from(*v),
            ColumnValue::Long(v) => serde_json::Value::from(*v),
            ColumnValue::ULong(v) => serde_json::Value::from(*v),
            ColumnValue::Float(v) => serde_json::Value::from(*v as f64),
            ColumnValue::Double(v) => serde_json::Value::from(*v),
            ColumnValue::String(v) => serde_json::Value::from(*v),
            _ => serde_json::Value::Null,
        };
        self.properties.insert(name.to_string(), value);
        // Continue with the next property
        Ok(false)
    }
}

impl FeatureProcessor for FeatureCollector {
    fn feature_begin(&mut self, _idx: u64) -> GeoResult<()> {
        self.feature_type = FeatureType::Unknown;
        self.properties = PropertyMap::new();
        self.geometry = GeometryCollection::new();
        self.ring = GeometryCoordinates::new();
        self.in_multipoint = false;
        Ok(())
    }

    fn feature_end(&mut self, _idx: u64) -> GeoResult<()> {
        let mut feature = VectorTileFeature::new(
            self.feature_type,
            std::mem::take(&mut self.geometry),
        )
        .with_properties(std::mem::take(&mut self.properties));
        feature.extent = self.extent;
        self.features.push(feature);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;
    use geozero::mvt::{tile, Message, Tile};

    use crate::{
        error::BucketError,
        geometry::{load_geometry, FeatureType},
        vector_tile::decode_tile,
    };

    const MOVE_TO_1: u32 = 1 | (1 << 3);
    const CLOSE_PATH: u32 = 7 | (1 << 3);

    fn line_to(count: u32) -> u32 {
        2 | (count << 3)
    }

    fn zigzag(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }

    fn encode(layers: Vec<tile::Layer>) -> Vec<u8> {
        Tile { layers }.encode_to_vec()
    }

    fn layer(name: &str, extent: Option<u32>, features: Vec<tile::Feature>) -> tile::Layer {
        tile::Layer {
            version: 2,
            name: name.to_string(),
            features,
            keys: vec!["name".to_string(), "height".to_string()],
            values: vec![
                tile::Value {
                    string_value: Some("Isar".to_string()),
                    ..Default::default()
                },
                tile::Value {
                    int_value: Some(12),
                    ..Default::default()
                },
            ],
            extent,
        }
    }

    #[test]
    fn test_point_with_properties() {
        let data = encode(vec![layer(
            "poi",
            Some(4096),
            vec![tile::Feature {
                id: Some(42),
                tags: vec![0, 0, 1, 1],
                r#type: Some(tile::GeomType::Point as i32),
                geometry: vec![MOVE_TO_1, zigzag(25), zigzag(17)],
            }],
        )]);

        let tile = decode_tile(&data).unwrap();
        let layer = tile.layer("poi").unwrap();
        assert_eq!(layer.extent, 4096);
        assert_eq!(layer.features.len(), 1);

        let feature = &layer.features[0];
        assert_eq!(feature.id, Some(42));
        assert_eq!(feature.feature_type, FeatureType::Point);
        assert_eq!(feature.geometry[0].0, vec![Point2::new(25, 17)]);
        assert_eq!(feature.properties["name"], "Isar");
        assert_eq!(feature.properties["height"], 12);

        // Scaled from 4096 to the bucket extent
        assert_eq!(load_geometry(feature)[0].0, vec![Point2::new(50, 34)]);
    }

    #[test]
    fn test_line_string() {
        let data = encode(vec![layer(
            "river",
            None,
            vec![tile::Feature {
                id: None,
                tags: vec![0, 0],
                r#type: Some(tile::GeomType::Linestring as i32),
                geometry: vec![
                    MOVE_TO_1,
                    zigzag(2),
                    zigzag(2),
                    line_to(2),
                    zigzag(0),
                    zigzag(8),
                    zigzag(8),
                    zigzag(0),
                ],
            }],
        )]);

        let tile = decode_tile(&data).unwrap();
        let layer = tile.layer("river").unwrap();
        assert_eq!(layer.extent, 4096);

        let feature = &layer.features[0];
        assert_eq!(feature.feature_type, FeatureType::LineString);
        assert_eq!(feature.geometry.len(), 1);
        assert_eq!(
            feature.geometry[0].0,
            vec![Point2::new(2, 2), Point2::new(2, 10), Point2::new(10, 10)]
        );
    }

    #[test]
    fn test_polygon() {
        let data = encode(vec![layer(
            "water",
            Some(8192),
            vec![tile::Feature {
                id: Some(1),
                tags: vec![],
                r#type: Some(tile::GeomType::Polygon as i32),
                geometry: vec![
                    MOVE_TO_1,
                    zigzag(0),
                    zigzag(0),
                    line_to(2),
                    zigzag(10),
                    zigzag(0),
                    zigzag(0),
                    zigzag(10),
                    CLOSE_PATH,
                ],
            }],
        )]);

        let tile = decode_tile(&data).unwrap();
        let feature = &tile.layer("water").unwrap().features[0];
        assert_eq!(feature.feature_type, FeatureType::Polygon);
        assert_eq!(feature.geometry.len(), 1);
        assert!(feature.geometry[0].len() >= 3);
        assert_eq!(feature.geometry[0][0], Point2::new(0, 0));
        assert!(feature.properties.is_empty());
    }

    #[test]
    fn test_missing_layer() {
        let data = encode(vec![layer("water", None, vec![])]);
        let tile = decode_tile(&data).unwrap();
        assert!(tile.layer("water").unwrap().features.is_empty());
        assert!(tile.layer("roads").is_none());
    }

    #[test]
    fn test_invalid_data() {
        assert!(matches!(
            decode_tile(&[0xff, 0xff, 0xff]),
            Err(BucketError::Decode(_))
        ));
    }
}
