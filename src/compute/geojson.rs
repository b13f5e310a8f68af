//! GeoJSON export of features for map display.

use crate::compute::feature::Feature;
use crate::error::{GridJoinError, Result};
use geo::{LineString, MultiPolygon};
use geojson::feature::Id;
use geojson::{FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

fn ring_to_positions(ring: &LineString<f64>) -> Vec<Vec<f64>> {
    ring.coords().map(|coord| vec![coord.x, coord.y]).collect()
}

/// Converts a MultiPolygon to a GeoJSON geometry.
pub fn multipolygon_to_geometry(geometry: &MultiPolygon<f64>) -> Geometry {
    let polygons = geometry
        .iter()
        .map(|polygon| {
            let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
            rings.push(ring_to_positions(polygon.exterior()));
            rings.extend(polygon.interiors().iter().map(ring_to_positions));
            rings
        })
        .collect();

    Geometry::new(Value::MultiPolygon(polygons))
}

/// GeoJSON feature carrying the geometry and `id` / `area` properties.
pub fn feature_to_geojson(feature: &Feature) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), json!(feature.id()));
    properties.insert("area".to_string(), json!(feature.area()));

    geojson::Feature {
        bbox: None,
        geometry: Some(multipolygon_to_geometry(feature.geometry())),
        id: Some(Id::String(feature.id().to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn feature_collection<'f, I>(features: I) -> FeatureCollection
where
    I: IntoIterator<Item = &'f Feature>,
{
    FeatureCollection {
        bbox: None,
        features: features.into_iter().map(feature_to_geojson).collect(),
        foreign_members: None,
    }
}

/// Serializes a feature collection to a GeoJSON string.
pub fn collection_to_string(collection: &FeatureCollection) -> Result<String> {
    serde_json::to_string(collection).map_err(|e| {
        GridJoinError::InvalidFormat(format!("Failed to serialize feature collection: {}", e))
    })
}
