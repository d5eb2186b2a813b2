//! Geographic wire formats: bounding-box parsing and the GeoJSON
//! FeatureCollection the map frontend consumes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Value};

use crate::database::models::Location;

pub const DEFAULT_POINT_LIMIT: i64 = 1000;
pub const MAX_POINT_LIMIT: i64 = 5000;

/// Rectangular geographic filter: min longitude, min latitude, max
/// longitude, max latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Parse "minLng,minLat,maxLng,maxLat". Returns None for anything
    /// malformed: wrong arity, non-numeric values, min > max, or
    /// coordinates outside ±180/±90.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 4 {
            return None;
        }

        let mut values = [0f64; 4];
        for (i, part) in parts.iter().enumerate() {
            values[i] = part.parse().ok()?;
        }
        let [min_lng, min_lat, max_lng, max_lat] = values;

        if min_lng > max_lng || min_lat > max_lat {
            return None;
        }
        if !(-180.0..=180.0).contains(&min_lng) || !(-180.0..=180.0).contains(&max_lng) {
            return None;
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return None;
        }

        Some(Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        })
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Optional filters for the point-collection query
#[derive(Debug, Clone, Default)]
pub struct GeoFilters {
    pub patrol_id: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub bbox: Option<BoundingBox>,
}

/// Clamp a requested point limit to [1, 5000], defaulting to 1000
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_POINT_LIMIT).clamp(1, MAX_POINT_LIMIT)
}

/// Accepts RFC 3339 ("2024-01-02T10:00:00Z"), plain ISO without offset,
/// or "YYYY-MM-DD HH:MM:SS". Naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Assemble a GeoJSON FeatureCollection from location rows.
/// Coordinates are [lng, lat] per the GeoJSON spec.
pub fn feature_collection(rows: &[Location]) -> Value {
    let features: Vec<Value> = rows
        .iter()
        .map(|loc| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [loc.lng, loc.lat]
                },
                "properties": {
                    "id": loc.id,
                    "name": loc.name,
                    "active": loc.is_active,
                    "patrol_id": loc.patrol_id,
                    "ts": loc.updated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
                }
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_bbox() {
        let bbox = BoundingBox::parse("-10.5, -5, 10, 5.5").unwrap();
        assert_eq!(bbox.min_lng, -10.5);
        assert_eq!(bbox.min_lat, -5.0);
        assert_eq!(bbox.max_lng, 10.0);
        assert_eq!(bbox.max_lat, 5.5);
        assert!(bbox.contains(0.0, 0.0));
        assert!(!bbox.contains(6.0, 0.0));
    }

    #[test]
    fn rejects_malformed_bbox() {
        assert_eq!(BoundingBox::parse("abc,1,2,3"), None);
        assert_eq!(BoundingBox::parse("1,2,3"), None);
        assert_eq!(BoundingBox::parse("1,2,3,4,5"), None);
        assert_eq!(BoundingBox::parse(""), None);
        // min > max
        assert_eq!(BoundingBox::parse("10,0,-10,5"), None);
        assert_eq!(BoundingBox::parse("0,10,5,-10"), None);
        // out of range
        assert_eq!(BoundingBox::parse("-181,0,0,0"), None);
        assert_eq!(BoundingBox::parse("0,-91,0,0"), None);
        assert_eq!(BoundingBox::parse("0,0,180.0001,0"), None);
    }

    #[test]
    fn boundary_coordinates_are_accepted() {
        assert!(BoundingBox::parse("-180,-90,180,90").is_some());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 1000);
        assert_eq!(clamp_limit(Some(999_999)), 5000);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(42)), 42);
    }

    #[test]
    fn parses_timestamp_variants() {
        assert!(parse_timestamp("2024-01-02T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-01-02T10:00:00").is_some());
        assert!(parse_timestamp("2024-01-02 10:00:00").is_some());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());

        let a = parse_timestamp("2024-01-02T10:00:00Z").unwrap();
        let b = parse_timestamp("2024-01-02 10:00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_rows_yield_empty_features() {
        let fc = feature_collection(&[]);
        assert_eq!(fc["type"], "FeatureCollection");
        assert_eq!(fc["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn feature_coordinates_are_lng_lat() {
        let rows = vec![Location {
            id: 1,
            patrol_id: Some(3),
            name: "Alpha".to_string(),
            lat: -12.5,
            lng: 130.8,
            is_active: true,
            updated_at: parse_timestamp("2024-06-01T00:00:00Z").unwrap(),
        }];
        let fc = feature_collection(&rows);
        let coords = &fc["features"][0]["geometry"]["coordinates"];
        assert_eq!(coords[0], 130.8);
        assert_eq!(coords[1], -12.5);
        assert_eq!(fc["features"][0]["properties"]["patrol_id"], 3);
        assert_eq!(
            fc["features"][0]["properties"]["ts"],
            "2024-06-01T00:00:00Z"
        );
    }
}
