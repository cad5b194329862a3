//! Geographic helpers for scan-to-location matching.
//!
//! Great-circle distance via the haversine formula, plus the nearest-location
//! selection the scan pipeline uses to attach a scan to a business site.

use crate::types::BusinessLocation;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS84 coordinates.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// A matched location together with how far the scan was from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMatch {
    pub location_id: String,
    pub distance_m: f64,
    /// Matching radius of the location, carried for fraud scoring.
    pub accuracy_radius_m: i64,
    /// True when the scan falls inside the location's accuracy radius.
    pub within_radius: bool,
}

/// Finds the nearest active location to the scan coordinates. Deleted and
/// deactivated locations never match. Returns `None` when the business has
/// no matchable location, leaving the scan geo-unattributed.
pub fn nearest_location(
    locations: &[BusinessLocation],
    scan_lat: f64,
    scan_lon: f64,
) -> Option<LocationMatch> {
    locations
        .iter()
        .filter(|loc| loc.is_active && loc.deleted_at.is_none())
        .map(|loc| {
            let distance_m =
                haversine_distance_m(scan_lat, scan_lon, loc.latitude, loc.longitude);
            LocationMatch {
                location_id: loc.id.clone(),
                distance_m,
                accuracy_radius_m: loc.accuracy_radius_m,
                within_radius: distance_m <= loc.accuracy_radius_m as f64,
            }
        })
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn location(id: &str, lat: f64, lon: f64, radius_m: i64) -> BusinessLocation {
        BusinessLocation {
            id: id.to_owned(),
            business_id: "biz-1".to_owned(),
            name: format!("Location {id}"),
            address_line: None,
            city: None,
            country: None,
            latitude: lat,
            longitude: lon,
            accuracy_radius_m: radius_m,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_zero_distance() {
        assert!(haversine_distance_m(48.8566, 2.3522, 48.8566, 2.3522) < 1e-6);
    }

    #[test]
    fn test_known_distance_paris_to_london() {
        // Paris → London is about 344 km.
        let d = haversine_distance_m(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 344_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = haversine_distance_m(40.7128, -74.0060, 34.0522, -118.2437);
        let b = haversine_distance_m(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_picks_closest_and_flags_radius() {
        let locations = vec![
            location("far", 48.8566, 2.3522, 100),   // Paris
            location("near", 51.5080, -0.1280, 100), // ~70m from scan point
        ];
        let m = nearest_location(&locations, 51.5074, -0.1278).unwrap();
        assert_eq!(m.location_id, "near");
        assert!(m.within_radius);

        // Same scan, tiny radius → matched but outside radius.
        let tight = vec![location("near", 51.5080, -0.1280, 10)];
        let m = nearest_location(&tight, 51.5074, -0.1278).unwrap();
        assert!(!m.within_radius);
    }

    #[test]
    fn test_inactive_and_deleted_locations_are_skipped() {
        let mut inactive = location("a", 51.5074, -0.1278, 100);
        inactive.is_active = false;
        let mut deleted = location("b", 51.5074, -0.1278, 100);
        deleted.deleted_at = Some(Utc::now());

        assert!(nearest_location(&[inactive.clone(), deleted.clone()], 51.5074, -0.1278).is_none());

        let mixed = vec![inactive, deleted, location("c", 51.5080, -0.1280, 100)];
        let m = nearest_location(&mixed, 51.5074, -0.1278).unwrap();
        assert_eq!(m.location_id, "c");
    }
}
