//! Planar geofencing.
//!
//! Distances are Euclidean in degree space. At ~0.1° (about 10 km near the
//! equator) this is close enough; it degrades toward the poles and does not
//! wrap across the anti-meridian.

use agrialert_weather::Coordinates;

/// Roughly 10 km
pub const DEFAULT_RADIUS_DEGREES: f64 = 0.1;

pub fn planar_distance(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = a.lat - b.lat;
    let d_lng = a.lng - b.lng;
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}

pub fn within_radius(a: Coordinates, b: Coordinates, radius: f64) -> bool {
    planar_distance(a, b) <= radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_within_radius() {
        let origin = Coordinates::new(10.0, 10.0);
        assert!(within_radius(origin, origin, DEFAULT_RADIUS_DEGREES));
    }

    #[test]
    fn test_radius_is_inclusive_and_planar() {
        let origin = Coordinates::new(0.0, 0.0);
        assert!(within_radius(origin, Coordinates::new(0.06, 0.07), 0.1));
        assert!(within_radius(origin, Coordinates::new(0.1, 0.0), 0.1));
        assert!(!within_radius(origin, Coordinates::new(0.2, 0.0), 0.1));
        assert!(!within_radius(origin, Coordinates::new(0.08, 0.08), 0.1));
    }

    #[test]
    fn test_no_antimeridian_wrap() {
        let east = Coordinates::new(0.0, 179.99);
        let west = Coordinates::new(0.0, -179.99);
        assert!(!within_radius(east, west, DEFAULT_RADIUS_DEGREES));
    }
}
