use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS_KM;

/// A WGS-84 coordinate in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build from optional components. Both must be present.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        Some(Self::new(lat?, lon?))
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Great-circle distance in kilometres.
///
/// A missing or non-finite endpoint yields `f64::INFINITY`, which downstream
/// scoring treats as "unknown, score zero".
pub fn haversine_km(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => haversine(a, b),
        _ => f64::INFINITY,
    }
}

fn haversine(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // clamp: rounding can push h a hair above 1 for antipodal points
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kl() -> GeoPoint {
        GeoPoint::new(3.139, 101.6869)
    }

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_km(Some(kl()), Some(kl())), 0.0);
    }

    #[test]
    fn test_antipodes() {
        let d = haversine_km(Some(GeoPoint::new(0.0, 0.0)), Some(GeoPoint::new(0.0, 180.0)));
        assert_relative_eq!(d, 20015.0, epsilon = 1.0);
    }

    #[test]
    fn test_known_distance() {
        // KL city centre to Petaling Jaya, roughly 11 km
        let pj = GeoPoint::new(3.1073, 101.6067);
        let d = haversine_km(Some(kl()), Some(pj));
        assert!(d > 8.0 && d < 12.0, "{d}");
    }

    #[test]
    fn test_symmetric() {
        let pj = GeoPoint::new(3.1073, 101.6067);
        assert_relative_eq!(
            haversine_km(Some(kl()), Some(pj)),
            haversine_km(Some(pj), Some(kl())),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_missing_is_infinite() {
        assert!(haversine_km(None, Some(kl())).is_infinite());
        assert!(haversine_km(Some(kl()), None).is_infinite());
        let nan = GeoPoint::new(f64::NAN, 101.0);
        assert!(haversine_km(Some(nan), Some(kl())).is_infinite());
    }

    #[test]
    fn test_from_parts() {
        assert!(GeoPoint::from_parts(Some(1.0), None).is_none());
        assert_eq!(
            GeoPoint::from_parts(Some(1.0), Some(2.0)),
            Some(GeoPoint::new(1.0, 2.0))
        );
    }
}
