use serde::{Deserialize, Serialize};

use crate::error::{CtlError, CtlResult};

/// Meters per degree of latitude.
pub const M_PER_DEG_LAT: f64 = 111_320.0;

/// Fixed longitude shrink factor of the local projection. Good for ~53° N missions
/// within a few km of the center; not valid near the poles or for long corridors.
pub const LON_SCALE: f64 = 0.6;

/// Circular keep-in zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeepInZone {
    pub lat0: f64,
    pub lon0: f64,
    pub radius_m: f64,
}

impl KeepInZone {
    pub fn new(lat0: f64, lon0: f64, radius_m: f64) -> Self {
        Self { lat0, lon0, radius_m }
    }

    /// Local (east, north) offset from the center, meters.
    pub fn offset_m(&self, lat: f64, lon: f64) -> (f64, f64) {
        let dx = (lon - self.lon0) * M_PER_DEG_LAT * LON_SCALE;
        let dy = (lat - self.lat0) * M_PER_DEG_LAT;
        (dx, dy)
    }

    pub fn distance_m(&self, lat: f64, lon: f64) -> f64 {
        let (dx, dy) = self.offset_m(lat, lon);
        dx.hypot(dy)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.distance_m(lat, lon) <= self.radius_m
    }

    /// A non-positive radius would put every position outside the zone.
    pub fn validate(&self) -> CtlResult<()> {
        let finite = self.lat0.is_finite() && self.lon0.is_finite() && self.radius_m.is_finite();
        if !finite || !(self.radius_m > 0.0) {
            return Err(CtlError::InvalidConfig(format!(
                "geofence must have a finite center and radius > 0 (got {:?})",
                self
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_and_boundary() {
        let z = KeepInZone::new(52.12, 13.45, 500.0);
        assert!(z.contains(52.12, 13.45));
        // 400 m north
        assert!(z.contains(52.12 + 400.0 / M_PER_DEG_LAT, 13.45));
        // 600 m north
        assert!(!z.contains(52.12 + 600.0 / M_PER_DEG_LAT, 13.45));
    }

    #[test]
    fn longitude_uses_fixed_scale() {
        let z = KeepInZone::new(0.0, 0.0, 1000.0);
        // a cosine projection at the equator would give 1113 m; the fixed scale gives 668 m
        let lon = 0.01;
        assert!((z.distance_m(0.0, lon) - 0.01 * M_PER_DEG_LAT * 0.6).abs() < 1e-6);
        assert!(z.contains(0.0, lon));
    }

    #[test]
    fn degenerate_zones_rejected() {
        assert!(KeepInZone::new(52.12, 13.45, 300.0).validate().is_ok());
        assert!(KeepInZone::new(52.12, 13.45, 0.0).validate().is_err());
        assert!(KeepInZone::new(52.12, 13.45, -1.0).validate().is_err());
        assert!(KeepInZone::new(f64::NAN, 13.45, 300.0).validate().is_err());
        assert!(KeepInZone::new(52.12, 13.45, f64::INFINITY).validate().is_err());
    }
}
