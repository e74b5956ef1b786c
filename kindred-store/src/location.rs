const EARTH_RADIUS_KM: f64 = 6378.0;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine great-circle distance to another point.
    pub fn distance_km(&self, other: Location) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let h_sin_lat = (d_lat / 2.0).sin();
        let h_sin_lon = (d_lon / 2.0).sin();
        let a = h_sin_lat * h_sin_lat
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * h_sin_lon
                * h_sin_lon;
        let c = a.sqrt().atan2((1.0 - a).sqrt()) * 2.0;
        EARTH_RADIUS_KM * c
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_to_self() {
        let here = Location::new(49.2827, -123.1207);
        assert!(here.distance_km(here) < 1e-9);
    }

    #[test]
    fn vancouver_to_kelowna() {
        let vancouver = Location::new(49.2827, -123.1207);
        let kelowna = Location::new(49.8880, -119.4960);
        let d = vancouver.distance_km(kelowna);
        assert!((250.0..300.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Location::new(51.5074, -0.1278);
        let b = Location::new(48.8566, 2.3522);
        assert!((a.distance_km(b) - b.distance_km(a)).abs() < 1e-9);
    }
}
