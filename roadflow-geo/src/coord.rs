use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, used by the haversine helper.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A (longitude, latitude) pair in degrees, with no altitude.
///
/// All distance and sampling math treats this as a plain 2D point in
/// coordinate-degree space. The planar approximation holds at city scale;
/// use [`Coordinate::haversine_km`] when an actual ground distance is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub(crate) fn as_vec(&self) -> DVec2 {
        DVec2::new(self.lon, self.lat)
    }

    /// Planar Euclidean distance in coordinate-degree space.
    pub fn planar_distance(&self, other: &Coordinate) -> f64 {
        self.as_vec().distance(other.as_vec())
    }

    /// Linear interpolation between two coordinates at parameter `t`.
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        let v = self.as_vec().lerp(other.as_vec(), t);
        Coordinate::new(v.x, v.y)
    }

    /// Great-circle distance to `other` in kilometers (haversine formula).
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}
