use serde::{Deserialize, Serialize};

/// A geographic bounding box given by its four edges, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Fixed-precision key identifying this viewport for deduplication.
    ///
    /// Three decimal places (~100 m) so that minor view jitter maps to the
    /// same key and does not trigger a re-fetch.
    pub fn canonical_key(&self) -> String {
        format!(
            "{:.3},{:.3},{:.3},{:.3}",
            self.west, self.south, self.east, self.north
        )
    }

    /// `south,west,north,east` rendering, the order the geodata query
    /// language expects for its bbox filter.
    pub fn query_bbox(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }

    pub fn is_valid(&self) -> bool {
        self.west < self.east && self.south < self.north
    }
}
