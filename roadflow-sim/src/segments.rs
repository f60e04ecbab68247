use roadflow_geo::{densify, point_at, polyline_length, Coordinate};
use serde::{Deserialize, Serialize};

/// Road classification carried through from the geodata source.
///
/// Kept for filtering; the flow simulation itself treats all classes alike.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    #[serde(other)]
    Unknown,
}

impl RoadClass {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            "tertiary" => RoadClass::Tertiary,
            "residential" => RoadClass::Residential,
            _ => RoadClass::Unknown,
        }
    }
}

/// One traversable road way: a densified polyline plus metadata.
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub coordinates: Vec<Coordinate>,
    /// Planar length in degrees, informational only.
    pub length: f64,
    pub road_class: RoadClass,
}

impl RoadSegment {
    /// Build a segment from raw way geometry, densified to `spacing`.
    pub fn from_way(geometry: &[Coordinate], spacing: f64, road_class: RoadClass) -> Self {
        let coordinates = densify(geometry, spacing);
        let length = polyline_length(&coordinates);
        Self {
            coordinates,
            length,
            road_class,
        }
    }

    /// Resolve a normalized position along this segment's polyline.
    pub fn point_at(&self, t: f64) -> Option<Coordinate> {
        point_at(&self.coordinates, t)
    }
}

/// Authoritative set of road segments for the active viewport.
///
/// Single-writer: the acquisition side replaces the whole list; the
/// simulation tick only reads. Segment identity is not preserved across
/// refreshes, so lookups hand back `None` for stale indices and callers
/// treat that as a skip, never a failure.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: Vec<RoadSegment>,
    generation: u64,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap in a freshly acquired segment set, discarding the
    /// prior one wholesale.
    pub fn replace_all(&mut self, segments: Vec<RoadSegment>) {
        self.segments = segments;
        self.generation += 1;
    }

    pub fn get(&self, index: usize) -> Option<&RoadSegment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bumped on every replace or clear; a cheap staleness marker.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.generation += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.iter()
    }
}
