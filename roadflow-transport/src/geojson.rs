//! GeoJSON snapshot types pushed to the render surface.
//!
//! The wire shape is a plain point FeatureCollection with `id` and `speed`
//! properties per particle, replaced wholesale on every publish.

use roadflow_sim::ParticleSample;
use serde::Serialize;

#[derive(Serialize, Debug, Clone)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `[lon, lat]`
    coordinates: [f64; 2],
}

#[derive(Serialize, Debug, Clone)]
struct ParticleProperties {
    id: usize,
    speed: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct PointFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: PointGeometry,
    properties: ParticleProperties,
}

#[derive(Serialize, Debug, Clone)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<PointFeature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: "FeatureCollection",
            features: Vec::new(),
        }
    }

    /// Build a snapshot from resolved particle samples.
    pub fn from_samples(samples: impl Iterator<Item = ParticleSample>) -> Self {
        let features = samples
            .enumerate()
            .map(|(id, sample)| PointFeature {
                kind: "Feature",
                geometry: PointGeometry {
                    kind: "Point",
                    coordinates: [sample.position.lon, sample.position.lat],
                },
                properties: ParticleProperties {
                    id,
                    speed: sample.speed,
                },
            })
            .collect();
        Self {
            kind: "FeatureCollection",
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadflow_geo::Coordinate;

    #[test]
    fn empty_collection_shape() {
        let json = serde_json::to_value(FeatureCollection::empty()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn features_carry_point_geometry_and_properties() {
        let samples = vec![
            ParticleSample {
                position: Coordinate::new(-82.45, 27.95),
                speed: 0.001,
            },
            ParticleSample {
                position: Coordinate::new(-82.40, 27.99),
                speed: 0.0007,
            },
        ];
        let collection = FeatureCollection::from_samples(samples.into_iter());
        assert_eq!(collection.len(), 2);

        let json = serde_json::to_value(&collection).unwrap();
        let first = &json["features"][0];
        assert_eq!(first["type"], "Feature");
        assert_eq!(first["geometry"]["type"], "Point");
        assert_eq!(first["geometry"]["coordinates"][0], -82.45);
        assert_eq!(first["geometry"]["coordinates"][1], 27.95);
        assert_eq!(first["properties"]["id"], 0);
        assert_eq!(first["properties"]["speed"], 0.001);
        assert_eq!(json["features"][1]["properties"]["id"], 1);
    }
}
