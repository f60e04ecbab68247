//! Client for the external road-geometry provider.
//!
//! Speaks the Overpass query language: one uncapped query for major road
//! classes, one capped query for minor ones, both against the same bbox.

use roadflow_geo::{BoundingBox, Coordinate};
use roadflow_sim::RoadClass;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Road classes fetched by the uncapped first query.
const MAJOR_CLASSES: &str = "motorway|trunk|primary|secondary";
/// Road classes fetched second, with a server-side result cap.
const MINOR_CLASSES: &str = "tertiary|residential";

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("geodata request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geodata source returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed geodata payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// One fetched way: raw geometry plus its classification tag.
#[derive(Debug, Clone)]
pub struct Way {
    pub geometry: Vec<Coordinate>,
    pub road_class: RoadClass,
}

/// Which of the two per-cycle queries to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WayQuery {
    Major,
    Minor { limit: u32 },
}

impl WayQuery {
    /// Render the Overpass query for `bounds`.
    pub fn to_overpass(&self, bounds: &BoundingBox) -> String {
        let bbox = bounds.query_bbox();
        match self {
            WayQuery::Major => format!(
                "[out:json];way[\"highway\"~\"^({MAJOR_CLASSES})$\"]({bbox});(._;>;);out geom;"
            ),
            WayQuery::Minor { limit } => format!(
                "[out:json];way[\"highway\"~\"^({MINOR_CLASSES})$\"]({bbox});(._;>;);out geom {limit};"
            ),
        }
    }
}

/// Trait seam over the external road-geometry provider, so the engine can be
/// driven by a mock in tests.
pub trait GeodataSource: Send + Sync {
    fn fetch_ways<'a>(
        &'a self,
        bounds: BoundingBox,
        query: WayQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Way>, AcquireError>> + Send + 'a>>;
}

// --- Response Payload ---

#[derive(Deserialize, Debug)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize, Debug)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    geometry: Option<Vec<OverpassPoint>>,
    #[serde(default)]
    tags: Option<OverpassTags>,
}

#[derive(Deserialize, Debug)]
struct OverpassPoint {
    lon: f64,
    lat: f64,
}

#[derive(Deserialize, Debug)]
struct OverpassTags {
    #[serde(default)]
    highway: Option<String>,
}

/// Keep `way` elements that carry geometry; everything else in the payload
/// (nodes, count remarks) is dropped.
pub(crate) fn parse_ways(body: &str) -> Result<Vec<Way>, AcquireError> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    let ways = response
        .elements
        .into_iter()
        .filter_map(|element| {
            if element.kind != "way" {
                return None;
            }
            let geometry = element.geometry?;
            let coords = geometry
                .iter()
                .map(|p| Coordinate::new(p.lon, p.lat))
                .collect();
            let road_class = element
                .tags
                .and_then(|tags| tags.highway)
                .map(|tag| RoadClass::from_tag(&tag))
                .unwrap_or(RoadClass::Unknown);
            Some(Way {
                geometry: coords,
                road_class,
            })
        })
        .collect();
    Ok(ways)
}

// --- HTTP Client ---

/// HTTP client for an Overpass-compatible endpoint.
pub struct OverpassClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OverpassClient {
    /// `timeout` of `None` keeps the transport default (no explicit bound).
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, AcquireError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: endpoint.to_string(),
        })
    }
}

impl GeodataSource for OverpassClient {
    fn fetch_ways<'a>(
        &'a self,
        bounds: BoundingBox,
        query: WayQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Way>, AcquireError>> + Send + 'a>> {
        Box::pin(async move {
            let data = query.to_overpass(&bounds);
            let response = self
                .http
                .post(&self.endpoint)
                .form(&[("data", data.as_str())])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(AcquireError::Status(response.status()));
            }

            let body = response.text().await?;
            parse_ways(&body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_rendering() {
        let bounds = BoundingBox::new(-82.6, 27.8, -82.3, 28.1);
        let major = WayQuery::Major.to_overpass(&bounds);
        assert_eq!(
            major,
            "[out:json];way[\"highway\"~\"^(motorway|trunk|primary|secondary)$\"](27.8,-82.6,28.1,-82.3);(._;>;);out geom;"
        );

        let minor = WayQuery::Minor { limit: 500 }.to_overpass(&bounds);
        assert!(minor.contains("tertiary|residential"));
        assert!(minor.ends_with("out geom 500;"));
    }

    #[test]
    fn parse_keeps_ways_with_geometry() {
        let body = r#"{
          "elements": [
            {
              "type": "way",
              "geometry": [
                { "lon": -82.45, "lat": 27.95 },
                { "lon": -82.44, "lat": 27.96 }
              ],
              "tags": { "highway": "primary" }
            },
            { "type": "node", "lon": -82.45, "lat": 27.95 },
            { "type": "way", "tags": { "highway": "residential" } },
            {
              "type": "way",
              "geometry": [
                { "lon": -82.40, "lat": 27.90 },
                { "lon": -82.41, "lat": 27.91 }
              ]
            }
          ]
        }"#;
        let ways = parse_ways(body).unwrap();
        assert_eq!(ways.len(), 2);
        assert_eq!(ways[0].road_class, RoadClass::Primary);
        assert_eq!(ways[0].geometry.len(), 2);
        // Missing highway tag falls back to unknown
        assert_eq!(ways[1].road_class, RoadClass::Unknown);
    }

    #[test]
    fn parse_empty_and_malformed() {
        assert!(parse_ways(r#"{ "elements": [] }"#).unwrap().is_empty());
        assert!(parse_ways("{}").unwrap().is_empty());
        assert!(matches!(
            parse_ways("not json"),
            Err(AcquireError::Payload(_))
        ));
    }
}
