//! Acquisition control: decides when a viewport change warrants a re-fetch
//! and turns fetched ways into densified road segments.

use crate::overpass::{AcquireError, GeodataSource, WayQuery};
use log::debug;
use roadflow_geo::BoundingBox;
use roadflow_sim::RoadSegment;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Parameters applied to every acquisition cycle.
#[derive(Debug, Clone, Copy)]
pub struct AcquireParams {
    pub sample_spacing_deg: f64,
    pub minor_road_limit: u32,
}

/// In-flight fetch producing the next segment set.
pub type AcquireFuture =
    Pin<Box<dyn Future<Output = Result<Vec<RoadSegment>, AcquireError>> + Send>>;

/// Gatekeeper for acquisition cycles.
///
/// Holds the dedup key of the last successfully processed viewport and a
/// re-entrancy flag; requests arriving while a cycle is in flight are
/// dropped, not queued.
pub struct AcquisitionController {
    source: Arc<dyn GeodataSource>,
    params: AcquireParams,
    last_key: Option<String>,
    in_flight: bool,
}

impl AcquisitionController {
    pub fn new(source: Arc<dyn GeodataSource>, params: AcquireParams) -> Self {
        Self {
            source,
            params,
            last_key: None,
            in_flight: false,
        }
    }

    /// Request an acquisition for `bounds`.
    ///
    /// Returns the fetch future to poll, or `None` when the request is
    /// dropped: a cycle is already running, or the viewport key matches the
    /// last successful cycle and segments already exist.
    pub fn request(&mut self, bounds: BoundingBox, segment_count: usize) -> Option<AcquireFuture> {
        if self.in_flight {
            debug!("acquisition already in flight, dropping request");
            return None;
        }

        let key = bounds.canonical_key();
        if segment_count > 0 && self.last_key.as_deref() == Some(key.as_str()) {
            debug!("viewport unchanged ({key}), skipping fetch");
            return None;
        }

        self.in_flight = true;
        Some(fetch_segments(
            Arc::clone(&self.source),
            bounds,
            self.params,
        ))
    }

    /// Mark the running cycle finished. The dedup key advances only when the
    /// cycle's result was actually applied.
    pub fn complete(&mut self, bounds: &BoundingBox, applied: bool) {
        self.in_flight = false;
        if applied {
            self.last_key = Some(bounds.canonical_key());
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

/// One full fetch cycle: major classes first, then capped minor classes,
/// concatenated and densified. Ways with fewer than two points are dropped.
fn fetch_segments(
    source: Arc<dyn GeodataSource>,
    bounds: BoundingBox,
    params: AcquireParams,
) -> AcquireFuture {
    Box::pin(async move {
        let major = source.fetch_ways(bounds, WayQuery::Major).await?;
        let minor = source
            .fetch_ways(
                bounds,
                WayQuery::Minor {
                    limit: params.minor_road_limit,
                },
            )
            .await?;

        let mut segments = Vec::with_capacity(major.len() + minor.len());
        for way in major.into_iter().chain(minor) {
            if way.geometry.len() < 2 {
                continue;
            }
            segments.push(RoadSegment::from_way(
                &way.geometry,
                params.sample_spacing_deg,
                way.road_class,
            ));
        }
        Ok(segments)
    })
}
