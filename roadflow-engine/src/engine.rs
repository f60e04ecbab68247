//! The flow engine: a single cooperative task that owns the segment store
//! and particle pool, advances the simulation every frame, and folds in
//! viewport events, acquisition results, and lifecycle commands.

use crate::acquire::{AcquireFuture, AcquireParams, AcquisitionController};
use crate::debounce::Debounce;
use crate::overpass::{AcquireError, GeodataSource};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use roadflow_config::Config;
use roadflow_geo::BoundingBox;
use roadflow_sim::{ParticlePool, RoadSegment, SegmentStore};
use roadflow_transport::{FeatureCollection, RenderSurface};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Commands accepted by a running engine task.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Turn the visualization on; triggers an immediate acquisition.
    Enable,
    /// Full teardown: empty publish, hidden layer, cleared store and pool.
    Disable,
    /// The viewport settled over new bounds.
    Viewport(BoundingBox),
    /// Stop the engine task entirely.
    Shutdown,
}

/// Observable engine state, published on a watch channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    pub enabled: bool,
    /// True while an acquisition cycle is in flight.
    pub loading: bool,
    pub segment_count: usize,
    pub particle_count: usize,
}

/// Cloneable command sender for a running engine.
#[derive(Clone)]
pub struct EngineCommands {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineCommands {
    pub async fn enable(&self) {
        self.send(EngineCommand::Enable).await;
    }

    pub async fn disable(&self) {
        self.send(EngineCommand::Disable).await;
    }

    pub async fn viewport(&self, bounds: BoundingBox) {
        self.send(EngineCommand::Viewport(bounds)).await;
    }

    async fn send(&self, command: EngineCommand) {
        // A closed channel means the engine already shut down
        let _ = self.tx.send(command).await;
    }
}

/// Handle to a running engine task.
///
/// All scheduling and subscriptions live inside the task; `stop` tears the
/// whole thing down. Dropping the handle without calling `stop` leaves the
/// task running.
pub struct EngineHandle {
    commands: EngineCommands,
    status: watch::Receiver<EngineStatus>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn commands(&self) -> EngineCommands {
        self.commands.clone()
    }

    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub async fn stop(self) {
        self.commands.send(EngineCommand::Shutdown).await;
        if let Err(err) = self.task.await {
            warn!("engine task ended abnormally: {err}");
        }
    }
}

pub struct FlowEngine;

impl FlowEngine {
    /// Spawn the engine task on the current runtime.
    ///
    /// The engine starts disabled; send [`EngineCommand::Enable`] to begin
    /// acquiring and animating.
    pub fn start(
        config: Config,
        source: Arc<dyn GeodataSource>,
        surface: Arc<dyn RenderSurface>,
    ) -> EngineHandle {
        let (tx, rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());

        let state = EngineState::new(config, source, surface, status_tx);
        let task = tokio::spawn(state.run(rx));

        EngineHandle {
            commands: EngineCommands { tx },
            status: status_rx,
            task,
        }
    }
}

// --- Engine Internals ---

struct EngineState {
    store: SegmentStore,
    pool: ParticlePool,
    controller: AcquisitionController,
    surface: Arc<dyn RenderSurface>,
    debounce: Debounce,
    rng: StdRng,
    status: watch::Sender<EngineStatus>,

    bounds: BoundingBox,
    enabled: bool,
    loading: bool,
    frame_count: u64,

    frame_duration: Duration,
    publish_every: u64,
    target_count: usize,
    hard_cap: usize,
}

impl EngineState {
    fn new(
        config: Config,
        source: Arc<dyn GeodataSource>,
        surface: Arc<dyn RenderSurface>,
        status: watch::Sender<EngineStatus>,
    ) -> Self {
        let params = AcquireParams {
            sample_spacing_deg: config.acquisition.sample_spacing_deg,
            minor_road_limit: config.acquisition.minor_road_limit,
        };
        Self {
            store: SegmentStore::new(),
            pool: ParticlePool::new(config.particles.speed_range),
            controller: AcquisitionController::new(source, params),
            surface,
            debounce: Debounce::new(Duration::from_millis(config.acquisition.debounce_ms)),
            rng: StdRng::from_entropy(),
            status,
            bounds: config.viewport,
            enabled: false,
            loading: false,
            frame_count: 0,
            frame_duration: Duration::from_secs_f64(1.0 / config.frame_rate as f64),
            publish_every: config.particles.publish_every,
            target_count: config.particles.target_count,
            hard_cap: config.particles.hard_cap,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) {
        let mut ticker = tokio::time::interval(self.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // At most one fetch is in flight; its bounds are remembered so the
        // dedup key can be advanced when the result lands.
        let mut fetch: Option<AcquireFuture> = None;
        let mut fetch_bounds = self.bounds;

        loop {
            let debounce_deadline = self.debounce.deadline().unwrap_or_else(Instant::now);

            tokio::select! {
                _ = ticker.tick(), if self.enabled => {
                    self.tick();
                }

                _ = tokio::time::sleep_until(debounce_deadline), if self.debounce.is_armed() => {
                    self.debounce.fire();
                    self.begin_acquisition(&mut fetch, &mut fetch_bounds);
                }

                result = poll_fetch(&mut fetch), if fetch.is_some() => {
                    fetch = None;
                    self.finish_acquisition(fetch_bounds, result);
                }

                command = commands.recv() => match command {
                    Some(EngineCommand::Enable) => self.enable(&mut fetch, &mut fetch_bounds),
                    Some(EngineCommand::Disable) => self.disable(),
                    Some(EngineCommand::Viewport(bounds)) => self.viewport_moved(bounds),
                    Some(EngineCommand::Shutdown) | None => break,
                },
            }
        }

        if self.enabled {
            self.disable();
        }
        debug!("engine task stopped");
    }

    /// One simulation frame: advance the pool, publish every Nth tick.
    fn tick(&mut self) {
        self.pool.advance(&self.store, &mut self.rng);
        self.frame_count += 1;
        if self.frame_count % self.publish_every == 0 {
            self.publish();
        }
    }

    fn publish(&self) {
        let collection = FeatureCollection::from_samples(self.pool.sample(&self.store));
        if let Err(err) = self.surface.set_data(&collection) {
            warn!("failed to push particle snapshot: {err}");
        }
    }

    fn enable(&mut self, fetch: &mut Option<AcquireFuture>, fetch_bounds: &mut BoundingBox) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        if let Err(err) = self.surface.set_visible(true) {
            warn!("failed to show particle layer: {err}");
        }
        // First acquisition happens right away, without waiting for a move
        self.begin_acquisition(fetch, fetch_bounds);
        self.push_status();
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.debounce.cancel();

        let empty = FeatureCollection::empty();
        if let Err(err) = self.surface.set_data(&empty) {
            warn!("failed to clear particle layer: {err}");
        }
        if let Err(err) = self.surface.set_visible(false) {
            warn!("failed to hide particle layer: {err}");
        }

        self.store.clear();
        self.pool.clear();
        self.frame_count = 0;
        info!("flow visualization disabled, state cleared");
        self.push_status();
    }

    fn viewport_moved(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
        if self.enabled {
            self.debounce.poke();
        }
    }

    fn begin_acquisition(
        &mut self,
        fetch: &mut Option<AcquireFuture>,
        fetch_bounds: &mut BoundingBox,
    ) {
        if let Some(future) = self.controller.request(self.bounds, self.store.len()) {
            *fetch_bounds = self.bounds;
            *fetch = Some(future);
            self.loading = true;
            info!("acquiring road network for {}", self.bounds.canonical_key());
            self.push_status();
        }
    }

    fn finish_acquisition(
        &mut self,
        bounds: BoundingBox,
        result: Result<Vec<RoadSegment>, AcquireError>,
    ) {
        self.loading = false;

        if !self.enabled {
            // Disabled while the fetch was in flight; the result is stale
            self.controller.complete(&bounds, false);
            debug!("visualization disabled during fetch, discarding result");
            self.push_status();
            return;
        }

        match result {
            Ok(segments) => {
                self.controller.complete(&bounds, true);
                let network_km = network_length_km(&segments);

                // Replace and reseed as one unit, before the next tick reads
                // either
                self.store.replace_all(segments);
                self.pool.seed(
                    self.store.len(),
                    self.target_count,
                    self.hard_cap,
                    &mut self.rng,
                );
                self.publish();
                info!(
                    "stored {} segments (~{:.1} km of roadway), seeded {} particles",
                    self.store.len(),
                    network_km,
                    self.pool.len()
                );
            }
            Err(err) => {
                self.controller.complete(&bounds, false);
                warn!("road network acquisition failed: {err}; keeping previous segments");
            }
        }
        self.push_status();
    }

    fn push_status(&self) {
        let _ = self.status.send(EngineStatus {
            enabled: self.enabled,
            loading: self.loading,
            segment_count: self.store.len(),
            particle_count: self.pool.len(),
        });
    }
}

/// Poll the in-flight fetch if there is one; pends forever otherwise (the
/// select arm is guarded, so this is never actually awaited empty).
async fn poll_fetch(
    fetch: &mut Option<AcquireFuture>,
) -> Result<Vec<RoadSegment>, AcquireError> {
    match fetch.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

/// Approximate ground length of the acquired network, for logging.
fn network_length_km(segments: &[RoadSegment]) -> f64 {
    segments
        .iter()
        .map(|segment| {
            segment
                .coordinates
                .windows(2)
                .map(|pair| pair[0].haversine_km(&pair[1]))
                .sum::<f64>()
        })
        .sum()
}
