use crate::segments::SegmentStore;
use rand::Rng;
use roadflow_geo::Coordinate;

/// Default per-particle step size range, in normalized position units per frame.
pub const DEFAULT_SPEED_RANGE: (f64, f64) = (0.0005, 0.0015);

/// A lightweight simulated point bound to one segment of the current store.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Index into the current generation of segments.
    pub segment_index: usize,
    /// Normalized progress along the segment's polyline, in [0, 1].
    pub position: f64,
    /// Step size per frame; drawn at seed time and kept across respawns.
    pub speed: f64,
    /// +1.0 or -1.0, the sign applied to position advancement.
    pub direction: f64,
}

/// A particle resolved to its geographic position for publishing.
#[derive(Debug, Clone, Copy)]
pub struct ParticleSample {
    pub position: Coordinate,
    pub speed: f64,
}

/// Fixed-capacity recycling population of flow particles.
///
/// Slots are reused forever: a particle that runs off its segment is
/// respawned in place rather than destroyed. The pool is rebuilt only when
/// the segment set itself is replaced.
#[derive(Debug)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    speed_range: (f64, f64),
}

impl ParticlePool {
    pub fn new(speed_range: (f64, f64)) -> Self {
        Self {
            particles: Vec::new(),
            speed_range,
        }
    }

    /// (Re)initialize the pool against a freshly stored segment set.
    ///
    /// The pool is sized to `min(target_count, hard_cap)`. Each particle gets
    /// a uniformly random segment, position, speed, and direction. A segment
    /// count of zero produces an empty pool so no particle can reference a
    /// non-existent segment.
    pub fn seed(
        &mut self,
        segment_count: usize,
        target_count: usize,
        hard_cap: usize,
        rng: &mut impl Rng,
    ) {
        self.particles.clear();
        if segment_count == 0 {
            return;
        }

        let count = target_count.min(hard_cap);
        self.particles.reserve(count);
        for _ in 0..count {
            self.particles.push(Particle {
                segment_index: rng.gen_range(0..segment_count),
                position: rng.gen::<f64>(),
                speed: rng.gen_range(self.speed_range.0..self.speed_range.1),
                direction: random_direction(rng),
            });
        }
    }

    /// Advance every particle one frame.
    ///
    /// A particle whose position leaves [0, 1] is respawned in place: new
    /// random segment bounded by the current store count, new position, new
    /// direction. With an empty store nothing moves at all.
    pub fn advance(&mut self, store: &SegmentStore, rng: &mut impl Rng) {
        if store.is_empty() {
            return;
        }

        let segment_count = store.len();
        for particle in &mut self.particles {
            particle.position += particle.speed * particle.direction;

            if particle.position >= 1.0 || particle.position <= 0.0 {
                particle.segment_index = rng.gen_range(0..segment_count);
                particle.position = rng.gen::<f64>();
                particle.direction = random_direction(rng);
            }
        }
    }

    /// Resolve every particle to a geographic point paired with its speed.
    ///
    /// Lazy and restartable; call it once per publish. Particles whose
    /// segment lookup fails are skipped.
    pub fn sample<'a>(
        &'a self,
        store: &'a SegmentStore,
    ) -> impl Iterator<Item = ParticleSample> + 'a {
        self.particles.iter().filter_map(move |particle| {
            let segment = store.get(particle.segment_index)?;
            let position = segment.point_at(particle.position)?;
            Some(ParticleSample {
                position,
                speed: particle.speed,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }
}

fn random_direction(rng: &mut impl Rng) -> f64 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{RoadClass, RoadSegment};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store_with(count: usize) -> SegmentStore {
        let mut store = SegmentStore::new();
        let segments = (0..count)
            .map(|i| {
                let base = i as f64 * 0.01;
                RoadSegment::from_way(
                    &[
                        Coordinate::new(base, 0.0),
                        Coordinate::new(base, 0.001),
                    ],
                    0.0001,
                    RoadClass::Primary,
                )
            })
            .collect();
        store.replace_all(segments);
        store
    }

    #[test]
    fn seed_sizes_pool_to_min_of_target_and_cap() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);

        pool.seed(10, 500, 2000, &mut rng);
        assert_eq!(pool.len(), 500);

        pool.seed(10, 5000, 2000, &mut rng);
        assert_eq!(pool.len(), 2000);
    }

    #[test]
    fn seed_assigns_valid_fields() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(10, 500, 2000, &mut rng);

        for particle in pool.iter() {
            assert!(particle.segment_index < 10);
            assert!((0.0..=1.0).contains(&particle.position));
            assert!(particle.speed >= 0.0005 && particle.speed < 0.0015);
            assert!(particle.direction == 1.0 || particle.direction == -1.0);
        }
    }

    #[test]
    fn seed_with_no_segments_yields_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(0, 500, 2000, &mut rng);
        assert!(pool.is_empty());

        // advance and sample stay no-ops
        let store = SegmentStore::new();
        pool.advance(&store, &mut rng);
        assert_eq!(pool.sample(&store).count(), 0);
    }

    #[test]
    fn advance_keeps_positions_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(99);
        let store = store_with(4);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(store.len(), 200, 2000, &mut rng);

        for _ in 0..5000 {
            pool.advance(&store, &mut rng);
            for particle in pool.iter() {
                assert!(
                    (0.0..=1.0).contains(&particle.position),
                    "position escaped: {}",
                    particle.position
                );
                assert!(particle.segment_index < store.len());
            }
        }
    }

    #[test]
    fn advance_against_empty_store_is_inert() {
        let mut rng = StdRng::seed_from_u64(3);
        let store = store_with(2);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(store.len(), 50, 2000, &mut rng);

        let before: Vec<f64> = pool.iter().map(|p| p.position).collect();
        let empty = SegmentStore::new();
        pool.advance(&empty, &mut rng);
        let after: Vec<f64> = pool.iter().map(|p| p.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn respawn_respects_shrunken_store() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut store = store_with(8);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(store.len(), 300, 2000, &mut rng);

        // Shrink the store out from under the pool, then let respawns rebind
        store.replace_all(vec![RoadSegment::from_way(
            &[Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.001)],
            0.0001,
            RoadClass::Motorway,
        )]);
        for _ in 0..5000 {
            pool.advance(&store, &mut rng);
        }
        for particle in pool.iter() {
            assert_eq!(particle.segment_index, 0);
        }
    }

    #[test]
    fn sample_pairs_position_with_speed_and_skips_stale() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut store = store_with(6);
        let mut pool = ParticlePool::new(DEFAULT_SPEED_RANGE);
        pool.seed(store.len(), 100, 2000, &mut rng);

        let samples: Vec<ParticleSample> = pool.sample(&store).collect();
        assert_eq!(samples.len(), 100);
        for sample in &samples {
            assert!(sample.speed >= 0.0005 && sample.speed < 0.0015);
        }

        // Restartable: a second pass yields the same count
        assert_eq!(pool.sample(&store).count(), 100);

        // Shrink the store; particles bound past the end are skipped, not fatal
        store.replace_all(vec![RoadSegment::from_way(
            &[Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.001)],
            0.0001,
            RoadClass::Motorway,
        )]);
        let surviving = pool.sample(&store).count();
        assert!(surviving <= 100);
        let expected = pool.iter().filter(|p| p.segment_index == 0).count();
        assert_eq!(surviving, expected);
    }
}
