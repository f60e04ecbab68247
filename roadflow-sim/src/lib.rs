pub mod particles;
pub mod segments;

// Re-export commonly used items
pub use particles::{Particle, ParticlePool, ParticleSample, DEFAULT_SPEED_RANGE};
pub use segments::{RoadClass, RoadSegment, SegmentStore};
