pub mod bounds;
pub mod coord;
pub mod sample;

// Re-export the primitives the rest of the workspace works with
pub use bounds::BoundingBox;
pub use coord::Coordinate;
pub use sample::{densify, point_at, polyline_length};
