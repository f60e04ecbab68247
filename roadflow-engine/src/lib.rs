pub mod acquire;
pub mod debounce;
pub mod engine;
pub mod overpass;

// Re-export commonly used items
pub use acquire::{AcquireParams, AcquisitionController};
pub use debounce::Debounce;
pub use engine::{EngineCommand, EngineCommands, EngineHandle, EngineStatus, FlowEngine};
pub use overpass::{AcquireError, GeodataSource, OverpassClient, Way, WayQuery};
