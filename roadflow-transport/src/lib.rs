mod geojson;

use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

// Re-export types
pub use self::geojson::{FeatureCollection, PointFeature};

#[cfg(feature = "websocket")]
mod websocket;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSurface;

/// Identifier of the point-feature collection on the render surface.
pub const PARTICLE_SOURCE_ID: &str = "traffic-particles";

// --- Error Type ---

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

// --- Wire Envelope ---

/// Messages written to a surface sink, tagged by kind.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum SurfaceMessage<'a> {
    Particles {
        source: &'static str,
        data: &'a FeatureCollection,
    },
    Visibility {
        source: &'static str,
        visible: bool,
    },
}

// --- Traits ---

/// The external map display component receiving point-feature snapshots.
///
/// `set_data` replaces the surface's collection wholesale; `set_visible`
/// toggles the layer when the visualization is enabled or disabled.
pub trait RenderSurface: Send + Sync {
    fn set_data(&self, collection: &FeatureCollection) -> Result<(), TransportError>;

    fn set_visible(&self, visible: bool) -> Result<(), TransportError>;
}

// --- Implementations ---

/// A surface that discards everything. Useful for disabling output via
/// configuration and for tests.
#[derive(Debug, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn set_data(&self, _collection: &FeatureCollection) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_visible(&self, _visible: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Surface that appends each message as one JSON line to a file.
pub struct FileSurface {
    file: Mutex<File>,
}

impl FileSurface {
    /// Creates the file if it doesn't exist, truncates it if it does.
    pub fn create(path: &str) -> Result<Self, TransportError> {
        let file = File::create(path)?;
        info!("writing render snapshots to {path}");
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, message: &SurfaceMessage<'_>) -> Result<(), TransportError> {
        let line = serde_json::to_string(message)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| TransportError::Runtime("file mutex poisoned".to_string()))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

impl RenderSurface for FileSurface {
    fn set_data(&self, collection: &FeatureCollection) -> Result<(), TransportError> {
        self.write_line(&SurfaceMessage::Particles {
            source: PARTICLE_SOURCE_ID,
            data: collection,
        })
    }

    fn set_visible(&self, visible: bool) -> Result<(), TransportError> {
        self.write_line(&SurfaceMessage::Visibility {
            source: PARTICLE_SOURCE_ID,
            visible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shapes() {
        let collection = FeatureCollection::empty();
        let particles = serde_json::to_value(SurfaceMessage::Particles {
            source: PARTICLE_SOURCE_ID,
            data: &collection,
        })
        .unwrap();
        assert_eq!(particles["type"], "particles");
        assert_eq!(particles["source"], "traffic-particles");
        assert_eq!(particles["data"]["type"], "FeatureCollection");

        let visibility = serde_json::to_value(SurfaceMessage::Visibility {
            source: PARTICLE_SOURCE_ID,
            visible: false,
        })
        .unwrap();
        assert_eq!(visibility["type"], "visibility");
        assert_eq!(visibility["visible"], false);
    }
}
