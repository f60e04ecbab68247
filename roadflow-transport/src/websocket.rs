//! WebSocket render surface: broadcasts snapshots to connected map clients
//! and forwards their viewport messages back to the engine.

use crate::{FeatureCollection, RenderSurface, SurfaceMessage, TransportError, PARTICLE_SOURCE_ID};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use roadflow_geo::BoundingBox;
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages a map client may send upstream.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    /// The client's map stopped moving over these bounds.
    Viewport { bounds: BoundingBox },
}

/// Render surface that broadcasts snapshots to every connected client.
///
/// Inbound `viewport` messages from clients are delivered on the channel
/// returned by [`WebSocketSurface::bind`]; they drive re-acquisition.
pub struct WebSocketSurface {
    tx: broadcast::Sender<String>,
}

impl WebSocketSurface {
    /// Binds the listener and spawns the accept loop on the current runtime.
    pub async fn bind(
        host: &str,
        port: u16,
    ) -> Result<(Self, mpsc::Receiver<BoundingBox>), TransportError> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr).await?;
        info!("render surface listening on ws://{addr}");

        let (tx, _) = broadcast::channel::<String>(16);
        let (viewport_tx, viewport_rx) = mpsc::channel(16);

        let broadcast_tx = tx.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                tokio::spawn(handle_client(
                    stream,
                    peer,
                    broadcast_tx.subscribe(),
                    viewport_tx.clone(),
                ));
            }
        });

        Ok((Self { tx }, viewport_rx))
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn broadcast(&self, message: &SurfaceMessage<'_>) -> Result<(), TransportError> {
        let data = serde_json::to_string(message)?;
        // A send error just means no client is connected right now
        let _ = self.tx.send(data);
        Ok(())
    }
}

impl RenderSurface for WebSocketSurface {
    fn set_data(&self, collection: &FeatureCollection) -> Result<(), TransportError> {
        self.broadcast(&SurfaceMessage::Particles {
            source: PARTICLE_SOURCE_ID,
            data: collection,
        })
    }

    fn set_visible(&self, visible: bool) -> Result<(), TransportError> {
        self.broadcast(&SurfaceMessage::Visibility {
            source: PARTICLE_SOURCE_ID,
            visible,
        })
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<String>,
    viewport_tx: mpsc::Sender<BoundingBox>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("WebSocket handshake failed for {peer}: {err}");
            return;
        }
    };
    info!("render client connected: {peer}");

    let (mut sink, mut source) = ws_stream.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Ok(data) => {
                    if sink.send(Message::Text(data)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("client {peer} lagged, skipped {skipped} snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Viewport { bounds }) => {
                            let _ = viewport_tx.send(bounds).await;
                        }
                        Err(err) => debug!("ignoring unrecognized client message: {err}"),
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }

    info!("render client disconnected: {peer}");
}
