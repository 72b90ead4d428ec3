//! Lifecycle of the live position stream.
//!
//! [`StreamManager`] owns at most one open connection. While active, a reader
//! task feeds every text frame to the [`LiveReconciler`] in delivery order.
//! [`StreamManager::deactivate`] waits for that task to finish, so once it
//! returns no further frame can reach the store.
//!
//! If the upstream closes or fails, the task ends and the manager reports
//! inactive. Reconnecting is left to the caller.

use crate::config::Endpoints;
use crate::error::StreamError;
use crate::payload::VehicleUpdate;
use crate::reconciler::LiveReconciler;
use crate::store::SharedStore;
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// How long to wait for the peer to answer our close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// An open connection delivering text frames.
#[async_trait]
pub trait LiveConnection: Send {
    /// Next text frame, or `None` once the upstream has closed.
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the connection from this side.
    async fn close(&mut self);
}

/// Opens [`LiveConnection`]s to the live endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LiveConnection>, StreamError>;
}

/// WebSocket connector for the live locations endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_endpoints(endpoints: &Endpoints) -> Self {
        Self::new(endpoints.live_locations_url())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn LiveConnection>, StreamError> {
        let (ws, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(StreamError::connect)?;
        debug!("[StreamManager] Connected to {} (HTTP {})", self.url, response.status());
        Ok(Box::new(WebSocketConnection { ws }))
    }
}

struct WebSocketConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl LiveConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite; binary frames are not part of the feed
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("[StreamManager] Close handshake failed: {}", e);
        }
        // Wait for the peer's close frame, but not forever
        let drain = async { while let Some(Ok(_)) = self.ws.next().await {} };
        if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
            debug!("[StreamManager] Peer did not acknowledge close");
        }
    }
}

struct ActiveStream {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Opens and closes the single live connection.
pub struct StreamManager {
    connector: Arc<dyn Connector>,
    store: SharedStore<VehicleUpdate>,
    reconciler: LiveReconciler,
    active: Option<ActiveStream>,
}

impl StreamManager {
    pub fn new(connector: Arc<dyn Connector>, store: SharedStore<VehicleUpdate>) -> Self {
        Self {
            connector,
            store,
            reconciler: LiveReconciler::new(),
            active: None,
        }
    }

    pub fn reconciler(&self) -> &LiveReconciler {
        &self.reconciler
    }

    /// True while a connection is open and its reader is running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Open the connection and start applying frames.
    ///
    /// Fails with [`StreamError::AlreadyActive`] without opening anything if a
    /// connection is already open. On a connect failure the manager stays inactive.
    pub async fn activate(&mut self) -> Result<(), StreamError> {
        if self.is_active() {
            warn!("[StreamManager] activate() while active, ignoring");
            return Err(StreamError::AlreadyActive);
        }

        // Reap a stream the upstream ended on its own
        if let Some(ended) = self.active.take() {
            let _ = ended.task.await;
        }

        let connection = self.connector.connect().await.map_err(|e| {
            warn!("[StreamManager] Could not open live stream: {}", e);
            e
        })?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(read_frames(
            connection,
            shutdown_rx,
            Arc::clone(&self.store),
            self.reconciler.clone(),
        ));

        self.active = Some(ActiveStream { shutdown, task });
        info!("[StreamManager] Live stream active");
        Ok(())
    }

    /// Close the connection. Returns once the reader has stopped.
    ///
    /// A no-op when inactive.
    pub async fn deactivate(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("[StreamManager] deactivate() while inactive");
            return;
        };

        // The reader may already have exited, dropping the receiver
        let _ = active.shutdown.send(());
        if let Err(e) = active.task.await {
            warn!("[StreamManager] Reader task failed: {}", e);
        }

        let stats = self.reconciler.stats();
        info!(
            "[StreamManager] Live stream closed ({} applied, {} dropped)",
            stats.applied(),
            stats.dropped()
        );
    }
}

async fn read_frames(
    mut connection: Box<dyn LiveConnection>,
    mut shutdown: oneshot::Receiver<()>,
    store: SharedStore<VehicleUpdate>,
    reconciler: LiveReconciler,
) {
    loop {
        tokio::select! {
            biased;

            // Fires on an explicit shutdown and when the manager is dropped
            _ = &mut shutdown => {
                connection.close().await;
                return;
            }
            frame = connection.next_frame() => match frame {
                Some(Ok(text)) => {
                    let mut store = store.lock().await;
                    reconciler.handle(&mut store, &text);
                }
                Some(Err(e)) => {
                    warn!("[StreamManager] Live stream failed: {}", e);
                    return;
                }
                None => {
                    info!("[StreamManager] Live stream closed by server");
                    return;
                }
            }
        }
    }
}
