//! WebSocket Game Server
//!
//! Accepts WebSocket connections, gives each a read pump and a write pump,
//! and hands the connection to the tick driver as a [`ChannelLink`]. The
//! tick driver owns the [`Session`] and never waits on a client.
//!
//! ```text
//!  acceptor task ──(pending, bounded)──┐
//!                                      v
//!  read pump  ──(inbound, bounded)──> tick driver ──(outbound, bounded)──> write pump
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{accept_async_with_config, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::config::{ConfigError, GameConfig};
use crate::game::map::{Map, MapError, TileTable};
use crate::game::state::World;
use crate::network::link::{ChannelLink, RemoteEnd};
use crate::network::session::{Session, SessionError};
use crate::network::ticker::Ticker;

/// Built-in arena width in tiles.
pub const ARENA_COLS: usize = 40;
/// Built-in arena height in tiles.
pub const ARENA_ROWS: usize = 24;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Frames buffered from a client before the read pump waits.
    pub inbound_queue_capacity: usize,
    /// Frames buffered to a client before it is disconnected.
    pub outbound_queue_capacity: usize,
    /// Largest accepted message in bytes.
    pub max_message_size: usize,
    /// Close a connection idle for this long.
    pub read_timeout: Duration,
    /// Accepted connections waiting for the next tick.
    pub pending_backlog: usize,
    /// World RNG seed. Taken from the clock when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 256,
            inbound_queue_capacity: 5,
            outbound_queue_capacity: 8,
            max_message_size: 1024,
            read_timeout: Duration::from_secs(10),
            pending_backlog: 16,
            seed: None,
        }
    }
}

impl ServerConfig {
    /// The configured seed, or one taken from the clock.
    pub fn world_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x5EED)
        })
    }

    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: Some(self.max_message_size),
            max_frame_size: Some(self.max_message_size),
            ..Default::default()
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind or accept.
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Game parameters could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Map could not be loaded.
    #[error("Map error: {0}")]
    Map(#[from] MapError),
}

/// Build the world from optional parameter and map files.
///
/// Without a map file the built-in arena is used.
pub fn load_world(config_path: Option<&Path>, map_path: Option<&Path>, seed: u64) -> Result<World, GameServerError> {
    let config = match config_path {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let table = TileTable::standard();
    let map = match map_path {
        Some(path) => Map::load(&table, path, config.tile_size)?,
        None => Map::arena(&table, ARENA_COLS, ARENA_ROWS, config.tile_size)?,
    };
    info!(rows = map.row_count(), tile_size = map.tile_size(), seed, "world loaded");
    Ok(World::new(Arc::new(map), config, seed))
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    listener: Arc<TcpListener>,
    /// Live connections, handshaking or admitted.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Bind the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, GameServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            listener: Arc::new(listener),
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, GameServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the tick driver on `world` until shutdown or a fatal error.
    #[instrument(skip(self, world))]
    pub async fn run(&self, world: World) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (pending_tx, mut pending_rx) = mpsc::channel(self.config.pending_backlog.max(1));

        let acceptor = tokio::spawn(Self::run_accept_loop(
            self.listener.clone(),
            self.config.clone(),
            self.connections.clone(),
            pending_tx,
            self.shutdown_tx.clone(),
        ));

        let tick_rate = world.config.tick_rate;
        let mut session = Session::new(world);
        let mut ticker = Ticker::with_rate(tick_rate);
        info!(addr = %self.local_addr()?, tick_rate, "Game server listening");

        let result: Result<(), GameServerError> = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }

            while let Ok(link) = pending_rx.try_recv() {
                if let Err(e) = session.add_player(link) {
                    warn!(error = %e, "rejecting connection");
                }
            }

            if let Err(e) = session.tick() {
                error!(error = %e, "tick failed, stopping");
                break Err(e.into());
            }
        };

        acceptor.abort();
        result
    }

    /// Accept connections and spawn their handlers.
    async fn run_accept_loop(
        listener: Arc<TcpListener>,
        config: ServerConfig,
        connections: Arc<AtomicUsize>,
        pending: mpsc::Sender<ChannelLink>,
        shutdown_tx: broadcast::Sender<()>,
    ) {
        let mut shutdown_rx = shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if connections.load(Ordering::Acquire) >= config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            connections.fetch_add(1, Ordering::AcqRel);
                            debug!("New connection from {}", addr);

                            let guard = ConnectionGuard(connections.clone());
                            let config = config.clone();
                            let pending = pending.clone();
                            let shutdown_rx = shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                let _guard = guard;
                                if let Err(e) = Self::handle_connection(stream, addr, config, pending, shutdown_rx).await {
                                    debug!("Connection {} ended with error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    /// Handshake, queue the link for admission, then pump frames until
    /// either side goes away.
    #[instrument(skip(stream, config, pending, shutdown_rx))]
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        config: ServerConfig,
        pending: mpsc::Sender<ChannelLink>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        stream.set_nodelay(true)?;
        let ws_stream = accept_async_with_config(stream, Some(config.websocket_config())).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (link, remote) = ChannelLink::pair(config.inbound_queue_capacity, config.outbound_queue_capacity);
        if pending.try_send(link).is_err() {
            warn!("Pending queue full, closing {}", addr);
            ws_sender.send(Message::Close(None)).await?;
            return Ok(());
        }
        let RemoteEnd { inbound, mut outbound } = remote;

        // Write pump: runs until the session drops the link
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if ws_sender.send(Message::Binary(frame)).await.is_err() {
                    return;
                }
            }
            let _ = ws_sender.send(Message::Close(None)).await;
        });

        // Read pump
        loop {
            tokio::select! {
                msg = timeout(config.read_timeout, ws_receiver.next()) => {
                    match msg {
                        Ok(Some(Ok(Message::Binary(data)))) => {
                            match timeout(config.read_timeout, inbound.send(data)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(_)) => break,
                                Err(_) => {
                                    warn!("Inbound queue stalled for {}", addr);
                                    break;
                                }
                            }
                        }
                        Ok(Some(Ok(Message::Text(_)))) => {
                            warn!("Text frame from {}, closing", addr);
                            break;
                        }
                        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(e))) => {
                            debug!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        Err(_) => {
                            info!("Read timeout for {}", addr);
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        // The session sees the closed inbound queue and evicts the player
        drop(inbound);
        let _ = writer.await;
        debug!("Client {} cleaned up", addr);
        Ok(())
    }

    /// Signal the tick driver and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Live connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }
}

/// Decrements the live connection count when a connection task ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.inbound_queue_capacity, 5);
        assert_eq!(config.outbound_queue_capacity, 8);
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(local_config().world_seed(), 1);
    }

    #[test]
    fn test_load_world_defaults_to_arena() {
        let world = load_world(None, None, 3).unwrap();
        assert_eq!(world.map.row_count(), ARENA_ROWS);
        assert_eq!(world.flags.len(), 2);
    }

    #[test]
    fn test_load_world_missing_file() {
        let result = load_world(Some(Path::new("/nonexistent/params.json")), None, 3);
        assert!(matches!(result, Err(GameServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_server_bind_and_shutdown() {
        let server = Arc::new(GameServer::bind(local_config()).await.unwrap());
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.connection_count(), 0);

        let world = load_world(None, None, 1).unwrap();
        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run(world).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
