//! Accept loop and default application wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use herald_config::ServerConfig;

use crate::callbacks::CallbackDispatcher;
use crate::connection::Connection;
use crate::error::ServerError;
use crate::registry::ConnectionRegistry;

/// Owns the listening socket and the connection registry.
///
/// [`Server::bind`] wires the default application behavior into the
/// dispatcher: opened connections register under their request path, text
/// messages get a canned echo reply (the override point for real
/// applications), and errors are logged. Replace hooks through
/// [`Server::callbacks_mut`] before calling [`Server::run`].
pub struct Server {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    callbacks: CallbackDispatcher,
    max_frame_size: usize,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(ServerError::Bind)?;
        let registry = Arc::new(ConnectionRegistry::new());

        let mut callbacks = CallbackDispatcher::new();
        let open_registry = Arc::clone(&registry);
        callbacks.on_open(move |conn| {
            debug!(channel = %conn.channel(), "connection opened");
            open_registry.insert(conn.clone());
            Ok(())
        });
        callbacks.on_message(|conn, msg| {
            if let Some(text) = msg.as_text() {
                debug!(channel = %conn.channel(), "message: {text}");
                conn.try_send(format!("Did you say: '{text}', sir?"))?;
            }
            Ok(())
        });
        callbacks.on_error(|conn, err| {
            let channel = conn.map(|c| c.channel().to_string()).unwrap_or_default();
            warn!(%channel, "connection error: {err}");
        });

        Ok(Self {
            listener,
            registry,
            callbacks,
            max_frame_size: config.max_frame_size,
        })
    }

    /// The registry of live connections, shared with the notify bridge.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Replace default hooks before the accept loop starts.
    pub fn callbacks_mut(&mut self) -> &mut CallbackDispatcher {
        &mut self.callbacks
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop. One task is spawned per accepted connection;
    /// the loop itself never blocks on connection I/O, and a failing
    /// connection task never terminates the server.
    pub async fn run(self) -> Result<(), ServerError> {
        let callbacks = Arc::new(self.callbacks);
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "listening for connections");
        }

        loop {
            let (socket, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;
            debug!(%peer, "accepted connection");

            let connection = Connection::new(
                socket,
                Arc::clone(&callbacks),
                Some(Arc::clone(&self.registry)),
                self.max_frame_size,
            );
            tokio::spawn(async move {
                match connection.run().await {
                    Ok(()) => {}
                    Err(err) if err.is_disconnect() => {
                        // Peer went away before the handshake finished.
                        debug!(%peer, "client disconnected prematurely: {err}");
                    }
                    Err(err) => {
                        error!(%peer, "connection task failed: {err}");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
