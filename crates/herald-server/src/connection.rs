//! One connection: a frame stream, its owning task, and the cloneable
//! handle other tasks address it through.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use herald_protocol::{
    ConnectionError, FrameStream, StreamEvent, UsageError, close_code,
};

use crate::callbacks::CallbackDispatcher;
use crate::registry::ConnectionRegistry;

/// Depth of the per-connection outbound command queue.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// An operation enqueued for the owning connection task.
#[derive(Debug)]
pub enum Command {
    Send(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close {
        code: Option<u16>,
        reason: String,
    },
}

/// Cloneable facade addressing a live connection.
///
/// Handles never touch the transport directly; they enqueue commands for
/// the owning task, so the single-owner discipline on the socket holds.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    channel: String,
    commands: mpsc::Sender<Command>,
}

impl ConnectionHandle {
    /// Build a handle around an existing command queue. Handles are
    /// normally minted by the connection task when its handshake
    /// completes; this is public for embedders and tests that stand in
    /// for the owning task.
    pub fn new(id: Uuid, channel: String, commands: mpsc::Sender<Command>) -> Self {
        Self {
            id,
            channel,
            commands,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The channel name this connection registered under (its request path).
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Queue a text message, waiting for queue capacity.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        self.commands
            .send(Command::Send(text.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Queue a text message without waiting; fails if the connection has
    /// closed or the queue is full.
    pub fn try_send(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        self.commands
            .try_send(Command::Send(text.into()))
            .map_err(|_| ConnectionError::Closed)
    }

    pub fn ping(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.commands
            .try_send(Command::Ping(payload))
            .map_err(|_| ConnectionError::Closed)
    }

    pub fn pong(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.commands
            .try_send(Command::Pong(payload))
            .map_err(|_| ConnectionError::Closed)
    }

    /// Request a clean close. `code` must fall in the application range
    /// 4000-4999 and is validated here, before anything is enqueued;
    /// when absent, 1000 goes on the wire.
    pub fn close(
        &self,
        code: Option<u16>,
        reason: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        if let Some(code) = code {
            if !close_code::is_application(code) {
                return Err(UsageError::CloseCodeOutOfRange(code).into());
            }
        }
        self.commands
            .try_send(Command::Close {
                code,
                reason: reason.into(),
            })
            .map_err(|_| ConnectionError::Closed)
    }
}

/// A connection bound to its transport, driven by [`Connection::run`].
pub struct Connection<T> {
    stream: FrameStream<T>,
    callbacks: Arc<CallbackDispatcher>,
    registry: Option<Arc<ConnectionRegistry>>,
    commands: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
    id: Uuid,
    handle: Option<ConnectionHandle>,
    close_hook_fired: bool,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    pub fn new(
        io: T,
        callbacks: Arc<CallbackDispatcher>,
        registry: Option<Arc<ConnectionRegistry>>,
        max_frame_size: usize,
    ) -> Self {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        Self {
            stream: FrameStream::new(io, max_frame_size),
            callbacks,
            registry,
            commands,
            command_tx,
            id: Uuid::new_v4(),
            handle: None,
            close_hook_fired: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A handle for this connection, available once it has opened.
    pub fn handle(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    /// Drive the connection until it closes.
    ///
    /// Transport and protocol failures are contained here (surfaced to the
    /// error hook and logged); only an unobserved application or handshake
    /// error escapes as a task failure.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let mut commands_open = true;
        loop {
            tokio::select! {
                event = self.stream.next_event() => match event {
                    Ok(event) => {
                        if self.handle_event(event).await? {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        if self.handle_stream_error(err).await? {
                            return Ok(());
                        }
                    }
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if let Err(err) = self.handle_command(command).await {
                            // A failing write means the transport is gone.
                            debug!("write failed, dropping connection: {err}");
                            self.finish_close();
                            return Ok(());
                        }
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    /// Returns true once the connection has fully closed.
    async fn handle_event(&mut self, event: StreamEvent) -> Result<bool, ConnectionError> {
        match event {
            StreamEvent::Opened { path } => {
                let handle = ConnectionHandle::new(self.id, path, self.command_tx.clone());
                self.handle = Some(handle.clone());
                if let Err(err) = self.callbacks.trigger_on_open(&handle) {
                    return self.application_error(err).await;
                }
                Ok(false)
            }
            StreamEvent::Message(msg) => {
                let handle = self.expect_handle();
                if let Err(err) = self.callbacks.trigger_on_message(&handle, &msg) {
                    return self.application_error(err).await;
                }
                Ok(false)
            }
            StreamEvent::Ping(data) => {
                let handle = self.expect_handle();
                if let Err(err) = self.callbacks.trigger_on_ping(&handle, &data) {
                    return self.application_error(err).await;
                }
                Ok(false)
            }
            StreamEvent::Pong(data) => {
                let handle = self.expect_handle();
                if let Err(err) = self.callbacks.trigger_on_pong(&handle, &data) {
                    return self.application_error(err).await;
                }
                Ok(false)
            }
            StreamEvent::Closed { code } => {
                debug!(?code, "connection closed");
                self.finish_close();
                Ok(true)
            }
            // Infrastructure, not a logical session: no hooks fire.
            StreamEvent::PolicyServed => Ok(true),
        }
    }

    /// Returns true when the task should end cleanly; propagates only
    /// failures nothing observed.
    async fn handle_stream_error(&mut self, err: ConnectionError) -> Result<bool, ConnectionError> {
        if err.is_disconnect() {
            debug!("peer disconnected: {err}");
            self.finish_close();
            return Ok(true);
        }
        match &err {
            ConnectionError::Handshake(_) => {
                // The stream already aborted the transport; the session
                // never opened, so no close hook fires.
                let handled = self.callbacks.trigger_on_error(None, &err);
                if handled { Ok(true) } else { Err(err) }
            }
            ConnectionError::Protocol(protocol_err) => {
                let code = protocol_err.close_code();
                self.callbacks.trigger_on_error(self.handle.as_ref(), &err);
                match self.stream.close_with_code(code, "protocol error").await {
                    // Keep pumping until the close handshake completes.
                    Ok(()) => Ok(false),
                    Err(_) => {
                        self.finish_close();
                        Ok(true)
                    }
                }
            }
            ConnectionError::Transport(_) => {
                warn!("transport error: {err}");
                self.finish_close();
                Ok(true)
            }
            _ => {
                self.callbacks.trigger_on_error(self.handle.as_ref(), &err);
                self.finish_close();
                Ok(true)
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<(), ConnectionError> {
        let result = match command {
            Command::Send(text) => self.stream.send_text(&text).await,
            Command::Ping(payload) => self.stream.ping(payload).await,
            Command::Pong(payload) => self.stream.pong(payload).await,
            Command::Close { code, reason } => self.stream.close(code, &reason).await,
        };
        match result {
            // A command racing the close observes the already-closing
            // state and becomes a no-op.
            Err(ConnectionError::Usage(usage)) => {
                debug!("command rejected: {usage}");
                Ok(())
            }
            other => other,
        }
    }

    /// Surface an application error, then close with the framework code if
    /// anything observed it; otherwise fail the task loudly.
    async fn application_error(&mut self, err: anyhow::Error) -> Result<bool, ConnectionError> {
        let app_err = ConnectionError::Application(err.to_string());
        let handled = self.callbacks.trigger_on_error(self.handle.as_ref(), &app_err);
        if !handled {
            self.stream.abort().await;
            self.finish_close();
            return Err(app_err);
        }
        match self
            .stream
            .close_with_code(close_code::APPLICATION_ERROR, "application error")
            .await
        {
            Ok(()) => Ok(false),
            Err(_) => {
                self.finish_close();
                Ok(true)
            }
        }
    }

    /// Deregister and fire the close hook. Safe to call on every exit
    /// path; the hook fires at most once, and only for sessions that
    /// actually opened.
    fn finish_close(&mut self) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        if let Some(registry) = &self.registry {
            registry.remove(handle.channel(), handle.id());
        }
        if !self.close_hook_fired {
            self.close_hook_fired = true;
            self.callbacks.trigger_on_close(&handle);
        }
    }

    fn expect_handle(&self) -> ConnectionHandle {
        self.handle
            .clone()
            .unwrap_or_else(|| ConnectionHandle::new(self.id, String::new(), self.command_tx.clone()))
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
