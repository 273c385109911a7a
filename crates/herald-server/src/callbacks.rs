//! Event hooks invoked by connection tasks.
//!
//! A dispatcher holds at most one handler per event kind; registering a
//! second handler for the same kind replaces the first. Registration
//! happens once, at server construction, before any connection exists, so
//! the dispatcher is shared read-only across connection tasks afterwards.

use herald_protocol::{ConnectionError, Message};

use crate::connection::ConnectionHandle;

pub type OpenHook = Box<dyn Fn(&ConnectionHandle) -> anyhow::Result<()> + Send + Sync>;
pub type MessageHook = Box<dyn Fn(&ConnectionHandle, &Message) -> anyhow::Result<()> + Send + Sync>;
pub type ControlHook = Box<dyn Fn(&ConnectionHandle, &[u8]) -> anyhow::Result<()> + Send + Sync>;
pub type ErrorHook = Box<dyn Fn(Option<&ConnectionHandle>, &ConnectionError) + Send + Sync>;
pub type CloseHook = Box<dyn Fn(&ConnectionHandle) + Send + Sync>;

/// Routing table from protocol events to application behavior.
///
/// Fallible hooks (`open`, `message`, `ping`, `pong`) that return an error
/// constitute an application error: it is surfaced through the error hook
/// and the connection is closed with the framework-reserved code.
#[derive(Default)]
pub struct CallbackDispatcher {
    on_open: Option<OpenHook>,
    on_message: Option<MessageHook>,
    on_ping: Option<ControlHook>,
    on_pong: Option<ControlHook>,
    on_error: Option<ErrorHook>,
    on_close: Option<CloseHook>,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(
        &mut self,
        hook: impl Fn(&ConnectionHandle) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    pub fn on_message(
        &mut self,
        hook: impl Fn(&ConnectionHandle, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_message = Some(Box::new(hook));
        self
    }

    pub fn on_ping(
        &mut self,
        hook: impl Fn(&ConnectionHandle, &[u8]) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_ping = Some(Box::new(hook));
        self
    }

    pub fn on_pong(
        &mut self,
        hook: impl Fn(&ConnectionHandle, &[u8]) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_pong = Some(Box::new(hook));
        self
    }

    pub fn on_error(
        &mut self,
        hook: impl Fn(Option<&ConnectionHandle>, &ConnectionError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn on_close(
        &mut self,
        hook: impl Fn(&ConnectionHandle) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn trigger_on_open(&self, conn: &ConnectionHandle) -> anyhow::Result<()> {
        match &self.on_open {
            Some(hook) => hook(conn),
            None => Ok(()),
        }
    }

    pub fn trigger_on_message(&self, conn: &ConnectionHandle, msg: &Message) -> anyhow::Result<()> {
        match &self.on_message {
            Some(hook) => hook(conn, msg),
            None => Ok(()),
        }
    }

    pub fn trigger_on_ping(&self, conn: &ConnectionHandle, data: &[u8]) -> anyhow::Result<()> {
        match &self.on_ping {
            Some(hook) => hook(conn, data),
            None => Ok(()),
        }
    }

    pub fn trigger_on_pong(&self, conn: &ConnectionHandle, data: &[u8]) -> anyhow::Result<()> {
        match &self.on_pong {
            Some(hook) => hook(conn, data),
            None => Ok(()),
        }
    }

    pub fn trigger_on_close(&self, conn: &ConnectionHandle) {
        if let Some(hook) = &self.on_close {
            hook(conn);
        }
    }

    /// Invoke the error hook if one exists. Returns whether a handler was
    /// registered, which callers use to decide whether the error must
    /// propagate as a task failure.
    pub fn trigger_on_error(&self, conn: Option<&ConnectionHandle>, err: &ConnectionError) -> bool {
        match &self.on_error {
            Some(hook) => {
                hook(conn, err);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "callbacks_tests.rs"]
mod tests;
