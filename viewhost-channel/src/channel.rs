//! Channel: handshake on connect, listener fan-out on message.

use crate::endpoint::Endpoint;
use crate::error::{ChannelError, ChannelResult};
use crate::transport::{Envelope, Transport, TransportEvent};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use viewhost_types::message::DEFAULT_INIT_MSG;

/// Handler for one named inbound message.
pub type Listener = Box<dyn FnMut(&Value) + Send>;

/// Listener table and handshake name for a channel.
pub struct ChannelConfig {
    listeners: Vec<(String, Listener)>,
    init_msg: String,
}

impl ChannelConfig {
    /// Creates a config whose handshake message is `init_msg`.
    pub fn new(init_msg: impl Into<String>) -> Self {
        Self {
            listeners: Vec::new(),
            init_msg: init_msg.into(),
        }
    }

    /// Registers a listener for `name`. Registrations for the same name are
    /// kept side by side and all fire, in registration order.
    #[must_use]
    pub fn listener<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.listeners.push((name.into(), Box::new(handler)));
        self
    }

    pub fn init_msg(&self) -> &str {
        &self.init_msg
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INIT_MSG)
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field(
                "listeners",
                &self.listeners.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("init_msg", &self.init_msg)
            .finish()
    }
}

/// Cloneable, fire-and-forget sender for an open channel.
#[derive(Clone)]
pub struct ChannelHandle {
    endpoint: Arc<Endpoint>,
    outbound: mpsc::UnboundedSender<Envelope>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ChannelHandle {
    /// Sends a named message. No acknowledgement, no retry: a message sent
    /// on a closed channel is dropped.
    pub fn send(&self, name: &str, payload: Value) {
        if let Err(e) = self.try_send(name, payload) {
            debug!(endpoint = %self.endpoint, message = name, "Dropping outbound message: {}", e);
        }
    }

    fn try_send(&self, name: &str, payload: Value) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.outbound
            .send(Envelope::new(name, payload))
            .map_err(|_| ChannelError::Closed)
    }

    /// Stops the channel loop. Listeners stop firing once the loop observes it.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!(endpoint = %self.endpoint, "Channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.outbound.is_closed()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("endpoint", &self.endpoint.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An open channel to one endpoint.
///
/// The channel does not manage the connection. It reacts to what the
/// transport reports: every `Connected` event triggers exactly one handshake
/// message, so a reconnect naturally asks the backend for a fresh snapshot.
pub struct Channel {
    handle: ChannelHandle,
    listeners: Vec<(String, Listener)>,
    init_msg: String,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    connections: u64,
}

impl Channel {
    /// Opens a channel on `transport`. Returns before the connection exists.
    pub fn open(
        transport: &dyn Transport,
        endpoint: Endpoint,
        config: ChannelConfig,
    ) -> ChannelResult<Self> {
        let link = transport.open(&endpoint)?;
        info!(endpoint = %endpoint, listeners = config.listeners.len(), "Opening channel");
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            handle: ChannelHandle {
                endpoint: Arc::new(endpoint),
                outbound: link.outbound,
                shutdown: Arc::new(shutdown),
            },
            listeners: config.listeners,
            init_msg: config.init_msg,
            events: link.events,
            connections: 0,
        })
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.handle.endpoint
    }

    /// Number of `Connected` events handled so far.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Handles one transport event. Returns the number of listeners invoked.
    pub fn dispatch(&mut self, event: TransportEvent) -> usize {
        match event {
            TransportEvent::Connected => {
                self.connections += 1;
                debug!(
                    endpoint = %self.handle.endpoint,
                    init_msg = %self.init_msg,
                    connections = self.connections,
                    "Channel connected, sending handshake"
                );
                self.handle.send(&self.init_msg, Value::Object(Default::default()));
                0
            }
            TransportEvent::Disconnected { reason } => {
                warn!(endpoint = %self.handle.endpoint, reason = ?reason, "Channel disconnected");
                0
            }
            TransportEvent::Message { name, payload } => {
                let mut fired = 0;
                for (_, listener) in self.listeners.iter_mut().filter(|(n, _)| *n == name) {
                    listener(&payload);
                    fired += 1;
                }
                if fired == 0 {
                    debug!(endpoint = %self.handle.endpoint, message = %name, "No listener for message");
                }
                fired
            }
        }
    }

    /// Dispatches every event already queued, without waiting.
    /// Returns the number of events handled.
    pub fn poll_pending(&mut self) -> usize {
        let mut handled = 0;
        while !*self.handle.shutdown.borrow() {
            match self.events.try_recv() {
                Ok(event) => {
                    self.dispatch(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Drives the channel until the transport ends or the channel is closed.
    pub async fn run(mut self) {
        let mut shutdown = self.handle.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {}
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.dispatch(event);
                    }
                    None => {
                        info!(endpoint = %self.handle.endpoint, "Transport ended, channel stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Runs the channel on a tokio task.
    pub fn spawn(self) -> (ChannelHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.handle.endpoint.to_string())
            .field("init_msg", &self.init_msg)
            .field("listeners", &self.listeners.len())
            .field("connections", &self.connections)
            .finish()
    }
}
