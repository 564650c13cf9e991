//! Transport layer abstraction.
//!
//! A transport owns the wire connection to one endpoint, including any
//! reconnect behaviour. It reports what happens on the wire as an ordered
//! stream of [`TransportEvent`]s and accepts outbound [`Envelope`]s.

use crate::endpoint::Endpoint;
use crate::error::ChannelResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Something that happened on a transport connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A connection (or reconnection) was established.
    Connected,
    /// The connection dropped. The transport may reconnect on its own.
    Disconnected { reason: Option<String> },
    /// A named message arrived.
    Message { name: String, payload: Value },
}

/// A named message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// The two halves of an opened transport connection.
pub struct TransportLink {
    /// Inbound events, in the order the transport observed them.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Outbound messages. Sending never blocks and is never acknowledged.
    pub outbound: mpsc::UnboundedSender<Envelope>,
}

/// A wire transport able to open named-message connections.
pub trait Transport: Send + Sync {
    /// Starts connecting to `endpoint`. Returns immediately; connection
    /// progress is reported through the link's event stream.
    fn open(&self, endpoint: &Endpoint) -> ChannelResult<TransportLink>;
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex, PoisonError};

    /// The backend side of one mock connection.
    #[derive(Debug)]
    pub struct MockRemote {
        endpoint: Endpoint,
        events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        outbound: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    }

    impl MockRemote {
        /// The endpoint the channel asked for.
        pub fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        fn emit(&self, event: TransportEvent) {
            if let Some(tx) = self.events.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                let _ = tx.send(event);
            }
        }

        /// Simulates a successful (re)connection.
        pub fn connect(&self) {
            self.emit(TransportEvent::Connected);
        }

        /// Simulates a dropped connection.
        pub fn disconnect(&self) {
            self.emit(TransportEvent::Disconnected { reason: None });
        }

        /// Pushes a named message to the channel.
        pub fn push(&self, name: &str, payload: Value) {
            self.emit(TransportEvent::Message {
                name: name.to_string(),
                payload,
            });
        }

        /// Ends the event stream for good, as a transport shutting down would.
        pub fn hang_up(&self) {
            self.events.lock().unwrap_or_else(PoisonError::into_inner).take();
        }

        /// Drains everything the channel has sent so far.
        pub fn take_outbound(&self) -> Vec<Envelope> {
            let mut rx = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
            let mut sent = Vec::new();
            while let Ok(envelope) = rx.try_recv() {
                sent.push(envelope);
            }
            sent
        }
    }

    /// In-memory transport. Every `open` call creates a new [`MockRemote`].
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        remotes: Arc<Mutex<Vec<Arc<MockRemote>>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// All connections opened so far, oldest first.
        pub fn remotes(&self) -> Vec<Arc<MockRemote>> {
            self.remotes.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// The most recently opened connection.
        pub fn last_remote(&self) -> Option<Arc<MockRemote>> {
            self.remotes.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
        }

        /// The first connection opened for `namespace`.
        pub fn remote_for(&self, namespace: &str) -> Option<Arc<MockRemote>> {
            self.remotes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .find(|r| r.endpoint.namespace() == namespace)
                .cloned()
        }
    }

    impl Transport for MockTransport {
        fn open(&self, endpoint: &Endpoint) -> ChannelResult<TransportLink> {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            self.remotes.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::new(MockRemote {
                endpoint: endpoint.clone(),
                events: Mutex::new(Some(events_tx)),
                outbound: Mutex::new(outbound_rx),
            }));
            Ok(TransportLink {
                events: events_rx,
                outbound: outbound_tx,
            })
        }
    }
}
