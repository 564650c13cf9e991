//! WebSocket transport.
//!
//! Each message is one JSON text frame `{"event": <name>, "data": <payload>}`.
//! The connection task reconnects with exponential backoff for as long as
//! the channel side is alive, reporting every connect and drop as an event.

use crate::endpoint::Endpoint;
use crate::error::{ChannelError, ChannelResult};
use crate::transport::{Envelope, Transport, TransportEvent, TransportLink};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Backoff schedule between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.factor <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let mut delay = self.initial_delay;
        for _ in 0..attempt {
            delay = match delay.checked_mul(self.factor) {
                Some(d) if d < self.max_delay => d,
                _ => return self.max_delay,
            };
        }
        delay.min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            factor: 2,
        }
    }
}

/// Transport speaking JSON envelopes over `ws://` or `wss://`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    reconnect: ReconnectPolicy,
}

impl WebSocketTransport {
    pub fn new(reconnect: ReconnectPolicy) -> Self {
        Self { reconnect }
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, endpoint: &Endpoint) -> ChannelResult<TransportLink> {
        let url = endpoint.address();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChannelError::InvalidEndpoint(format!(
                "expected ws:// or wss:// address, got {url}"
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ChannelError::Transport(format!("no tokio runtime: {e}")))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(connection_loop(
            url,
            self.reconnect.clone(),
            events_tx,
            outbound_rx,
        ));

        Ok(TransportLink {
            events: events_rx,
            outbound: outbound_tx,
        })
    }
}

async fn connection_loop(
    url: String,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
) {
    let mut attempt: u32 = 0;
    loop {
        if events.is_closed() {
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                attempt = 0;
                info!(url = %url, "WebSocket connected");
                if events.send(TransportEvent::Connected).is_err() {
                    return;
                }

                let (mut writer, mut reader) = ws.split();
                let reason = loop {
                    tokio::select! {
                        frame = reader.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<Envelope>(&text) {
                                    Ok(envelope) => {
                                        let event = TransportEvent::Message {
                                            name: envelope.event,
                                            payload: envelope.data,
                                        };
                                        if events.send(event).is_err() {
                                            let _ = writer.close().await;
                                            return;
                                        }
                                    }
                                    Err(e) => warn!(url = %url, error = %e, "Ignoring undecodable frame"),
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break frame.map(|f| f.reason.to_string());
                            }
                            // Ping/pong handled by tungstenite; binary skipped.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break Some(e.to_string()),
                            None => break None,
                        },
                        _ = events.closed() => {
                            let _ = writer.close().await;
                            return;
                        }
                        queued = outbound.recv() => match queued {
                            Some(envelope) => match serde_json::to_string(&envelope) {
                                Ok(json) => {
                                    if let Err(e) = writer.send(Message::Text(json.into())).await {
                                        break Some(e.to_string());
                                    }
                                }
                                Err(e) => warn!(url = %url, error = %e, "Failed to encode outbound message"),
                            },
                            None => {
                                // Every sender is gone: nobody can use this connection.
                                let _ = writer.close().await;
                                return;
                            }
                        },
                    }
                };

                warn!(url = %url, reason = ?reason, "WebSocket disconnected");
                if events.send(TransportEvent::Disconnected { reason }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(url = %url, attempt, error = %e, "WebSocket connect failed");
            }
        }

        // No acknowledgement, no retry: what was queued while offline is lost.
        loop {
            match outbound.try_recv() {
                Ok(envelope) => debug!(url = %url, message = %envelope.event, "Dropping message sent while disconnected"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        let delay = policy.delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = events.closed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(10), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn backoff_factor_zero_is_constant() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            factor: 0,
        };
        assert_eq!(policy.delay(5), Duration::from_millis(100));
    }

    #[test]
    fn rejects_non_websocket_address() {
        let transport = WebSocketTransport::default();
        let err = transport
            .open(&Endpoint::new("http://localhost:5000", "/shell"))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::InvalidEndpoint(_)));
    }

    #[test]
    fn requires_runtime() {
        let transport = WebSocketTransport::default();
        let err = transport
            .open(&Endpoint::new("ws://localhost:5000", "/shell"))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::Transport(_)));
    }
}
