//! Named-message channels for the viewhost shell.
//!
//! A channel is a long-lived, bidirectional connection to one logical
//! backend endpoint ("namespace"). Messages are named and carry a JSON
//! payload.
//!
//! # Architecture
//!
//! - **Transport**: owns the connection, reconnects on its own and reports
//!   `Connected` / `Disconnected` / `Message` events in arrival order
//! - **Channel**: sends the handshake message once per `Connected` event
//!   and fans inbound messages out to every listener registered for the name
//! - **ChannelHandle**: cheap, cloneable, fire-and-forget sender
//!
//! # Example
//!
//! ```
//! use viewhost_channel::mock::MockTransport;
//! use viewhost_channel::{Channel, ChannelConfig, Endpoint};
//!
//! let transport = MockTransport::new();
//! let config = ChannelConfig::new("get_active_apps")
//!     .listener("active_apps", |payload| println!("{payload}"));
//! let mut channel = Channel::open(&transport, Endpoint::new("ws://localhost:5000", "/shell"), config).unwrap();
//!
//! transport.last_remote().unwrap().connect();
//! channel.poll_pending();
//! assert_eq!(transport.last_remote().unwrap().take_outbound()[0].event, "get_active_apps");
//! ```

mod channel;
mod endpoint;
mod error;
pub mod transport;
pub mod websocket;

pub use channel::{Channel, ChannelConfig, ChannelHandle, Listener};
pub use endpoint::Endpoint;
pub use error::{ChannelError, ChannelResult};
pub use transport::{Envelope, Transport, TransportEvent, TransportLink};
pub use transport::mock;
pub use websocket::{ReconnectPolicy, WebSocketTransport};
