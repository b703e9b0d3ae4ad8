//! UDP transport for oscpack
//!
//! [`OscSender`] encodes packets and writes one datagram per packet.
//! [`OscReceiver`] binds a socket, runs a blocking receive loop on its own
//! thread and hands every decoded packet to an
//! [`oscpack_core::Dispatcher`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use oscpack_core::{Dispatcher, Message, TimeTag};
//! use oscpack_transport::{OscReceiver, OscSender, ReceiverConfig, SenderConfig};
//!
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.add_listener("/ping", |_: Option<TimeTag>, m: &Message| {
//!     println!("ping from {:?}", m.source());
//! })?;
//!
//! let mut receiver = OscReceiver::bind(ReceiverConfig::bind("127.0.0.1:57120"))?;
//! receiver.start(dispatcher)?;
//!
//! let sender = OscSender::bind(SenderConfig::to("127.0.0.1:57120"))?;
//! sender.send(&Message::new("/ping")?.into())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod udp;

pub use config::{ReceiverConfig, SenderConfig, MAX_DATAGRAM_SIZE};
pub use error::{Result, TransportError};
pub use udp::{OscReceiver, OscSender, ReceiveStats};
