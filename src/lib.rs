//! # twirc
//!
//! A Twitch chat client: tokenizes Twitch's tagged IRC lines, turns them
//! into typed events and keeps a connection alive across server-initiated
//! disconnects.
//!
//! ## Features
//!
//! - Lenient tokenizer for tagged IRC lines, built on `nom`
//! - Typed events for every command Twitch chat sends, with replaceable
//!   per-command builders
//! - Listener callbacks for events and connection lifecycle
//! - Optional Tokio client (default `tokio` feature) with login, keep-alive,
//!   rate-limited sending and reconnect policies
//! - Optional `serde` support for events and configuration

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing lines
//!
//! ```rust
//! use twirc::builder::{BuildContext, BuilderRegistry};
//! use twirc::event::TypedEvent;
//! use twirc::ParsedLine;
//!
//! let raw = "@color=#FF69B4;display-name=Gikkman :gikkman!gikkman@gikkman.tmi.twitch.tv PRIVMSG #gikkman :hello";
//! let line: ParsedLine = raw.parse().expect("valid line");
//! assert_eq!(line.tag("display-name"), Some("Gikkman"));
//!
//! let registry = BuilderRegistry::new(BuildContext::new("gikkbot", "gikkman"));
//! if let TypedEvent::PrivateMessage(message) = registry.build(&line) {
//!     assert_eq!(message.text, "hello");
//! }
//! ```
//!
//! ### Connecting
//!
//! See [`client::TwitchClient`].

pub mod builder;
pub mod caps;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod util;

#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub mod config;
#[cfg(feature = "tokio")]
pub mod transport;
#[cfg(feature = "tokio")]
pub mod writer;

pub use self::builder::{BuildContext, BuilderRegistry, EventBuilder};
pub use self::caps::Capability;
pub use self::dispatch::{DisconnectReason, Dispatcher, EventListener};
pub use self::error::{BuildError, TokenizeError};
pub use self::event::{TwitchUser, TypedEvent, UserType};
pub use self::message::{ParsedLine, Tags};

#[cfg(feature = "tokio")]
pub use self::client::{
    BoundedRetry, ClientOptions, ConnectionState, ReconnectPolicy, TwitchClient,
};
#[cfg(feature = "tokio")]
pub use self::config::{ClientConfig, ReconnectSettings};
#[cfg(feature = "tokio")]
pub use self::error::{ClientError, TransportError};
#[cfg(feature = "tokio")]
pub use self::transport::{BoxedStream, Connector, LineCodec, TcpConnector};
#[cfg(feature = "tokio")]
pub use self::writer::RateLimit;
