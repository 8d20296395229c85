//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client engine for the Asterisk Manager
//! Interface: it maintains one long-lived connection, serializes outbound
//! actions, correlates each response back to the caller that issued the
//! matching request, and fans unsolicited events out to any number of
//! subscribers.
//!
//! # Architecture
//!
//! The library uses a split reader/writer design:
//! - [`AmiClient`] (Clone + Send) — publish actions from any task; writes
//!   are linearized, responses are matched by `ActionID` so any number of
//!   actions may be in flight at once
//! - [`AmiEventStream`] — receive unsolicited events from a background
//!   reader task; register as many independent streams as you like
//!
//! # Examples
//!
//! ## Connect and publish
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError, AmiMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let (client, mut events) = AmiClient::connect("localhost", 5038, "admin", "secret").await?;
//!
//!     let response = client.publish([("Action", "Ping")].into_iter().collect()).await?;
//!     println!("Ping: {}", response.get("Ping").unwrap_or("?"));
//!
//!     client.set_event_mask("on").await?;
//!     while let Some(Ok(event)) = events.recv().await {
//!         println!("{}", event.get("Event").unwrap_or("?"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Attach to an existing stream
//!
//! Any duplex byte stream works — a TLS tunnel, a unix socket, or an
//! in-memory pipe in tests. The stream must already be past the greeting
//! banner; only blank-line delimited blocks may arrive after attaching.
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::AmiClient;
//! use tokio::net::TcpStream;
//!
//! # async fn example() -> Result<(), asterisk_ami_tokio::AmiError> {
//! let stream = TcpStream::connect(("ami.example.org", 5038)).await?;
//! // ... consume the greeting line yourself, then:
//! let (client, events) = AmiClient::attach(stream);
//! client.login("admin", "secret").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrent actions
//!
//! Responses are correlated by identifier, not by order, so concurrent
//! publishes each resolve with their own response even when the peer answers
//! out of order:
//!
//! ```rust,no_run
//! # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
//! let status = client.publish([("Action", "Status")].into_iter().collect());
//! let peers = client.publish([("Action", "SIPpeers")].into_iter().collect());
//! let (status, peers) = tokio::try_join!(status, peers)?;
//! # let _ = (status, peers);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod connection;
pub mod constants;
pub mod error;
pub mod fields;
pub mod message;

pub(crate) mod buffer;
pub(crate) mod pending;
pub(crate) mod protocol;

pub use action::{require_success, AmiAction, ResponseStatus};
pub use connection::{
    AmiClient, AmiConnectOptions, AmiEventStream, ConnectionState, DisconnectReason,
};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult};
pub use fields::{CoreField, ParseCoreFieldError};
pub use message::AmiMessage;
