//! Client
//!
//! Action-based client for the Keyward protocol: fetch credentials from the
//! KDC, authenticate to the application server, then exchange sequenced,
//! encrypted messages.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO pattern as [`keyward_core`]. The
//! state machines ([`Client`], [`Channel`]) turn incoming messages into
//! results and build outgoing messages; the async driver in [`transport`]
//! moves those messages over a stream.
//!
//! # Components
//!
//! - [`Client`]: credential intake and handshake
//! - [`Channel`]: the client side of the sequenced channel
//! - [`transport::Connection`]: an authenticated channel bound to a stream
//! - [`transport::fetch_credentials_tcp`], [`transport::connect_tcp`]: TCP
//!   entry points

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod channel;
mod client;
mod config;
mod error;
pub mod transport;

pub use channel::{Channel, ChannelState};
pub use client::{Client, ClientIdentity, Credentials, PendingHandshake};
pub use config::{ClientConfig, DEFAULT_KDC_ADDR, DEFAULT_SERVER_ADDR};
pub use error::ClientError;
pub use keyward_core::Environment;
pub use transport::{Connection, connect_tcp, fetch_credentials_tcp, request_credentials};
