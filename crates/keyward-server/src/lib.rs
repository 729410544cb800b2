//! Keyward production server.
//!
//! Tokio TCP runtimes for the two Keyward services, using the system clock
//! and OS randomness.
//!
//! # Architecture
//!
//! This crate provides production "glue" that wraps [`keyward_core`]'s
//! action-based logic with real I/O. [`keyward_core::Kdc`] and
//! [`keyward_core::ServerSession`] decide what to send; [`KdcServer`] and
//! [`AppServer`] do the sending.
//!
//! # Components
//!
//! - [`KdcServer`]: accepts `KEY_REQUEST` connections, one exchange each
//! - [`AppServer`]: accepts authenticated application sessions
//! - [`serve_kdc_connection`], [`serve_session`]: per-connection drivers,
//!   generic over the stream so simulations can reuse them

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod app;
mod error;
mod kdc;

pub use app::{AppServer, SessionOutcome, serve_session};
pub use error::ServerError;
pub use kdc::{KdcServer, serve_kdc_connection};
pub use keyward_core::SystemEnv;
