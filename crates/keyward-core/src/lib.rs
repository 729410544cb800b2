//! Keyward Protocol Core
//!
//! Sans-IO logic for the Keyward key distribution protocol: ticket issuance,
//! the server-side handshake and the sequenced application channel. The
//! runtimes in `keyward-server` and `keyward-client` drive these state
//! machines over real sockets; `keyward-harness` drives them over simulated
//! ones.
//!
//! # Components
//!
//! - [`Kdc`]: validates `KEY_REQUEST`s and seals tickets and credential
//!   packages
//! - [`ServerSession`]: per-connection state machine returning
//!   [`SessionAction`]s
//! - [`ReplayGuard`]: authenticators already accepted behind one listener
//! - [`transport`]: length-prefixed message I/O over any async stream
//! - [`Environment`]: wall clock and randomness, injected everywhere
//!
//! With the `system-env` feature enabled, this crate also provides
//! `SystemEnv`, the production environment (OS clock, OS RNG).
//!
//! # Security
//!
//! - Time checks (ticket expiry, authenticator skew) read the wall clock at
//!   validation time, never a cached value
//! - Session keys live only inside a session or an in-flight KDC response
//!   and are zeroized on drop
//! - Every fatal error ends the session: no retry, no downgrade

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod kdc;
pub mod replay;
pub mod session;
#[cfg(feature = "system-env")]
mod system_env;
pub mod ticket;
pub mod transport;

pub use config::{
    DEFAULT_MAX_CLOCK_SKEW, DEFAULT_TICKET_LIFETIME, DEMO_CLIENT_PASSPHRASE, DEMO_SERVER_PASSPHRASE,
    KdcConfig, ServerConfig,
};
pub use env::Environment;
pub use error::{AuthFailure, ErrorKind, KdcError, SessionError, TransportError};
pub use kdc::Kdc;
pub use replay::ReplayGuard;
pub use session::{EchoHandler, MessageHandler, ServerSession, SessionAction, SessionState};
#[cfg(feature = "system-env")]
pub use system_env::SystemEnv;
pub use ticket::{Authenticator, CredentialPackage, TicketBody};
pub use transport::{read_message, write_message};
