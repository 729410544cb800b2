//! Deterministic simulation harness for Keyward protocol testing.
//!
//! Turmoil hosts for the KDC and application server, plus a seeded
//! [`Environment`](keyward_core::Environment) with a wall clock that tests
//! move by hand. Ticket expiry and authenticator skew are exercised by
//! moving that clock, never by sleeping.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod sim_server;

pub use sim_env::{SIM_EPOCH_SECS, SimEnv};
pub use sim_server::{
    APP_PORT, KDC_PORT, OutcomeLog, SIM_CLIENT_PASSPHRASE, SIM_SERVER_ID, SIM_SERVER_PASSPHRASE,
    run_app, run_kdc, sim_kdc, sim_server_config,
};
