//! Simulated KDC and application server hosts for turmoil.
//!
//! Both hosts run the production per-connection drivers
//! ([`serve_kdc_connection`], [`serve_session`]) over turmoil TCP. The
//! application host records how every session ended so tests can assert on
//! the server's view as well as the client's.

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

use keyward_core::{EchoHandler, Kdc, KdcConfig, ReplayGuard, ServerConfig, ServerSession};
use keyward_crypto::MasterKey;
use keyward_server::{SessionOutcome, serve_kdc_connection, serve_session};
use tokio::io::AsyncWriteExt;
use turmoil::net::TcpListener;

use crate::SimEnv;

/// Port the simulated KDC listens on.
pub const KDC_PORT: u16 = 9000;

/// Port the simulated application server listens on.
pub const APP_PORT: u16 = 9001;

/// Client passphrase shared by the simulated KDC and test clients.
pub const SIM_CLIENT_PASSPHRASE: &str = "sim-client";

/// Server passphrase shared by the simulated KDC and application server.
pub const SIM_SERVER_PASSPHRASE: &str = "sim-server";

/// Server identity used throughout the simulation.
pub const SIM_SERVER_ID: &str = "S1";

/// Session outcomes observed by the application host, in completion order.
#[derive(Debug, Clone, Default)]
pub struct OutcomeLog(Arc<Mutex<Vec<SessionOutcome>>>);

impl OutcomeLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, outcome: SessionOutcome) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(outcome);
    }

    /// Snapshot of every outcome recorded so far.
    pub fn outcomes(&self) -> Vec<SessionOutcome> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// KDC configured with the simulation passphrases.
pub fn sim_kdc(env: SimEnv) -> Kdc<SimEnv> {
    let config = KdcConfig::new(
        MasterKey::from_passphrase(SIM_CLIENT_PASSPHRASE),
        MasterKey::from_passphrase(SIM_SERVER_PASSPHRASE),
        SIM_SERVER_ID,
    );
    Kdc::new(config, env)
}

/// Application server configuration matching [`sim_kdc`].
pub fn sim_server_config() -> ServerConfig {
    ServerConfig::new(SIM_SERVER_ID, MasterKey::from_passphrase(SIM_SERVER_PASSPHRASE))
}

/// Run a KDC host until the simulation ends.
///
/// # Errors
///
/// - `io::Error` if the listener cannot be bound
pub async fn run_kdc(kdc: Kdc<SimEnv>) -> io::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{KDC_PORT}").as_str()).await?;
    let max_frame_len = kdc.config().max_frame_len;

    loop {
        let (mut stream, peer) = listener.accept().await?;
        let kdc = kdc.clone();

        tokio::spawn(async move {
            if let Err(e) = serve_kdc_connection(&mut stream, &kdc, max_frame_len).await {
                tracing::debug!(%peer, error = %e, "sim KDC connection error");
            }
            let _ = stream.shutdown().await;
        });
    }
}

/// Run an echo application host until the simulation ends.
///
/// # Errors
///
/// - `io::Error` if the listener cannot be bound
pub async fn run_app(config: ServerConfig, env: SimEnv, log: OutcomeLog) -> io::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{APP_PORT}").as_str()).await?;
    let config = Arc::new(config);
    let replay = ReplayGuard::new();

    loop {
        let (stream, peer) = listener.accept().await?;
        let session =
            ServerSession::new(Arc::clone(&config), replay.clone(), env.clone(), EchoHandler);
        let max_frame_len = config.max_frame_len;
        let log = log.clone();

        tokio::spawn(async move {
            let outcome = serve_session(stream, session, max_frame_len).await;
            tracing::debug!(%peer, ?outcome, "sim session ended");
            log.push(outcome);
        });
    }
}
