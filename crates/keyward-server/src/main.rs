//! Keyward server binary.
//!
//! # Usage
//!
//! ```bash
//! # KDC and application server in one process (development)
//! keyward-server all
//!
//! # Separate processes
//! KEYWARD_CLIENT_PASSPHRASE=... KEYWARD_SERVER_PASSPHRASE=... \
//!     keyward-server kdc --bind 0.0.0.0:9000
//! KEYWARD_SERVER_PASSPHRASE=... keyward-server app --bind 0.0.0.0:9001
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use keyward_core::{
    DEFAULT_MAX_CLOCK_SKEW, DEFAULT_TICKET_LIFETIME, DEMO_CLIENT_PASSPHRASE, DEMO_SERVER_PASSPHRASE,
    EchoHandler, Kdc, KdcConfig, ServerConfig,
};
use keyward_crypto::MasterKey;
use keyward_proto::DEFAULT_MAX_FRAME_LEN;
use keyward_server::{AppServer, KdcServer, ServerError, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keyward protocol server
#[derive(Parser, Debug)]
#[command(name = "keyward-server")]
#[command(about = "Keyward key distribution center and application server")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Identity of the application server
    #[arg(long, global = true, default_value = "S1")]
    server_id: String,

    /// Client master key passphrase (KDC only)
    #[arg(long, env = "KEYWARD_CLIENT_PASSPHRASE", hide_env_values = true, global = true)]
    client_passphrase: Option<String>,

    /// Server master key passphrase
    #[arg(long, env = "KEYWARD_SERVER_PASSPHRASE", hide_env_values = true, global = true)]
    server_passphrase: Option<String>,

    /// Ticket lifetime in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TICKET_LIFETIME.as_secs())]
    ticket_lifetime: u64,

    /// Accepted authenticator clock skew in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CLOCK_SKEW.as_secs())]
    max_clock_skew: u64,

    /// Maximum accepted frame body in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the key distribution center
    Kdc {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        bind: String,
    },

    /// Run the application server
    App {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:9001")]
        bind: String,
    },

    /// Run both services in one process
    All {
        /// KDC address to bind to
        #[arg(long, default_value = "127.0.0.1:9000")]
        kdc_bind: String,

        /// Application server address to bind to
        #[arg(long, default_value = "127.0.0.1:9001")]
        app_bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Keyward server starting");

    if args.ticket_lifetime == 0 {
        return Err(ServerError::Config("ticket lifetime must be positive".to_string()).into());
    }

    let env = SystemEnv::new();

    match &args.command {
        Command::Kdc { bind } => {
            let kdc = KdcServer::bind(bind.as_str(), Kdc::new(kdc_config(&args), env)).await?;
            kdc.run().await?;
        },
        Command::App { bind } => {
            let app =
                AppServer::bind(bind.as_str(), server_config(&args), env, EchoHandler).await?;
            app.run().await?;
        },
        Command::All { kdc_bind, app_bind } => {
            let kdc =
                KdcServer::bind(kdc_bind.as_str(), Kdc::new(kdc_config(&args), env)).await?;
            let app =
                AppServer::bind(app_bind.as_str(), server_config(&args), env, EchoHandler).await?;
            tokio::try_join!(kdc.run(), app.run())?;
        },
    }

    Ok(())
}

fn kdc_config(args: &Args) -> KdcConfig {
    let client_key = master_key(
        args.client_passphrase.as_deref(),
        "KEYWARD_CLIENT_PASSPHRASE",
        DEMO_CLIENT_PASSPHRASE,
    );
    let server_key = master_key(
        args.server_passphrase.as_deref(),
        "KEYWARD_SERVER_PASSPHRASE",
        DEMO_SERVER_PASSPHRASE,
    );

    KdcConfig::new(client_key, server_key, args.server_id.clone())
        .with_ticket_lifetime(Duration::from_secs(args.ticket_lifetime))
        .with_max_frame_len(args.max_frame_len)
}

fn server_config(args: &Args) -> ServerConfig {
    let server_key = master_key(
        args.server_passphrase.as_deref(),
        "KEYWARD_SERVER_PASSPHRASE",
        DEMO_SERVER_PASSPHRASE,
    );

    ServerConfig::new(args.server_id.clone(), server_key)
        .with_max_clock_skew(Duration::from_secs(args.max_clock_skew))
        .with_max_frame_len(args.max_frame_len)
}

fn master_key(passphrase: Option<&str>, var: &str, demo: &str) -> MasterKey {
    if let Some(passphrase) = passphrase {
        return MasterKey::from_passphrase(passphrase);
    }

    tracing::warn!("{var} not set - using the built-in demo passphrase");
    tracing::warn!("This is NOT suitable for production use!");
    MasterKey::from_passphrase(demo)
}
