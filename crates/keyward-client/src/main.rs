//! Keyward client binary.
//!
//! # Usage
//!
//! ```bash
//! # Interactive: one request per line, `q` to quit
//! keyward-client --client-id C1 --server-id S1 --scheme AEAD
//!
//! # Scripted
//! keyward-client --message hello --message world
//! ```

use clap::Parser;
use keyward_client::{
    Client, ClientConfig, ClientIdentity, Connection, DEFAULT_KDC_ADDR,
    DEFAULT_SERVER_ADDR, connect_tcp, fetch_credentials_tcp,
};
use keyward_core::{DEMO_CLIENT_PASSPHRASE, SystemEnv};
use keyward_crypto::Scheme;
use keyward_proto::DEFAULT_MAX_FRAME_LEN;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdout},
    net::TcpStream,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keyward protocol client
#[derive(Parser, Debug)]
#[command(name = "keyward-client")]
#[command(about = "Fetch a ticket from the KDC and talk to a Keyward server")]
#[command(version)]
struct Args {
    /// KDC address
    #[arg(long, default_value = DEFAULT_KDC_ADDR)]
    kdc: String,

    /// Application server address
    #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
    server: String,

    /// Client identity
    #[arg(long, default_value = "C1")]
    client_id: String,

    /// Server identity to request a ticket for
    #[arg(long, default_value = "S1")]
    server_id: String,

    /// Envelope scheme (AEAD or MAC_THEN_ENCRYPT)
    #[arg(long, default_value = "AEAD")]
    scheme: Scheme,

    /// Send this message and exit (repeatable)
    #[arg(short, long)]
    message: Vec<String>,

    /// Client master key passphrase
    #[arg(long, env = "KEYWARD_CLIENT_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Maximum accepted frame body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let passphrase = args.passphrase.clone().unwrap_or_else(|| {
        tracing::warn!("KEYWARD_CLIENT_PASSPHRASE not set - using the built-in demo passphrase");
        DEMO_CLIENT_PASSPHRASE.to_string()
    });

    let config = ClientConfig {
        kdc_addr: args.kdc,
        server_addr: args.server,
        server_id: args.server_id,
        scheme: args.scheme,
        max_frame_len: args.max_frame_len,
    };

    let identity = ClientIdentity::from_passphrase(args.client_id, &passphrase);
    let mut client = Client::new(SystemEnv::new(), identity);
    let mut stdout = tokio::io::stdout();

    let credentials = fetch_credentials_tcp(
        config.kdc_addr.as_str(),
        &mut client,
        &config.server_id,
        config.scheme,
        config.max_frame_len,
    )
    .await?;
    say(&mut stdout, &format!("[client] ticket valid until {}", credentials.expiry())).await?;

    let mut connection =
        connect_tcp(config.server_addr.as_str(), &client, credentials, config.max_frame_len).await?;
    say(&mut stdout, &format!("[client] {}", connection.channel().greeting())).await?;

    if args.message.is_empty() {
        interactive(&mut connection, &mut stdout).await?;
    } else {
        for text in &args.message {
            let reply = connection.send(text).await?;
            say(&mut stdout, &format!("[server] {reply}")).await?;
        }
    }

    connection.close().await?;
    say(&mut stdout, "[client] bye").await?;

    Ok(())
}

/// Read lines from stdin until `q` or EOF, sending each as a request.
async fn interactive(
    connection: &mut Connection<TcpStream, SystemEnv>,
    stdout: &mut Stdout,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(text) = next_request(&mut lines).await? {
        let reply = connection.send(&text).await?;
        say(stdout, &format!("[server] {reply}")).await?;
    }

    Ok(())
}

/// Next non-empty line, trimmed. `None` on `q` or end of input.
///
/// A read failure is returned as an error, not treated as a quit.
async fn next_request<R>(lines: &mut Lines<R>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text == "q" {
            return Ok(None);
        }
        if !text.is_empty() {
            return Ok(Some(text.to_string()));
        }
    }

    Ok(None)
}

async fn say(stdout: &mut Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
