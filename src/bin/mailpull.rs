#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI: download a mailbox into a local Maildir

use clap::Parser;
use mailpull::{Config, Downloader, spawn_signal_listener};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailpull")]
#[command(about = "Download an IMAP mailbox into a Maildir, optionally deleting server-side")]
struct Args {
    /// IMAP server host
    #[arg(long, env = "IMAP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// IMAP server port (implicit TLS)
    #[arg(long, env = "IMAP_PORT", default_value_t = 993)]
    port: u16,

    #[arg(long, env = "IMAP_USERNAME")]
    username: String,

    #[arg(long, env = "IMAP_PASSWORD", hide_env_values = true)]
    password: String,

    /// Mailbox to download
    #[arg(long, env = "IMAP_MAILBOX", default_value = "INBOX")]
    mailbox: String,

    /// Maildir root for delivered messages
    #[arg(long, env = "MAILDIR")]
    maildir: PathBuf,

    /// Crash-recovery journal path [default: <maildir>/.mailpull-journal]
    #[arg(long, env = "JOURNAL_FILE")]
    journal_file: Option<PathBuf>,

    /// Flag fetched messages \Deleted and expunge them after download
    #[arg(long, env = "MAILPULL_DELETE")]
    delete: bool,

    /// How long to wait for capabilities in the greeting before asking
    #[arg(long, env = "GREETING_WAIT_MS", default_value_t = 2000)]
    greeting_wait_ms: u64,

    /// Abort after this many fetched messages (testing aid; 0 disables)
    #[arg(long, env = "SIMULATE_ERROR", default_value_t = 0)]
    simulate_error: u64,

    /// Reconcile a recovered journal, then exit without downloading
    #[arg(long, env = "MAILPULL_CLEANUP_ONLY")]
    cleanup_only: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, env = "MAILPULL_INSECURE_TLS")]
    insecure: bool,

    /// Log filter, e.g. "info" or "mailpull=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = Config {
        host: args.host,
        port: args.port,
        username: args.username,
        password: args.password,
        mailbox: args.mailbox,
        journal_file: args
            .journal_file
            .unwrap_or_else(|| args.maildir.join(".mailpull-journal")),
        maildir: args.maildir,
        delete: args.delete,
        greeting_wait_ms: args.greeting_wait_ms,
        simulate_error: args.simulate_error,
        cleanup_only: args.cleanup_only,
        insecure_tls: args.insecure,
    };

    let shutdown = spawn_signal_listener()?;
    let downloader = Downloader::connect(config, shutdown).await?;
    downloader.run().await?;
    Ok(())
}
