//! Runtime configuration

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Everything a [`crate::Downloader`] needs to know about one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Mailbox to SELECT and download.
    pub mailbox: String,
    /// Maildir root; `tmp/`, `new/` and `cur/` are created below it.
    pub maildir: PathBuf,
    /// Crash-recovery journal path. Presence at startup means a prior run
    /// left server-side cleanup debt.
    pub journal_file: PathBuf,
    /// Flag fetched messages `\Deleted` and expunge them after download.
    pub delete: bool,
    /// How long to wait for capabilities in the server greeting before
    /// asking with an explicit CAPABILITY command.
    pub greeting_wait_ms: u64,
    /// Abort after this many fetched messages (testing aid; 0 disables).
    pub simulate_error: u64,
    /// Reconcile a recovered journal, then exit without downloading.
    pub cleanup_only: bool,
    /// Accept self-signed TLS certificates.
    pub insecure_tls: bool,
}

impl Config {
    /// Load the configuration from environment variables.
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    /// - `MAILDIR`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_MAILBOX` (default: `INBOX`)
    /// - `JOURNAL_FILE` (default: `<maildir>/.mailpull-journal`)
    /// - `MAILPULL_DELETE`, `MAILPULL_CLEANUP_ONLY`, `MAILPULL_INSECURE_TLS`
    ///   (boolean, default: off)
    /// - `GREETING_WAIT_MS` (default: `2000`)
    /// - `SIMULATE_ERROR` (default: `0`, disabled)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let maildir = PathBuf::from(
            env::var("MAILDIR").map_err(|_| Error::Config("MAILDIR not set".into()))?,
        );
        let journal_file = env::var("JOURNAL_FILE")
            .map_or_else(|_| maildir.join(".mailpull-journal"), PathBuf::from);

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .unwrap_or_else(|_| "993".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            mailbox: env::var("IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string()),
            maildir,
            journal_file,
            delete: env_flag("MAILPULL_DELETE"),
            greeting_wait_ms: env_number("GREETING_WAIT_MS", 2000)?,
            simulate_error: env_number("SIMULATE_ERROR", 0)?,
            cleanup_only: env_flag("MAILPULL_CLEANUP_ONLY"),
            insecure_tls: env_flag("MAILPULL_INSECURE_TLS"),
        })
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn env_number(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
