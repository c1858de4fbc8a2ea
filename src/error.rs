//! Error types for mailpull

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A command completed with a tagged NO/BAD, or the server closed the
    /// connection while a command was outstanding.
    #[error("IMAP error: {0}")]
    Imap(String),

    /// The server sent a response this client cannot make sense of.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The session cannot continue: missing IMAP4rev1, LOGINDISABLED,
    /// a FETCH response without a UID, or an illegal state transition.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Journal read/write failure. A corrupted journal is fatal on read;
    /// write failures are swallowed by the teardown path.
    #[error("journal error: {0}")]
    Journal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    /// A second SIGINT/SIGTERM arrived before the graceful quit finished.
    #[error("interrupted by second signal")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;
