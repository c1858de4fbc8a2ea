#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Fetch-and-delete IMAP downloader
//!
//! Connects to an IMAP server over TLS, downloads every message in a
//! mailbox into a local Maildir, and optionally flags-and-expunges the
//! server-side copies. A run that is interrupted after delivering
//! messages but before expunging them persists a journal of the
//! affected UIDs; the next run reconciles that debt before downloading
//! again, so delivery is at-least-once with eventual cleanup.

mod capability;
mod command;
mod config;
mod downloader;
mod error;
mod flag;
mod headers;
mod journal;
mod maildir;
mod parser;
mod sequence;
mod session;
mod signals;
mod state;
mod timer;
mod transport;

pub use capability::Capability;
pub use config::Config;
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use flag::Flag;
pub use journal::Journal;
pub use maildir::{Delivery, Maildir};
pub use parser::{ResponseHandler, ResponseParser, Status, TaggedResponse};
pub use sequence::SequenceSet;
pub use signals::{ShutdownSignal, shutdown_channel, spawn_signal_listener};
pub use state::ConnectionState;
pub use transport::{Transport, connect};
