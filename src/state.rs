//! Connection lifecycle states
//!
//! The session walks this ladder from `Disconnected` to `End`. The driver
//! advances the state at gateway points; the read loop inspects it to
//! decide whether a connection close is expected.

use std::fmt;

/// Canonical protocol state, in session order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    Established,
    GotInitialCapabilities,
    LoggedIn,
    GotCapabilities,
    SelectedMailbox,
    Fetching,
    Fetched,
    Stored,
    Expunged,
    LoggingOut,
    LoggedOut,
    End,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Established => "ESTABLISHED",
            Self::GotInitialCapabilities => "GOT_INITIAL_CAPABILITIES",
            Self::LoggedIn => "LOGGED_IN",
            Self::GotCapabilities => "GOT_CAPABILITIES",
            Self::SelectedMailbox => "SELECTED_MAILBOX",
            Self::Fetching => "FETCHING",
            Self::Fetched => "FETCHED",
            Self::Stored => "STORED",
            Self::Expunged => "EXPUNGED",
            Self::LoggingOut => "LOGGING_OUT",
            Self::LoggedOut => "LOGGED_OUT",
            Self::End => "END",
        }
    }

    /// Legal-transition gate: monotone forward progress (re-asserting
    /// the current state included), or the shutdown jump into
    /// `LoggedOut` from anywhere. The state is never decremented.
    #[must_use]
    pub fn can_advance(self, next: Self) -> bool {
        next >= self || next == Self::LoggedOut
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
