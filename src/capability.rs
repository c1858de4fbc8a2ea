//! Server capability tags

use std::fmt;

/// A capability advertised by the server, as seen in the greeting, in
/// untagged CAPABILITY data, or in a `[CAPABILITY ...]` status code.
///
/// Only the capabilities this client acts on get dedicated variants;
/// everything else is preserved as [`Capability::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Baseline protocol support; required before LOGIN.
    Imap4rev1,
    /// The server refuses plaintext LOGIN.
    LoginDisabled,
    /// The server supports `UID EXPUNGE` (RFC 4315).
    UidPlus,
    Idle,
    Other(String),
}

impl Capability {
    /// Parse a capability token, case-insensitively.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "IMAP4REV1" => Self::Imap4rev1,
            "LOGINDISABLED" => Self::LoginDisabled,
            "UIDPLUS" => Self::UidPlus,
            "IDLE" => Self::Idle,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Imap4rev1 => "IMAP4rev1",
            Self::LoginDisabled => "LOGINDISABLED",
            Self::UidPlus => "UIDPLUS",
            Self::Idle => "IDLE",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}
