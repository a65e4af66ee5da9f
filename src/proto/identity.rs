//! `nick!user@host` identities.

use std::fmt;

/// The origin of a message, split into its three components.
///
/// Parsing is lenient: any component that is missing from the source token
/// is left empty. Server prefixes such as `irc.example.net` end up entirely
/// in `nick`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    pub nick: String,
    pub user: String,
    pub host: String,
}

impl Identity {
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Parse a prefix token. A single leading `:` is ignored.
    pub fn parse(token: &str) -> Self {
        let token = token.strip_prefix(':').unwrap_or(token);

        let (rest, host) = match token.split_once('@') {
            Some((rest, host)) => (rest, host),
            None => (token, ""),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((nick, user)) => (nick, user),
            None => (rest, ""),
        };

        Self::new(nick, user, host)
    }

    /// Whether this identity names a user rather than a server.
    pub fn is_user(&self) -> bool {
        !self.user.is_empty() || !self.host.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}@{}", self.nick, self.user, self.host)
    }
}
