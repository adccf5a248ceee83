//! Process-wide configuration.
//!
//! Built once at startup and never mutated. Defaults work out of the box;
//! `PORTER_ADDR` and `PORTER_TOKEN` override them.

use std::fmt;
use std::net::SocketAddr;

use crate::error::Error;

/// The `Authorization` value accepted when nothing else is configured.
pub const DEFAULT_CREDENTIAL: &str = "Bearer secret-token-123";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// The single accepted `Authorization` header value, e.g. `Bearer <token>`.
///
/// Compared verbatim: no scheme parsing, no trimming, no case folding.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Accepts exactly `value` as the full header value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Accepts `Bearer <token>`.
    pub fn bearer(token: &str) -> Self {
        Self(format!("Bearer {token}"))
    }

    /// `true` only when `presented` is byte-for-byte equal to the credential.
    pub fn matches(&self, presented: Option<&str>) -> bool {
        presented.is_some_and(|value| value.as_bytes() == self.0.as_bytes())
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL)
    }
}

// The secret stays out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub credential: Credential,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            credential: Credential::default(),
        }
    }
}

impl Config {
    /// Reads `PORTER_ADDR` (`host:port`) and `PORTER_TOKEN` (bare token),
    /// falling back to the defaults for whichever is unset.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let addr = lookup("PORTER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = addr.parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("PORTER_ADDR `{addr}`: {e}")))?;

        let credential = match lookup("PORTER_TOKEN") {
            Some(token) if token.is_empty() => {
                return Err(Error::Config("PORTER_TOKEN is set but empty".to_owned()));
            }
            Some(token) => Credential::bearer(&token),
            None => Credential::default(),
        };

        Ok(Self { addr, credential })
    }
}
