//! Context URIs
//!
//! A context URI is the opaque string libiio uses to address a reachable
//! hardware context: `usb:1.2.3`, `ip:192.168.2.1`, `local:`. Once produced by
//! a scan it never changes, so the type only hands out shared views of it.

use crate::core::error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Immutable identifier of a reachable hardware context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextUri(String);

impl ContextUri {
    /// Wrap a URI as returned by a scan. Surrounding whitespace is dropped.
    pub fn new(uri: impl AsRef<str>) -> Result<Self> {
        let trimmed = uri.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DiscoveryError::InvalidUri(uri.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Parse a URI typed by a user.
    ///
    /// A bare IPv4 address is turned into a network URI (`ip:<addr>`).
    pub fn normalize(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.parse::<Ipv4Addr>().is_ok() {
            return Self::new(format!("ip:{}", trimmed));
        }
        Self::new(trimmed)
    }

    /// Transport part of the URI (`usb` for `usb:1.2.3`)
    pub fn backend(&self) -> Option<&str> {
        self.0
            .split_once(':')
            .map(|(backend, _)| backend)
            .filter(|b| !b.is_empty())
    }

    /// Address part of the URI (`1.2.3` for `usb:1.2.3`)
    pub fn address(&self) -> &str {
        self.0.split_once(':').map_or(&self.0, |(_, addr)| addr)
    }

    /// Whether the URI starts with the given prefix (`"usb:"`)
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContextUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContextUri {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContextUri {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContextUri> for String {
    fn from(uri: ContextUri) -> Self {
        uri.0
    }
}

impl AsRef<str> for ContextUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContextUri {
    fn borrow(&self) -> &str {
        &self.0
    }
}
