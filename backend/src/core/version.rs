//! Protocol version
//!
//! Settlement behaviour is keyed by the lowest protocol version active on the
//! network. Versions order numerically (1.10.0 > 1.9.0).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid protocol version: {0}")]
pub struct VersionParseError(pub String);

impl FromStr for ProtocolVersion {
    type Err = VersionParseError;

    /// Parses `MAJOR.MINOR.PATCH`; a missing patch component defaults to 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(VersionParseError(s.to_string()));
        }
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| VersionParseError(s.to_string()))
        };
        let major = parse(parts[0])?;
        let minor = parse(parts[1])?;
        let patch = match parts.get(2) {
            Some(part) => parse(part)?,
            None => 0,
        };
        Ok(Self::new(major, minor, patch))
    }
}
