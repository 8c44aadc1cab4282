//! Server selection and connection request construction.
//!
//! Everything in this module runs before any OS mutation or subprocess
//! spawn: its errors never require cleanup.
//!
//! - `selector`: catalog filtering, single/fastest selection, multi-hop
//!   resolution, latency probing
//! - `request`: validated construction of an immutable connection plan

pub mod request;
pub mod selector;

use std::fmt;

// Re-export commonly used items
pub use request::{build_plan, ConnectOptions, ConnectionPlan, Hop, TunnelEndpoints};
pub use selector::{filter_servers, FilterOptions, LatencyProber, PingProber};

/// Server lookup failed or was not specific enough.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolutionError {
    /// No catalog record matched the filter.
    NotFound,
    /// More than one record matched and `--any` was not given.
    Ambiguous(usize),
    /// No filtered candidate could be latency-probed for `--fastest`.
    ProbeFailed(String),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no servers found by your filter"),
            Self::Ambiguous(count) => write!(
                f,
                "{count} servers found; refine the filter (--fl, --fcity, --fcc, --fc) or pass --any to take the first match"
            ),
            Self::ProbeFailed(reason) => {
                write!(f, "failed to probe servers to determine fastest: {reason}")
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Malformed or contradictory connection request.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither a location nor `--fastest` was given.
    MissingLocation,
    /// Manual DNS string does not parse as an IP address.
    BadDnsAddress(String),
    /// Multi-hop entry and exit servers share a gateway or country code.
    InvalidMultiHopPair { entry: String, exit: String },
    /// Flags that cannot be combined.
    IncompatibleFlags(String),
    /// The session-supplied client tunnel parameters are missing.
    MissingClientConfig(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation => {
                write!(f, "a server location is required unless --fastest is given")
            }
            Self::BadDnsAddress(s) => write!(f, "'{s}' is not a valid DNS server address"),
            Self::InvalidMultiHopPair { entry, exit } => write!(
                f,
                "unable to use entry and exit servers from the same country for a multi-hop connection ({entry} / {exit})"
            ),
            Self::IncompatibleFlags(msg) => write!(f, "{msg}"),
            Self::MissingClientConfig(what) => {
                write!(f, "missing client tunnel parameter: {what}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Any pre-connection failure of building a request.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    Validation(ValidationError),
    Resolution(ResolutionError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Resolution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Resolution(e) => Some(e),
        }
    }
}

impl From<ValidationError> for RequestError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<ResolutionError> for RequestError {
    fn from(e: ResolutionError) -> Self {
        Self::Resolution(e)
    }
}
