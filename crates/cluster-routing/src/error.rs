//! Error types for topology refresh

use std::error::Error;
use std::fmt::{self, Debug};
use thiserror::Error as ThisError;

/// Whole-pass refresh failures
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RefreshError {
    /// Every metadata server candidate failed to connect
    #[error("No metadata server reachable: {0}")]
    NoMetadataServerReachable(String),

    /// At least one metadata server was reached but none returned usable data
    #[error("No metadata read successful: {0}")]
    NoMetadataReadSuccessful(String),
}

impl RefreshError {
    /// Build a refresh error from a metadata source error
    pub fn from_metadata_error<E>(error: &E) -> Self
    where
        E: MetadataSourceError,
    {
        match error.kind() {
            MetadataErrorKind::NoServerReachable => {
                Self::NoMetadataServerReachable(error.to_string())
            }
            MetadataErrorKind::NoReadableData => Self::NoMetadataReadSuccessful(error.to_string()),
        }
    }
}

/// Marker trait for `MetadataSource` errors
pub trait MetadataSourceError: Debug + Error + Send + Sync {
    /// Returns the kind of this error
    fn kind(&self) -> MetadataErrorKind;
}

/// The kind of metadata source error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetadataErrorKind {
    /// Every candidate address failed to connect
    NoServerReachable,

    /// Connected, but the query or its parsing failed on all candidates
    NoReadableData,
}

impl fmt::Display for MetadataErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `GroupStatusSource` errors
pub trait GroupStatusError: Debug + Error + Send + Sync {
    /// Returns the kind of this error
    fn kind(&self) -> GroupStatusErrorKind;
}

/// The kind of group status error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupStatusErrorKind {
    /// Could not connect to the member
    Connect,

    /// Connected, but the status query failed
    Query,
}

impl fmt::Display for GroupStatusErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Errors parsing a `host:port` member address
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ParseMemberIdError {
    /// No `:port` suffix
    #[error("Missing port in address '{0}'")]
    MissingPort(String),

    /// Empty host part
    #[error("Missing host in address '{0}'")]
    MissingHost(String),

    /// Port is not a valid u16
    #[error("Invalid port in address '{0}'")]
    InvalidPort(String),
}
