//! Error types for the mock cluster collaborators.

use proven_cluster_routing::{
    GroupStatusError, GroupStatusErrorKind, MemberId, MetadataErrorKind, MetadataSourceError,
};
use thiserror::Error;

/// Error type for the mock metadata source.
#[derive(Clone, Debug, Error)]
pub enum MetadataError {
    /// Every candidate failed to connect.
    #[error("No metadata server reachable among {0} candidate(s)")]
    NoServerReachable(usize),

    /// A candidate was reached but its metadata could not be read.
    #[error("Metadata read failed: {0}")]
    Read(String),
}

impl MetadataSourceError for MetadataError {
    fn kind(&self) -> MetadataErrorKind {
        match self {
            Self::NoServerReachable(_) => MetadataErrorKind::NoServerReachable,
            Self::Read(_) => MetadataErrorKind::NoReadableData,
        }
    }
}

/// Error type for the mock group status source.
#[derive(Clone, Debug, Error)]
pub enum StatusError {
    /// The member refused the connection.
    #[error("Could not connect to {0}")]
    Connect(MemberId),

    /// The member accepted the connection but the status query failed.
    #[error("Group status query failed on {0}: {1}")]
    Query(MemberId, String),
}

impl GroupStatusError for StatusError {
    fn kind(&self) -> GroupStatusErrorKind {
        match self {
            Self::Connect(_) => GroupStatusErrorKind::Connect,
            Self::Query(..) => GroupStatusErrorKind::Query,
        }
    }
}

/// Error when loading a cluster definition file.
#[derive(Debug, Error)]
pub enum ClusterFileError {
    /// The file could not be read.
    #[error("Failed to read cluster file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for a cluster definition.
    #[error("Failed to parse cluster file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An address in the file is not `host:port`.
    #[error("Invalid address in cluster file: {0}")]
    Address(#[from] proven_cluster_routing::ParseMemberIdError),
}
