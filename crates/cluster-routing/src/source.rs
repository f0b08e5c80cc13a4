//! Collaborator interfaces for metadata and group status

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GroupStatusError, MetadataSourceError};
use crate::member::{ConfiguredMember, MemberId, ObservedMember, RoleHint};

/// Configured topology as returned by a metadata server
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    /// Members the metadata says should exist, in configuration order
    pub members: Vec<ConfiguredMember>,

    /// Whether the cluster is configured with a single writable member
    pub single_primary_mode: bool,

    /// Opaque cluster identity
    pub cluster_identity: String,

    /// Up-to-date list of metadata server addresses
    pub metadata_servers: Vec<MemberId>,
}

/// One member's view of the consensus group
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupStatus {
    /// Every member the reporting node currently sees
    pub observed: Vec<ObservedMember>,

    /// Role the reporting node claims for itself
    pub reporting_role: RoleHint,

    /// Identity of the group the reporting node belongs to, if it reports one
    pub group_identity: Option<String>,
}

impl GroupStatus {
    /// Create a new group status without a group identity
    pub const fn new(observed: Vec<ObservedMember>, reporting_role: RoleHint) -> Self {
        Self {
            observed,
            reporting_role,
            group_identity: None,
        }
    }

    /// Attach the identity of the reporting group
    #[must_use]
    pub fn with_group_identity(mut self, identity: impl Into<String>) -> Self {
        self.group_identity = Some(identity.into());
        self
    }
}

/// Source of the configured cluster topology.
#[async_trait]
pub trait MetadataSource
where
    Self: Send + Sync + 'static,
{
    /// The error type for this source.
    type Error: MetadataSourceError;

    /// Fetch the configured topology from the first usable candidate.
    async fn fetch(&self, candidates: &[MemberId]) -> Result<ClusterMetadata, Self::Error>;
}

/// Source of runtime group membership and health.
#[async_trait]
pub trait GroupStatusSource
where
    Self: Send + Sync + 'static,
{
    /// The error type for this source.
    type Error: GroupStatusError;

    /// Ask one member for its view of the group.
    async fn fetch(&self, member: &MemberId) -> Result<GroupStatus, Self::Error>;
}
