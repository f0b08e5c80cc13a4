//! Cluster topology and routing snapshot types

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::member::{MemberId, MemberMode, ResolvedMember};

/// Availability of the cluster as decided by one refresh pass
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AvailabilityState {
    /// No trustworthy quorum was found
    #[default]
    Unavailable,

    /// A quorum exists but every member in it is still recovering
    UnavailableRecovering,

    /// A quorum exists and at least one member accepts writes
    AvailableWritable,

    /// A quorum exists but no member accepts writes
    AvailableReadOnly,
}

impl AvailabilityState {
    /// Whether this outcome ends the candidate scan
    pub const fn is_authoritative(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Resolved view of the cluster
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Members in configuration order
    pub members: Vec<ResolvedMember>,

    /// Whether the cluster runs with a single writable member
    pub single_primary_mode: bool,

    /// Opaque cluster identity from the metadata
    pub cluster_identity: String,

    /// Availability decided for this topology
    pub availability: AvailabilityState,
}

impl ClusterTopology {
    /// Build a topology in which every configured member is unavailable
    pub fn cleared(
        members: impl IntoIterator<Item = ResolvedMember>,
        single_primary_mode: bool,
        cluster_identity: String,
    ) -> Self {
        let members = members
            .into_iter()
            .map(|member| ResolvedMember {
                mode: MemberMode::Unavailable,
                ..member
            })
            .collect();

        Self {
            members,
            single_primary_mode,
            cluster_identity,
            availability: AvailabilityState::Unavailable,
        }
    }

    /// Whether at least one member accepts writes
    pub fn has_writable_member(&self) -> bool {
        self.members.iter().any(ResolvedMember::is_writable)
    }

    /// Find a member by id
    pub fn member(&self, id: &MemberId) -> Option<&ResolvedMember> {
        self.members.iter().find(|member| &member.id == id)
    }

    /// Members the data plane may route writes to
    pub fn writable_members(&self) -> impl Iterator<Item = &ResolvedMember> {
        self.members.iter().filter(|member| member.is_writable())
    }

    /// Members the data plane may route reads to
    pub fn readable_members(&self) -> impl Iterator<Item = &ResolvedMember> {
        self.members
            .iter()
            .filter(|member| member.mode != MemberMode::Unavailable)
    }

    /// Compare member sets, ignoring order
    pub fn same_members(&self, other: &Self) -> bool {
        if self.members.len() != other.members.len() {
            return false;
        }

        let by_id = |members: &[ResolvedMember]| -> HashMap<MemberId, ResolvedMember> {
            members
                .iter()
                .map(|member| (member.id.clone(), member.clone()))
                .collect()
        };

        // A duplicated id shrinks its map below the member count
        let ours = by_id(&self.members);
        let theirs = by_id(&other.members);
        ours.len() == self.members.len() && theirs.len() == other.members.len() && ours == theirs
    }
}

/// Immutable result of one refresh pass, the unit of publication
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    /// Resolved cluster topology
    pub topology: ClusterTopology,

    /// Metadata servers to query on the next pass
    pub metadata_servers: Vec<MemberId>,

    /// When this snapshot was built
    pub generated_at: SystemTime,

    /// Member whose group view was adopted, if any held a quorum
    pub quorum_source: Option<MemberId>,
}

impl RoutingSnapshot {
    /// Create a new snapshot stamped with the current time
    pub fn new(topology: ClusterTopology, metadata_servers: Vec<MemberId>) -> Self {
        Self {
            topology,
            metadata_servers,
            generated_at: SystemTime::now(),
            quorum_source: None,
        }
    }

    /// Record the member whose group view was adopted
    #[must_use]
    pub fn with_quorum_source(mut self, member: MemberId) -> Self {
        self.quorum_source = Some(member);
        self
    }

    /// Snapshot published before the first refresh pass completes
    pub fn initial(metadata_servers: Vec<MemberId>) -> Self {
        Self::new(ClusterTopology::default(), metadata_servers)
    }

    /// Availability recorded in this snapshot
    pub const fn availability(&self) -> AvailabilityState {
        self.topology.availability
    }
}

/// Snapshots are equal when their members are, whatever their order.
impl PartialEq for RoutingSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.topology.same_members(&other.topology)
    }
}

impl Eq for RoutingSnapshot {}
