//! Cluster topology refresh and quorum engine for routing database connections
//!
//! This crate provides:
//! - Member and topology types (MemberId, ResolvedMember, RoutingSnapshot)
//! - Quorum validation of group status against the cluster metadata
//! - A refresh scheduler with emergency mode publishing into a lock-free snapshot store
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod emergency;
pub mod error;
pub mod member;
pub mod quorum;
pub mod refresher;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod topology;

pub use emergency::{EmergencyState, InstanceStatus};
pub use error::{
    GroupStatusError, GroupStatusErrorKind, MetadataErrorKind, MetadataSourceError,
    ParseMemberIdError, RefreshError,
};
pub use member::{
    ConfiguredMember, HealthState, MemberId, MemberMode, ObservedMember, ResolvedMember, RoleHint,
};
pub use quorum::{QuorumEngine, QuorumVerdict};
pub use refresher::TopologyRefresher;
pub use scheduler::{RefreshOutcome, RefreshScheduler, RefreshSchedulerConfig, RefreshStats};
pub use source::{ClusterMetadata, GroupStatus, GroupStatusSource, MetadataSource};
pub use store::{SnapshotStore, SnapshotSubscription};
pub use topology::{AvailabilityState, ClusterTopology, RoutingSnapshot};
