//! A single topology refresh pass

use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GroupStatusError, RefreshError};
use crate::member::{MemberId, MemberMode, ResolvedMember};
use crate::quorum::QuorumEngine;
use crate::source::{ClusterMetadata, GroupStatusSource, MetadataSource};
use crate::topology::{ClusterTopology, RoutingSnapshot};

/// Builds one `RoutingSnapshot` from the metadata and the first member holding a quorum.
pub struct TopologyRefresher<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    metadata_source: Arc<M>,
    group_status_source: Arc<G>,
}

impl<M, G> TopologyRefresher<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    /// Create a new refresher over the given collaborators
    pub const fn new(metadata_source: Arc<M>, group_status_source: Arc<G>) -> Self {
        Self {
            metadata_source,
            group_status_source,
        }
    }

    /// Get the metadata source
    pub const fn metadata_source(&self) -> &Arc<M> {
        &self.metadata_source
    }

    /// Get the group status source
    pub const fn group_status_source(&self) -> &Arc<G> {
        &self.group_status_source
    }

    /// Run one refresh pass against `metadata_servers`.
    ///
    /// Members are asked for their group view in configuration order and the
    /// first view holding a quorum is adopted. When no member holds one, every
    /// configured member is returned as unavailable.
    ///
    /// # Errors
    ///
    /// Returns a [`RefreshError`] when the metadata could not be fetched.
    /// Per-member group status failures are never surfaced.
    pub async fn refresh(
        &self,
        metadata_servers: &[MemberId],
    ) -> Result<RoutingSnapshot, RefreshError> {
        debug!(
            "Fetching cluster metadata from {} candidate server(s)",
            metadata_servers.len()
        );

        let metadata = self
            .metadata_source
            .fetch(metadata_servers)
            .await
            .map_err(|e| RefreshError::from_metadata_error(&e))?;

        let metadata_servers = if metadata.metadata_servers.is_empty() {
            warn!("Metadata returned no metadata servers, keeping the previous list");
            metadata_servers.to_vec()
        } else {
            metadata.metadata_servers.clone()
        };

        debug!(
            "Metadata for cluster '{}' lists {} member(s)",
            metadata.cluster_identity,
            metadata.members.len()
        );

        for candidate in &metadata.members {
            let status = match self.group_status_source.fetch(&candidate.id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        "Failed to fetch group status from {} ({}): {}",
                        candidate.id,
                        e.kind(),
                        e
                    );
                    continue;
                }
            };

            if let Some(group_identity) = &status.group_identity {
                if !metadata.cluster_identity.is_empty()
                    && *group_identity != metadata.cluster_identity
                {
                    warn!(
                        "Member {} belongs to group '{}', not '{}', ignoring its view",
                        candidate.id, group_identity, metadata.cluster_identity
                    );
                    continue;
                }
            }

            let verdict = QuorumEngine::evaluate(
                &metadata.members,
                &status,
                &candidate.id,
                metadata.single_primary_mode,
            );

            if !verdict.availability.is_authoritative() {
                debug!(
                    "Member {} does not see a quorum ({} of {} members)",
                    candidate.id, verdict.quorum_count, verdict.total
                );
                continue;
            }

            info!(
                "Member {} sees a quorum ({} of {} members): {}",
                candidate.id, verdict.quorum_count, verdict.total, verdict.availability
            );

            let topology = ClusterTopology {
                members: verdict.members,
                single_primary_mode: metadata.single_primary_mode,
                cluster_identity: metadata.cluster_identity,
                availability: verdict.availability,
            };

            return Ok(RoutingSnapshot::new(topology, metadata_servers)
                .with_quorum_source(candidate.id.clone()));
        }

        warn!(
            "No member of cluster '{}' reported a quorum, clearing routing table",
            metadata.cluster_identity
        );

        Ok(RoutingSnapshot::new(
            Self::cleared_topology(metadata),
            metadata_servers,
        ))
    }

    fn cleared_topology(metadata: ClusterMetadata) -> ClusterTopology {
        let members = metadata
            .members
            .iter()
            .map(|member| ResolvedMember::from_configured(member, MemberMode::Unavailable));

        ClusterTopology::cleared(
            members,
            metadata.single_primary_mode,
            metadata.cluster_identity,
        )
    }
}

impl<M, G> Debug for TopologyRefresher<M, G>
where
    M: MetadataSource + Debug,
    G: GroupStatusSource + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyRefresher")
            .field("metadata_source", &self.metadata_source)
            .field("group_status_source", &self.group_status_source)
            .finish()
    }
}
