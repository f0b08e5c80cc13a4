//! Mock implementations of the cluster routing collaborators for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod group_status;
mod metadata;

use config::Config;
pub use error::{ClusterFileError, MetadataError, StatusError};
pub use group_status::MockGroupStatusSource;
pub use metadata::MockMetadataSource;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use proven_cluster_routing::{
    ClusterMetadata, ConfiguredMember, GroupStatus, HealthState, MemberId, ObservedMember,
    RoleHint, TopologyRefresher,
};

/// Port used by the convenience constructors.
pub const DEFAULT_PORT: u16 = 3306;

/// Refresher over the mock collaborators.
pub type MockRefresher = TopologyRefresher<MockMetadataSource, MockGroupStatusSource>;

/// Member id on [`DEFAULT_PORT`].
#[must_use]
pub fn member_id(host: &str) -> MemberId {
    MemberId::new(host, DEFAULT_PORT)
}

/// A mock metadata source and group status source describing one cluster.
#[derive(Clone, Debug)]
pub struct MockCluster {
    metadata: MockMetadataSource,
    group_status: MockGroupStatusSource,
}

impl MockCluster {
    /// Create a cluster serving `metadata` with no group views.
    #[must_use]
    pub fn new(metadata: ClusterMetadata) -> Self {
        Self {
            metadata: MockMetadataSource::new(metadata),
            group_status: MockGroupStatusSource::new(),
        }
    }

    /// Create a healthy single-primary cluster.
    ///
    /// The first host is primary, every member is online and reports the same
    /// view, and every member is also a metadata server.
    #[must_use]
    pub fn healthy(cluster_identity: &str, hosts: &[&str]) -> Self {
        let members = hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let role = if i == 0 {
                    RoleHint::Primary
                } else {
                    RoleHint::Secondary
                };
                ConfiguredMember::new(member_id(host), role)
            })
            .collect::<Vec<_>>();

        let observed = members
            .iter()
            .map(|member| ObservedMember::new(member.id.clone(), HealthState::Online, member.role))
            .collect();

        let cluster = Self::new(ClusterMetadata {
            metadata_servers: members.iter().map(|member| member.id.clone()).collect(),
            members,
            single_primary_mode: true,
            cluster_identity: cluster_identity.to_string(),
        });
        cluster.set_view_everywhere(observed);
        cluster
    }

    /// Create a cluster from a JSON cluster file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The cluster file cannot be read
    /// - The cluster file contains invalid JSON
    /// - An address is not `host:port`
    pub fn from_cluster_file<P: AsRef<Path>>(path: P) -> Result<Self, ClusterFileError> {
        let content = fs::read_to_string(path)?;
        Self::from_cluster_json(&content)
    }

    /// Create a cluster from the contents of a JSON cluster file
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or an address is not `host:port`.
    pub fn from_cluster_json(content: &str) -> Result<Self, ClusterFileError> {
        let config: Config = serde_json::from_str(content)?;

        let members = config
            .members
            .into_iter()
            .map(|member| -> Result<ConfiguredMember, ClusterFileError> {
                let mut configured = ConfiguredMember::new(member.address.parse()?, member.role);
                configured.alternate_port = member.alternate_port;
                Ok(configured)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let metadata_servers = config
            .metadata_servers
            .iter()
            .map(|address| address.parse())
            .collect::<Result<Vec<MemberId>, _>>()?;

        let cluster = Self::new(ClusterMetadata {
            members,
            single_primary_mode: config.single_primary_mode,
            cluster_identity: config.cluster_identity,
            metadata_servers,
        });

        for view in config.group_views {
            let observed = view
                .observed
                .into_iter()
                .map(|member| -> Result<ObservedMember, ClusterFileError> {
                    Ok(ObservedMember::new(
                        member.address.parse()?,
                        member.health,
                        member.role,
                    ))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let status = GroupStatus {
                observed,
                reporting_role: view.reporting_role,
                group_identity: view.group_identity,
            };
            cluster.group_status.set_view(view.reporter.parse()?, status);
        }

        Ok(cluster)
    }

    /// Make every configured member report `observed`.
    ///
    /// Each reporter's role is taken from its own entry in `observed`.
    pub fn set_view_everywhere(&self, observed: Vec<ObservedMember>) {
        for member in self.configured_members() {
            let reporting_role = observed
                .iter()
                .find(|o| o.id == member.id)
                .map_or(RoleHint::Unknown, |o| o.role);

            self.group_status
                .set_view(member.id, GroupStatus::new(observed.clone(), reporting_role));
        }
    }

    /// Members currently served by the metadata source.
    #[must_use]
    pub fn configured_members(&self) -> Vec<ConfiguredMember> {
        self.metadata.metadata().members
    }

    /// Get the metadata source
    #[must_use]
    pub const fn metadata_source(&self) -> &MockMetadataSource {
        &self.metadata
    }

    /// Get the group status source
    #[must_use]
    pub const fn group_status_source(&self) -> &MockGroupStatusSource {
        &self.group_status
    }

    /// Build a refresher sharing this cluster's state.
    #[must_use]
    pub fn refresher(&self) -> MockRefresher {
        TopologyRefresher::new(
            Arc::new(self.metadata.clone()),
            Arc::new(self.group_status.clone()),
        )
    }
}
