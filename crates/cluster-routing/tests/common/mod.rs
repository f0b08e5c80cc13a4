//! Test helpers shared by the cluster routing integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use proven_cluster_routing::{
    ClusterMetadata, ConfiguredMember, EmergencyState, HealthState, ObservedMember,
    RefreshScheduler, RefreshSchedulerConfig, RoleHint, SnapshotStore,
};
use proven_cluster_routing_mock::{
    MockCluster, MockGroupStatusSource, MockMetadataSource, member_id,
};

/// Scheduler over the mock collaborators
pub type TestScheduler = RefreshScheduler<MockMetadataSource, MockGroupStatusSource>;

/// Observed member on the default port
pub fn observed(host: &str, health: HealthState, role: RoleHint) -> ObservedMember {
    ObservedMember::new(member_id(host), health, role)
}

/// Online observed member on the default port
pub fn online(host: &str, role: RoleHint) -> ObservedMember {
    observed(host, HealthState::Online, role)
}

/// Cluster with the given configured members and no group views yet
pub fn configured_cluster(identity: &str, members: &[(&str, RoleHint)]) -> MockCluster {
    let members = members
        .iter()
        .map(|(host, role)| ConfiguredMember::new(member_id(host), *role))
        .collect::<Vec<_>>();

    MockCluster::new(ClusterMetadata {
        metadata_servers: members.iter().map(|member| member.id.clone()).collect(),
        members,
        single_primary_mode: true,
        cluster_identity: identity.to_string(),
    })
}

/// Scheduler seeded with the first configured member as metadata server
pub fn scheduler(cluster: &MockCluster, config: RefreshSchedulerConfig) -> TestScheduler {
    let seed = cluster
        .configured_members()
        .first()
        .map(|member| vec![member.id.clone()])
        .unwrap_or_default();

    RefreshScheduler::new(
        cluster.refresher(),
        Arc::new(SnapshotStore::new(seed)),
        Arc::new(EmergencyState::new()),
        config,
    )
}

/// Scheduler whose loop only refreshes when asked or in emergency mode
pub fn quiet_scheduler(cluster: &MockCluster, tick_interval: Duration) -> TestScheduler {
    scheduler(
        cluster,
        RefreshSchedulerConfig {
            ttl: Duration::from_secs(3600),
            tick_interval,
        },
    )
}

/// Poll `condition` until it holds, panicking after `timeout`
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
