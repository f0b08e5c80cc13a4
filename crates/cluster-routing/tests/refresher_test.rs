//! End-to-end refresh passes against the mock metadata and group status sources

mod common;

use common::{configured_cluster, observed, online};
use proven_cluster_routing::{
    AvailabilityState, GroupStatus, HealthState, MemberMode, RefreshError, RoleHint,
    RoutingSnapshot,
};
use proven_cluster_routing_mock::{MetadataError, MockCluster, StatusError, member_id};
use tracing_test::traced_test;

fn modes(snapshot: &RoutingSnapshot) -> Vec<(String, MemberMode)> {
    snapshot
        .topology
        .members
        .iter()
        .map(|member| (member.host().to_string(), member.mode))
        .collect()
}

#[tokio::test]
#[traced_test]
async fn test_writable_cluster_with_offline_member() {
    let cluster = configured_cluster(
        "cluster-a",
        &[
            ("a", RoleHint::Primary),
            ("b", RoleHint::Secondary),
            ("c", RoleHint::Secondary),
        ],
    );
    cluster.set_view_everywhere(vec![
        online("a", RoleHint::Primary),
        online("b", RoleHint::Secondary),
        observed("c", HealthState::Offline, RoleHint::Secondary),
    ]);

    let snapshot = cluster.refresher().refresh(&[member_id("a")]).await.unwrap();

    assert_eq!(snapshot.availability(), AvailabilityState::AvailableWritable);
    assert_eq!(snapshot.quorum_source, Some(member_id("a")));
    assert_eq!(
        modes(&snapshot),
        vec![
            ("a".to_string(), MemberMode::ReadWrite),
            ("b".to_string(), MemberMode::ReadOnly),
            ("c".to_string(), MemberMode::Unavailable),
        ]
    );
}

#[tokio::test]
#[traced_test]
async fn test_unconfigured_members_do_not_form_quorum() {
    let cluster = configured_cluster(
        "cluster-b",
        &[
            ("a", RoleHint::Primary),
            ("b", RoleHint::Secondary),
            ("c", RoleHint::Secondary),
        ],
    );
    cluster.set_view_everywhere(vec![
        online("a", RoleHint::Primary),
        online("b", RoleHint::Secondary),
        observed("c", HealthState::Unreachable, RoleHint::Secondary),
        online("d", RoleHint::Secondary),
        online("e", RoleHint::Secondary),
    ]);

    let snapshot = cluster.refresher().refresh(&[member_id("a")]).await.unwrap();

    assert_eq!(snapshot.availability(), AvailabilityState::Unavailable);
    assert_eq!(snapshot.quorum_source, None);
    assert_eq!(snapshot.topology.members.len(), 3);
    assert!(
        snapshot
            .topology
            .members
            .iter()
            .all(|member| member.mode == MemberMode::Unavailable)
    );

    // Every configured member was asked before giving up
    assert_eq!(
        cluster.group_status_source().queried(),
        vec![member_id("a"), member_id("b"), member_id("c")]
    );
}

#[tokio::test]
#[traced_test]
async fn test_recovering_quorum_is_authoritative() {
    let cluster = configured_cluster(
        "cluster-c",
        &[
            ("a", RoleHint::Primary),
            ("b", RoleHint::Secondary),
            ("c", RoleHint::Secondary),
        ],
    );
    cluster.set_view_everywhere(vec![
        observed("a", HealthState::Recovering, RoleHint::Primary),
        observed("b", HealthState::Recovering, RoleHint::Secondary),
        observed("c", HealthState::Recovering, RoleHint::Secondary),
    ]);

    let snapshot = cluster.refresher().refresh(&[member_id("a")]).await.unwrap();

    assert_eq!(
        snapshot.availability(),
        AvailabilityState::UnavailableRecovering
    );
    assert_eq!(snapshot.quorum_source, Some(member_id("a")));
    assert_eq!(cluster.group_status_source().queried(), vec![member_id("a")]);
}

#[tokio::test]
#[traced_test]
async fn test_stops_at_first_quorum_in_configuration_order() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db3")])
        .await
        .unwrap();

    assert_eq!(snapshot.quorum_source, Some(member_id("db1")));
    assert_eq!(cluster.group_status_source().queried(), vec![member_id("db1")]);
    assert_eq!(
        cluster.metadata_source().requests(),
        vec![vec![member_id("db3")]]
    );
}

#[tokio::test]
#[traced_test]
async fn test_skips_unreachable_candidates() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    cluster
        .group_status_source()
        .disconnect(&member_id("db1"));
    cluster.group_status_source().fail(
        member_id("db2"),
        StatusError::Query(member_id("db2"), "permission denied".to_string()),
    );

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db1")])
        .await
        .unwrap();

    assert_eq!(snapshot.availability(), AvailabilityState::AvailableWritable);
    assert_eq!(snapshot.quorum_source, Some(member_id("db3")));
    assert_eq!(
        cluster.group_status_source().queried(),
        vec![member_id("db1"), member_id("db2"), member_id("db3")]
    );
}

#[tokio::test]
#[traced_test]
async fn test_no_reachable_member_clears_routing() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    for host in ["db1", "db2", "db3"] {
        cluster.group_status_source().disconnect(&member_id(host));
    }

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db1")])
        .await
        .unwrap();

    assert_eq!(snapshot.availability(), AvailabilityState::Unavailable);
    assert!(!snapshot.topology.has_writable_member());
    assert_eq!(snapshot.topology.members.len(), 3);
    assert_eq!(snapshot.topology.cluster_identity, "cluster");
}

#[tokio::test]
#[traced_test]
async fn test_split_brain_adopts_single_side() {
    let cluster = configured_cluster(
        "cluster",
        &[
            ("a", RoleHint::Primary),
            ("b", RoleHint::Secondary),
            ("c", RoleHint::Secondary),
            ("d", RoleHint::Secondary),
            ("e", RoleHint::Secondary),
        ],
    );

    // Two partitions each claiming a majority of what they see
    let left = vec![
        online("a", RoleHint::Primary),
        online("b", RoleHint::Secondary),
        online("c", RoleHint::Secondary),
    ];
    let right = vec![
        online("c", RoleHint::Secondary),
        online("d", RoleHint::Primary),
        online("e", RoleHint::Secondary),
    ];
    let status = cluster.group_status_source();
    for host in ["a", "b", "c"] {
        let role = if host == "a" {
            RoleHint::Primary
        } else {
            RoleHint::Secondary
        };
        status.set_view(member_id(host), GroupStatus::new(left.clone(), role));
    }
    status.set_view(member_id("d"), GroupStatus::new(right.clone(), RoleHint::Primary));
    status.set_view(member_id("e"), GroupStatus::new(right, RoleHint::Secondary));

    let refresher = cluster.refresher();
    let snapshot = refresher.refresh(&[member_id("a")]).await.unwrap();

    assert_eq!(snapshot.quorum_source, Some(member_id("a")));
    assert_eq!(status.queried(), vec![member_id("a")]);
    let writable = snapshot
        .topology
        .writable_members()
        .map(|member| member.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(writable, vec![member_id("a")]);

    // Once the left side stops answering the right side is adopted instead
    for host in ["a", "b", "c"] {
        status.disconnect(&member_id(host));
    }
    status.clear_queried();

    let snapshot = refresher.refresh(&[member_id("a")]).await.unwrap();

    assert_eq!(snapshot.quorum_source, Some(member_id("d")));
    let writable = snapshot
        .topology
        .writable_members()
        .map(|member| member.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(writable, vec![member_id("d")]);
}

#[tokio::test]
#[traced_test]
async fn test_ignores_view_from_foreign_group() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    let observed = vec![
        online("db1", RoleHint::Primary),
        online("db2", RoleHint::Secondary),
        online("db3", RoleHint::Secondary),
    ];
    cluster.group_status_source().set_view(
        member_id("db1"),
        GroupStatus::new(observed.clone(), RoleHint::Primary).with_group_identity("other"),
    );
    cluster.group_status_source().set_view(
        member_id("db2"),
        GroupStatus::new(observed, RoleHint::Secondary).with_group_identity("cluster"),
    );

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db1")])
        .await
        .unwrap();

    assert_eq!(snapshot.quorum_source, Some(member_id("db2")));
    assert_eq!(snapshot.availability(), AvailabilityState::AvailableWritable);
}

#[tokio::test]
#[traced_test]
async fn test_reporter_role_fills_unknown_role() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    let observed = vec![
        online("db1", RoleHint::Unknown),
        online("db2", RoleHint::Unknown),
        online("db3", RoleHint::Unknown),
    ];
    cluster
        .group_status_source()
        .set_view(member_id("db1"), GroupStatus::new(observed, RoleHint::Primary));

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db1")])
        .await
        .unwrap();

    assert_eq!(snapshot.availability(), AvailabilityState::AvailableWritable);
    assert_eq!(
        snapshot.topology.member(&member_id("db1")).map(|m| m.mode),
        Some(MemberMode::ReadWrite)
    );
    assert_eq!(
        snapshot.topology.member(&member_id("db2")).map(|m| m.mode),
        Some(MemberMode::ReadOnly)
    );
}

#[tokio::test]
#[traced_test]
async fn test_multi_primary_marks_all_online_writable() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    cluster
        .metadata_source()
        .update_metadata(|metadata| metadata.single_primary_mode = false);
    cluster.set_view_everywhere(vec![
        online("db1", RoleHint::Primary),
        online("db2", RoleHint::Primary),
        observed("db3", HealthState::Recovering, RoleHint::Secondary),
    ]);

    let snapshot = cluster
        .refresher()
        .refresh(&[member_id("db1")])
        .await
        .unwrap();

    assert!(!snapshot.topology.single_primary_mode);
    assert_eq!(snapshot.topology.writable_members().count(), 2);
    assert_eq!(
        snapshot.topology.member(&member_id("db3")).map(|m| m.mode),
        Some(MemberMode::Unavailable)
    );
}

#[tokio::test]
#[traced_test]
async fn test_metadata_errors_map_to_refresh_errors() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    let refresher = cluster.refresher();

    cluster
        .metadata_source()
        .fail_with(MetadataError::NoServerReachable(1));
    assert!(matches!(
        refresher.refresh(&[member_id("db1")]).await,
        Err(RefreshError::NoMetadataServerReachable(_))
    ));

    cluster
        .metadata_source()
        .fail_with(MetadataError::Read("schema version mismatch".to_string()));
    assert!(matches!(
        refresher.refresh(&[member_id("db1")]).await,
        Err(RefreshError::NoMetadataReadSuccessful(_))
    ));

    // No member is asked for its view when the metadata is unavailable
    assert!(cluster.group_status_source().queried().is_empty());

    cluster.metadata_source().recover();
    assert!(refresher.refresh(&[member_id("db1")]).await.is_ok());
}

#[tokio::test]
#[traced_test]
async fn test_empty_candidate_list_is_unreachable() {
    let cluster = MockCluster::healthy("cluster", &["db1"]);

    assert!(matches!(
        cluster.refresher().refresh(&[]).await,
        Err(RefreshError::NoMetadataServerReachable(_))
    ));
}

#[tokio::test]
#[traced_test]
async fn test_metadata_server_list_updates() {
    let cluster = MockCluster::healthy("cluster", &["db1", "db2", "db3"]);
    let refresher = cluster.refresher();

    let snapshot = refresher.refresh(&[member_id("seed")]).await.unwrap();
    assert_eq!(
        snapshot.metadata_servers,
        vec![member_id("db1"), member_id("db2"), member_id("db3")]
    );

    // An empty list from the metadata keeps the one we already had
    cluster
        .metadata_source()
        .update_metadata(|metadata| metadata.metadata_servers.clear());

    let snapshot = refresher.refresh(&[member_id("seed")]).await.unwrap();
    assert_eq!(snapshot.metadata_servers, vec![member_id("seed")]);
}
