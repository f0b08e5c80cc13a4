use std::sync::Arc;
use std::time::Duration;

use proven_cluster_routing::{
    EmergencyState, HealthState, ObservedMember, RefreshScheduler, RefreshSchedulerConfig,
    RoleHint, SnapshotStore,
};
use proven_cluster_routing_mock::{MockCluster, member_id};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Create a healthy three-member cluster
    let cluster = MockCluster::healthy("demo-cluster", &["db1", "db2", "db3"]);

    let store = Arc::new(SnapshotStore::new(vec![member_id("db1")]));
    let emergency = Arc::new(EmergencyState::new());
    let scheduler = RefreshScheduler::new(
        cluster.refresher(),
        Arc::clone(&store),
        emergency,
        RefreshSchedulerConfig {
            ttl: Duration::from_secs(2),
            tick_interval: Duration::from_millis(200),
        },
    );

    let mut changes = store.subscribe();
    scheduler.start().await;

    changes.changed().await?;
    print_routing(&store);

    // Fail over: db1 drops out and db2 takes over as primary
    cluster.set_view_everywhere(vec![
        ObservedMember::new(member_id("db1"), HealthState::Unreachable, RoleHint::Unknown),
        ObservedMember::new(member_id("db2"), HealthState::Online, RoleHint::Primary),
        ObservedMember::new(member_id("db3"), HealthState::Online, RoleHint::Secondary),
    ]);
    scheduler.report_unreachable();

    changes.changed().await?;
    print_routing(&store);
    println!("Emergency mode active: {}", scheduler.is_emergency_active());

    scheduler.stop().await;
    println!("\nRefresh stats: {:?}", scheduler.stats());

    Ok(())
}

fn print_routing(store: &SnapshotStore) {
    let snapshot = store.current();
    println!("\nCluster {}:", snapshot.availability());
    for member in &snapshot.topology.members {
        println!("  - {} {:?}", member.id, member.mode);
    }
}
