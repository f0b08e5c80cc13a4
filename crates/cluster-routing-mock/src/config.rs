use proven_cluster_routing::{HealthState, RoleHint};
use serde::Deserialize;

/// Member definition in the cluster file
#[derive(Debug, Deserialize)]
pub struct ConfigMember {
    pub address: String,
    #[serde(default)]
    pub role: RoleHint,
    #[serde(default)]
    pub alternate_port: Option<u16>,
}

/// Member as seen in a group view
#[derive(Debug, Deserialize)]
pub struct ConfigObservedMember {
    pub address: String,
    pub health: HealthState,
    #[serde(default)]
    pub role: RoleHint,
}

/// Group view reported by one member
#[derive(Debug, Deserialize)]
pub struct ConfigGroupView {
    pub reporter: String,
    #[serde(default)]
    pub reporting_role: RoleHint,
    #[serde(default)]
    pub group_identity: Option<String>,
    pub observed: Vec<ConfigObservedMember>,
}

/// Cluster file
#[derive(Debug, Deserialize)]
pub struct Config {
    pub cluster_identity: String,
    #[serde(default = "default_single_primary_mode")]
    pub single_primary_mode: bool,
    pub metadata_servers: Vec<String>,
    pub members: Vec<ConfigMember>,
    #[serde(default)]
    pub group_views: Vec<ConfigGroupView>,
}

const fn default_single_primary_mode() -> bool {
    true
}
