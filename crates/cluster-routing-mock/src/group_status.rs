//! Mock group status source.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use proven_cluster_routing::{GroupStatus, GroupStatusSource, MemberId};

use crate::error::StatusError;

#[derive(Debug, Default)]
struct State {
    views: HashMap<MemberId, Result<GroupStatus, StatusError>>,
    queried: Vec<MemberId>,
}

/// Group status source answering with a per-member view.
///
/// Members without a view refuse the connection.
#[derive(Clone, Debug, Default)]
pub struct MockGroupStatusSource {
    state: Arc<RwLock<State>>,
}

impl MockGroupStatusSource {
    /// Create a new mock with no views.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group view `member` reports.
    pub fn set_view(&self, member: MemberId, status: GroupStatus) {
        self.state.write().views.insert(member, Ok(status));
    }

    /// Make `member` answer with `error`.
    pub fn fail(&self, member: MemberId, error: StatusError) {
        self.state.write().views.insert(member, Err(error));
    }

    /// Make `member` refuse connections.
    pub fn disconnect(&self, member: &MemberId) {
        let error = StatusError::Connect(member.clone());
        self.state.write().views.insert(member.clone(), Err(error));
    }

    /// Members queried so far, in query order.
    #[must_use]
    pub fn queried(&self) -> Vec<MemberId> {
        self.state.read().queried.clone()
    }

    /// Forget the query log.
    pub fn clear_queried(&self) {
        self.state.write().queried.clear();
    }
}

#[async_trait]
impl GroupStatusSource for MockGroupStatusSource {
    type Error = StatusError;

    async fn fetch(&self, member: &MemberId) -> Result<GroupStatus, Self::Error> {
        let mut state = self.state.write();
        state.queried.push(member.clone());

        state
            .views
            .get(member)
            .cloned()
            .unwrap_or_else(|| Err(StatusError::Connect(member.clone())))
    }
}
