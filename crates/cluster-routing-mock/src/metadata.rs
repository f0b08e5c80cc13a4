//! Mock metadata source.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use proven_cluster_routing::{ClusterMetadata, MemberId, MetadataSource};

use crate::error::MetadataError;

#[derive(Debug)]
struct State {
    metadata: ClusterMetadata,
    failure: Option<MetadataError>,
    requests: Vec<Vec<MemberId>>,
}

/// Metadata source serving a fixed, replaceable cluster definition.
#[derive(Clone, Debug)]
pub struct MockMetadataSource {
    state: Arc<RwLock<State>>,
}

impl MockMetadataSource {
    /// Create a new mock metadata source serving `metadata`.
    #[must_use]
    pub fn new(metadata: ClusterMetadata) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                metadata,
                failure: None,
                requests: Vec::new(),
            })),
        }
    }

    /// The metadata currently served.
    #[must_use]
    pub fn metadata(&self) -> ClusterMetadata {
        self.state.read().metadata.clone()
    }

    /// Replace the served metadata.
    pub fn set_metadata(&self, metadata: ClusterMetadata) {
        self.state.write().metadata = metadata;
    }

    /// Modify the served metadata in place.
    pub fn update_metadata(&self, f: impl FnOnce(&mut ClusterMetadata)) {
        f(&mut self.state.write().metadata);
    }

    /// Fail every fetch with `error` until `recover` is called.
    pub fn fail_with(&self, error: MetadataError) {
        self.state.write().failure = Some(error);
    }

    /// Serve metadata again.
    pub fn recover(&self) {
        self.state.write().failure = None;
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.state.read().requests.len()
    }

    /// Candidate lists passed to each fetch, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<MemberId>> {
        self.state.read().requests.clone()
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    type Error = MetadataError;

    async fn fetch(&self, candidates: &[MemberId]) -> Result<ClusterMetadata, Self::Error> {
        let mut state = self.state.write();
        state.requests.push(candidates.to_vec());

        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        if candidates.is_empty() {
            return Err(MetadataError::NoServerReachable(0));
        }

        Ok(state.metadata.clone())
    }
}
