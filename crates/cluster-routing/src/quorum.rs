//! Quorum validation of a group status observation against the metadata
//!
//! The denominator of the majority check is every member the reporting node
//! sees, while the numerator only counts members that are also configured. A
//! group that grew behind the metadata's back therefore makes quorum harder
//! to reach, never easier.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::member::{
    ConfiguredMember, HealthState, MemberId, MemberMode, ObservedMember, ResolvedMember, RoleHint,
};
use crate::source::GroupStatus;
use crate::topology::AvailabilityState;

/// Outcome of validating one node's observation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuorumVerdict {
    /// Availability implied by the observation
    pub availability: AvailabilityState,

    /// Number of observed members
    pub total: usize,

    /// Number of configured, online or recovering members
    pub quorum_count: usize,

    /// Configured members with their resolved modes
    pub members: Vec<ResolvedMember>,
}

/// Turns a configured member set plus one group observation into an availability decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuorumEngine;

impl QuorumEngine {
    /// Validate `status`, as reported by `reporter`, against `configured`.
    pub fn evaluate(
        configured: &[ConfiguredMember],
        status: &GroupStatus,
        reporter: &MemberId,
        single_primary_mode: bool,
    ) -> QuorumVerdict {
        let observed = Self::with_reporter_role(&status.observed, reporter, status.reporting_role);

        let total = observed.len();
        let quorum_count = Self::quorum_count(configured, &observed);
        let availability = Self::availability(configured, &observed, single_primary_mode);

        let members = if availability.is_authoritative() {
            Self::resolve_members(configured, &observed, single_primary_mode)
        } else {
            configured
                .iter()
                .map(|member| ResolvedMember::from_configured(member, MemberMode::Unavailable))
                .collect()
        };

        QuorumVerdict {
            availability,
            total,
            quorum_count,
            members,
        }
    }

    /// Strictly more than half; a tie is not a quorum.
    pub const fn has_quorum(quorum_count: usize, total: usize) -> bool {
        quorum_count * 2 > total
    }

    /// Count observed members that are configured and online or recovering.
    ///
    /// A member reported more than once is judged on its first row and counted
    /// once here, but every time in the total.
    pub fn quorum_count(configured: &[ConfiguredMember], observed: &[ObservedMember]) -> usize {
        Self::counted_members(configured, observed).len()
    }

    /// Decide the availability implied by one observation.
    pub fn availability(
        configured: &[ConfiguredMember],
        observed: &[ObservedMember],
        single_primary_mode: bool,
    ) -> AvailabilityState {
        let total = observed.len();
        if total == 0 || configured.is_empty() {
            return AvailabilityState::Unavailable;
        }

        let counted = Self::counted_members(configured, observed);
        if !Self::has_quorum(counted.len(), total) {
            return AvailabilityState::Unavailable;
        }

        if counted
            .iter()
            .all(|member| member.health == HealthState::Recovering)
        {
            return AvailabilityState::UnavailableRecovering;
        }

        let writable = counted.iter().any(|member| {
            member.health == HealthState::Online
                && (!single_primary_mode || member.role == RoleHint::Primary)
        });

        if writable {
            AvailabilityState::AvailableWritable
        } else {
            AvailabilityState::AvailableReadOnly
        }
    }

    /// Resolve the routing mode of every configured member, in configuration order.
    pub fn resolve_members(
        configured: &[ConfiguredMember],
        observed: &[ObservedMember],
        single_primary_mode: bool,
    ) -> Vec<ResolvedMember> {
        let by_id = Self::first_reports(observed);

        let configured_ids: HashSet<&MemberId> = configured.iter().map(|m| &m.id).collect();
        for member in observed {
            if !configured_ids.contains(&member.id) {
                warn!(
                    "Member {} ({:?}) found in group, yet is not defined in metadata",
                    member.id, member.health
                );
            }
        }

        let mut primary_assigned = false;

        configured
            .iter()
            .map(|member| {
                let mode = match by_id.get(&member.id) {
                    None => {
                        warn!(
                            "Member {} defined in metadata not found in group",
                            member.id
                        );
                        MemberMode::Unavailable
                    }
                    Some(observed) if observed.health != HealthState::Online => {
                        MemberMode::Unavailable
                    }
                    Some(_) if !single_primary_mode => MemberMode::ReadWrite,
                    Some(observed) if observed.role == RoleHint::Primary => {
                        if primary_assigned {
                            warn!(
                                "Member {} also claims to be primary in single-primary mode, routing it read-only",
                                member.id
                            );
                            MemberMode::ReadOnly
                        } else {
                            primary_assigned = true;
                            MemberMode::ReadWrite
                        }
                    }
                    Some(_) => MemberMode::ReadOnly,
                };

                ResolvedMember::from_configured(member, mode)
            })
            .collect()
    }

    fn counted_members<'a>(
        configured: &[ConfiguredMember],
        observed: &'a [ObservedMember],
    ) -> Vec<&'a ObservedMember> {
        let configured_ids: HashSet<&MemberId> = configured.iter().map(|m| &m.id).collect();

        Self::first_reports(observed)
            .into_values()
            .filter(|member| configured_ids.contains(&member.id))
            .filter(|member| member.health.counts_toward_quorum())
            .collect()
    }

    /// The first row reported for each member id.
    ///
    /// Counting and mode resolution both read these rows, so a member reported
    /// twice is judged on the same row by both.
    fn first_reports(observed: &[ObservedMember]) -> HashMap<&MemberId, &ObservedMember> {
        let mut by_id: HashMap<&MemberId, &ObservedMember> = HashMap::new();
        for member in observed {
            by_id.entry(&member.id).or_insert(member);
        }
        by_id
    }

    /// The reporting node knows its own role even when its member row does not say.
    fn with_reporter_role(
        observed: &[ObservedMember],
        reporter: &MemberId,
        reporting_role: RoleHint,
    ) -> Vec<ObservedMember> {
        observed
            .iter()
            .map(|member| {
                if &member.id == reporter && member.role == RoleHint::Unknown {
                    ObservedMember {
                        role: reporting_role,
                        ..member.clone()
                    }
                } else {
                    member.clone()
                }
            })
            .collect()
    }
}
