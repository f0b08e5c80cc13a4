//! Member identity and per-member state types

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseMemberIdError;

/// Stable identity of a cluster node within one refresh pass.
///
/// Metadata servers are addressed with the same type since they are members
/// of the cluster they describe.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MemberId {
    host: String,
    port: u16,
}

impl MemberId {
    /// Create a new member id
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the host of this member
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port of this member
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for MemberId {
    type Err = ParseMemberIdError;

    /// Parses `host:port` or `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseMemberIdError::MissingPort(s.to_string()))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(ParseMemberIdError::MissingHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| ParseMemberIdError::InvalidPort(s.to_string()))?;

        Ok(Self::new(host, port))
    }
}

/// Health of a member as reported by the consensus group
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// Serving and in sync with the group
    Online,

    /// Catching up with the group
    Recovering,

    /// Not participating in the group
    Offline,

    /// Left the group because of an error
    Error,

    /// Suspected to be unreachable by the reporting node
    Unreachable,
}

impl HealthState {
    /// Whether a member in this state counts toward quorum
    pub const fn counts_toward_quorum(self) -> bool {
        matches!(self, Self::Online | Self::Recovering)
    }
}

/// Role a member claims or is declared to have
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RoleHint {
    /// Accepts writes
    Primary,

    /// Read-only replica
    Secondary,

    /// No role information
    #[default]
    Unknown,
}

/// Final routing mode of a member
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MemberMode {
    /// Route reads and writes
    ReadWrite,

    /// Route reads only
    ReadOnly,

    /// Do not route
    Unavailable,
}

/// A member as declared by the metadata
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredMember {
    /// Identity of the member
    pub id: MemberId,

    /// Role declared by the metadata
    pub role: RoleHint,

    /// Alternate protocol port, if the metadata declares one
    pub alternate_port: Option<u16>,
}

impl ConfiguredMember {
    /// Create a configured member without an alternate port
    pub const fn new(id: MemberId, role: RoleHint) -> Self {
        Self {
            id,
            role,
            alternate_port: None,
        }
    }

    /// Set the alternate protocol port
    #[must_use]
    pub const fn with_alternate_port(mut self, port: u16) -> Self {
        self.alternate_port = Some(port);
        self
    }
}

/// A member as seen by one node of the consensus group
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ObservedMember {
    /// Identity of the member
    pub id: MemberId,

    /// Reported health
    pub health: HealthState,

    /// Reported role
    pub role: RoleHint,
}

impl ObservedMember {
    /// Create a new observed member
    pub const fn new(id: MemberId, health: HealthState, role: RoleHint) -> Self {
        Self { id, health, role }
    }
}

/// A member with its final routing mode
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResolvedMember {
    /// Identity of the member
    pub id: MemberId,

    /// Routing mode
    pub mode: MemberMode,

    /// Alternate protocol port
    pub alternate_port: Option<u16>,
}

impl ResolvedMember {
    /// Resolve a configured member to the given mode
    pub fn from_configured(member: &ConfiguredMember, mode: MemberMode) -> Self {
        Self {
            id: member.id.clone(),
            mode,
            alternate_port: member.alternate_port,
        }
    }

    /// Host of this member
    pub fn host(&self) -> &str {
        self.id.host()
    }

    /// Port of this member
    pub const fn port(&self) -> u16 {
        self.id.port()
    }

    /// Whether the data plane may route writes here
    pub fn is_writable(&self) -> bool {
        self.mode == MemberMode::ReadWrite
    }
}
