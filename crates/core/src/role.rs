use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::laporan::Laporan;

/// The closed set of approving/actor roles.
///
/// The role-to-approval-flag mapping is a fixed table, not configuration:
/// each variant marks exactly one flag on the record, and parsing an
/// unrecognized role string is an error rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApproverRole {
    Em,
    User,
    Vendor,
}

impl ApproverRole {
    /// Every role that can approve, in a fixed order.
    pub const ALL: [Self; 3] = [Self::Em, Self::User, Self::Vendor];

    /// Canonical uppercase name as carried by the identity provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Em => "EM",
            Self::User => "USER",
            Self::Vendor => "VENDOR",
        }
    }

    /// Set this role's approval flag on the record.
    pub fn mark_approved(self, laporan: &mut Laporan) {
        match self {
            Self::Em => laporan.em_approved = true,
            Self::User => laporan.user_approved = true,
            Self::Vendor => laporan.vendor_approved = true,
        }
    }

    /// Whether this role has already approved the record.
    pub fn has_approved(self, laporan: &Laporan) -> bool {
        match self {
            Self::Em => laporan.em_approved,
            Self::User => laporan.user_approved,
            Self::Vendor => laporan.vendor_approved,
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a role string outside the closed list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown approver role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for ApproverRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EM" => Ok(Self::Em),
            "USER" => Ok(Self::User),
            "VENDOR" => Ok(Self::Vendor),
            other => Err(ParseRoleError(other.to_owned())),
        }
    }
}
