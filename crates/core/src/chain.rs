//! The fixed approval chain a trip or expense claim walks through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRole {
    Supervisor,
    StaffGa,
    SpvGa,
    HrManager,
    Bod,
    StaffFa,
}

/// Roles in execution order. Position in this list is the only source of
/// "next" and "previous".
pub const APPROVAL_CHAIN: [ApprovalRole; 6] = [
    ApprovalRole::Supervisor,
    ApprovalRole::StaffGa,
    ApprovalRole::SpvGa,
    ApprovalRole::HrManager,
    ApprovalRole::Bod,
    ApprovalRole::StaffFa,
];

impl ApprovalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::StaffGa => "staff_ga",
            Self::SpvGa => "spv_ga",
            Self::HrManager => "hr_manager",
            Self::Bod => "bod",
            Self::StaffFa => "staff_fa",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supervisor" => Some(Self::Supervisor),
            "staff_ga" => Some(Self::StaffGa),
            "spv_ga" => Some(Self::SpvGa),
            "hr_manager" => Some(Self::HrManager),
            "bod" => Some(Self::Bod),
            "staff_fa" => Some(Self::StaffFa),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Supervisor => "Supervisor",
            Self::StaffGa => "Staff GA",
            Self::SpvGa => "SPV GA",
            Self::HrManager => "HR Manager",
            Self::Bod => "BOD",
            Self::StaffFa => "Staff FA",
        }
    }

    /// Supervisors are resolved from the employee graph, every other role from
    /// the organizational unit's assignment table.
    pub fn is_per_employee(&self) -> bool {
        matches!(self, Self::Supervisor)
    }

    fn position(&self) -> usize {
        match self {
            Self::Supervisor => 0,
            Self::StaffGa => 1,
            Self::SpvGa => 2,
            Self::HrManager => 3,
            Self::Bod => 4,
            Self::StaffFa => 5,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown approval role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for ApprovalRole {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| UnknownRole(value.to_string()))
    }
}

impl fmt::Display for ApprovalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn roles() -> &'static [ApprovalRole] {
    &APPROVAL_CHAIN
}

pub fn first() -> ApprovalRole {
    APPROVAL_CHAIN[0]
}

pub fn last() -> ApprovalRole {
    APPROVAL_CHAIN[APPROVAL_CHAIN.len() - 1]
}

/// Clamped: the last role's next is itself.
pub fn next(role: ApprovalRole) -> ApprovalRole {
    let position = (role.position() + 1).min(APPROVAL_CHAIN.len() - 1);
    APPROVAL_CHAIN[position]
}

/// Clamped: the first role's previous is itself.
pub fn previous(role: ApprovalRole) -> ApprovalRole {
    APPROVAL_CHAIN[role.position().saturating_sub(1)]
}

pub fn is_last(role: ApprovalRole) -> bool {
    role == last()
}

/// Roles that come after `role`, in chain order.
pub fn after(role: ApprovalRole) -> &'static [ApprovalRole] {
    &APPROVAL_CHAIN[role.position() + 1..]
}
