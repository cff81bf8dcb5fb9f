use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Permission level of a caller. Ordered: `Applicant < Employee < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Role {
    /// Citizen submitting documents (rank 1)
    Applicant,
    /// Staff allowed to verify (rank 2)
    Employee,
    /// Senior staff allowed to sign (rank 3)
    Admin,
}

impl Role {
    pub fn rank(self) -> i16 {
        match self {
            Role::Applicant => 1,
            Role::Employee => 2,
            Role::Admin => 3,
        }
    }

    /// True when this role is at least `required`.
    pub fn at_least(self, required: Role) -> bool {
        self >= required
    }
}

impl TryFrom<i16> for Role {
    type Error = InvalidRole;

    fn try_from(rank: i16) -> Result<Self, Self::Error> {
        match rank {
            1 => Ok(Role::Applicant),
            2 => Ok(Role::Employee),
            3 => Ok(Role::Admin),
            other => Err(InvalidRole(other)),
        }
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Applicant => "applicant",
            Role::Employee => "employee",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role rank {0}")]
pub struct InvalidRole(pub i16);

/// Authenticated identity handed to the workflow core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Applicant-rank callers may only touch their own documents.
    pub fn may_access(&self, applicant_id: Uuid) -> bool {
        self.role != Role::Applicant || self.id == applicant_id
    }
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub name: String,
    pub role: Role,
    pub exp: usize,         // expiration time
    pub iat: usize,         // issued at
    pub token_type: String, // only "access" is accepted
}
