//! Caller roles and the capabilities they carry

use serde::{Deserialize, Serialize};

/// The closed set of roles a caller may assert.
///
/// Roles travel on the wire (and in stored records) as the short tokens
/// `A1`, `D1`, `D2` and `R1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "A1")]
    Admin,
    #[serde(rename = "D1")]
    DoerA,
    #[serde(rename = "D2")]
    DoerB,
    #[serde(rename = "R1")]
    Reader,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::DoerA, Role::DoerB, Role::Reader];

    /// Wire token for this role
    pub fn token(&self) -> &'static str {
        match self {
            Role::Admin => "A1",
            Role::DoerA => "D1",
            Role::DoerB => "D2",
            Role::Reader => "R1",
        }
    }

    /// Upload, bulk upload and delete documents
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_read(&self) -> bool {
        true
    }

    pub fn can_annotate(&self) -> bool {
        matches!(self, Role::Admin | Role::DoerA | Role::DoerB)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "A1" => return Ok(Role::Admin),
            "D1" => return Ok(Role::DoerA),
            "D2" => return Ok(Role::DoerB),
            "R1" => return Ok(Role::Reader),
            _ => {}
        }
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doer-a" => Ok(Role::DoerA),
            "doer-b" => Ok(Role::DoerB),
            "reader" => Ok(Role::Reader),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}
