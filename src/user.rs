//! Users are managed by the external account service; the workflow only reads them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// Job title printed under the signature
    pub position: Option<String>,
    /// Staff registration number (NIP)
    pub employee_number: Option<String>,
    /// URL or data URI of the scanned signature
    pub signature_image: Option<String>,
}

impl UserProfile {
    pub fn new(id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            position: None,
            employee_number: None,
            signature_image: None,
        }
    }
}
