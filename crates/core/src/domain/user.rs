use serde::{Deserialize, Serialize};

use crate::domain::company::CompanyId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Auth-layer identifier; lookups from check provenance go through this.
    pub uid: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub can_print_checks: bool,
    /// Companies a non-admin is allowed to see. Ignored for admins.
    pub company_ids: Vec<CompanyId>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> String {
        self.username
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|email| !email.trim().is_empty()))
            .unwrap_or("Unknown")
            .to_string()
    }

    pub fn can_see_company(&self, company_id: &CompanyId) -> bool {
        self.is_admin() || self.company_ids.contains(company_id)
    }
}
