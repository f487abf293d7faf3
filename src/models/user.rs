use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account roles. Reviewers (admins and analysts) may move transactions
/// between statuses; customers only submit and confirm their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Analyst,
    Customer,
}

impl UserRole {
    pub fn can_review_transactions(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Analyst)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_digest: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// User record as returned over the API, without the password digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}
