//! JWT claims and request authentication context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::models::UserRole;
use crate::models::User;

/// JWT claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Token id, unique per issued token
    pub jti: String,
}

impl Claims {
    pub fn new(user: &User, issuer: &str, audience: &str, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        let exp = now + chrono::Duration::hours(expires_in_hours);

        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::ReviewTransactions => self.role.can_review_transactions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Permission {
    /// Change a transaction's status through the review endpoint
    ReviewTransactions,
}

#[derive(Debug)]
pub enum TokenValidation {
    Valid(Claims),
    Expired,
    Invalid(String),
    Revoked,
}

/// Inserted into request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn new(claims: Claims, token: String) -> Self {
        Self {
            claims,
            token,
            authenticated_at: Utc::now(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.claims.has_permission(permission)
    }

    pub fn user_id(&self) -> &str {
        self.claims.user_id()
    }
}
