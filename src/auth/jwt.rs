//! JWT token management

use crate::auth::claims::{Claims, TokenValidation};
use crate::config::AuthSettings;
use crate::error::AppError;
use crate::models::{User, UserInfo};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: JwtConfig,
    /// Revoked token -> its `exp`. Entries are pruned once the token would
    /// fail validation on expiry anyway.
    revoked_tokens: Arc<RwLock<HashMap<String, i64>>>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub expires_in_hours: i64,
    pub issuer: String,
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        JwtConfig::from(&AuthSettings::default())
    }
}

impl From<&AuthSettings> for JwtConfig {
    fn from(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            algorithm: Algorithm::HS256,
            expires_in_hours: settings.token_ttl_hours,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        }
    }
}

/// Body returned by login and register
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub expires_at: i64,
    pub user: UserInfo,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            config,
            revoked_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Issue a signed token for `user`, returning it with its claims.
    pub async fn generate_token(&self, user: &User) -> Result<(String, Claims), AppError> {
        let claims = Claims::new(
            user,
            &self.config.issuer,
            &self.config.audience,
            self.config.expires_in_hours,
        );

        let header = Header::new(self.config.algorithm);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to generate token: {}", e)))?;
        Ok((token, claims))
    }

    pub async fn validate_token(&self, token: &str) -> Result<TokenValidation, AppError> {
        let revoked_tokens = self.revoked_tokens.read().await;
        if revoked_tokens.contains_key(token) {
            return Ok(TokenValidation::Revoked);
        }
        drop(revoked_tokens);

        let mut validation = Validation::new(self.config.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                let claims = token_data.claims;
                if claims.is_expired() {
                    Ok(TokenValidation::Expired)
                } else {
                    Ok(TokenValidation::Valid(claims))
                }
            }
            Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) => {
                Ok(TokenValidation::Expired)
            }
            Err(e) => Ok(TokenValidation::Invalid(e.to_string())),
        }
    }

    pub async fn revoke_token(&self, token: &str, expires_at: i64) -> Result<(), AppError> {
        let mut revoked_tokens = self.revoked_tokens.write().await;
        revoked_tokens.insert(token.to_string(), expires_at);
        Ok(())
    }

    /// Forget revocations for tokens whose `exp` is at or before `now`.
    pub async fn prune_revoked_at(&self, now: DateTime<Utc>) -> usize {
        let now = now.timestamp();
        let mut revoked_tokens = self.revoked_tokens.write().await;
        let before = revoked_tokens.len();
        revoked_tokens.retain(|_, exp| *exp > now);
        let removed = before - revoked_tokens.len();
        if removed > 0 {
            debug!("Pruned {} expired token revocations", removed);
        }
        removed
    }

    pub async fn revoked_count(&self) -> usize {
        self.revoked_tokens.read().await.len()
    }

    /// Periodically prune expired revocations in the background.
    pub fn start_prune_task(&self, every: std::time::Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                service.prune_revoked_at(Utc::now()).await;
            }
        })
    }

    pub fn session_response(&self, message: &str, token: String, claims: &Claims, user: &User) -> SessionResponse {
        SessionResponse {
            success: true,
            message: message.to_string(),
            token,
            expires_at: claims.exp,
            user: UserInfo::from(user),
        }
    }

    pub fn extract_token_from_header(auth_header: &str) -> Option<&str> {
        auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_header() {
        let header = "Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        assert_eq!(
            JwtService::extract_token_from_header(header),
            Some("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9")
        );
        assert_eq!(JwtService::extract_token_from_header("InvalidHeader"), None);
        assert_eq!(JwtService::extract_token_from_header("Bearer "), None);
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = AuthSettings::default();
        settings.token_ttl_hours = 2;
        let config = JwtConfig::from(&settings);
        assert_eq!(config.expires_in_hours, 2);
        assert_eq!(config.algorithm, Algorithm::HS256);
        assert_eq!(config.issuer, "fraudguard");
    }
}
