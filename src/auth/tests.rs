use crate::auth::claims::{Permission, TokenValidation};
use crate::auth::jwt::{JwtConfig, JwtService};
use crate::models::{User, UserRole};
use chrono::Utc;
use jsonwebtoken::Algorithm;

fn setup_jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: "test-secret-key".to_string(),
        algorithm: Algorithm::HS256,
        expires_in_hours: 24,
        issuer: "test".to_string(),
        audience: "test".to_string(),
    })
}

fn user(role: UserRole) -> User {
    User {
        id: "user_42".to_string(),
        name: "Test User".to_string(),
        email: "test@fraudguard.com".to_string(),
        password_digest: String::new(),
        role,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_jwt_token_round_trip() {
    let jwt_service = setup_jwt_service();
    let (token, issued) = jwt_service.generate_token(&user(UserRole::Analyst)).await.unwrap();
    assert!(!token.is_empty());

    match jwt_service.validate_token(&token).await.unwrap() {
        TokenValidation::Valid(claims) => {
            assert_eq!(claims.user_id(), "user_42");
            assert_eq!(claims.role, UserRole::Analyst);
            assert_eq!(claims.jti, issued.jti);
            assert!(claims.has_permission(Permission::ReviewTransactions));
        }
        other => panic!("Expected valid token, got {:?}", other),
    }
}

#[tokio::test]
async fn test_jwt_token_revocation() {
    let jwt_service = setup_jwt_service();
    let (token, claims) = jwt_service.generate_token(&user(UserRole::Customer)).await.unwrap();
    assert!(matches!(
        jwt_service.validate_token(&token).await.unwrap(),
        TokenValidation::Valid(_)
    ));

    jwt_service.revoke_token(&token, claims.exp).await.unwrap();
    assert!(matches!(
        jwt_service.validate_token(&token).await.unwrap(),
        TokenValidation::Revoked
    ));
}

#[tokio::test]
async fn test_revocations_are_pruned_after_expiry() {
    let jwt_service = setup_jwt_service();
    let (token, claims) = jwt_service.generate_token(&user(UserRole::Customer)).await.unwrap();
    let (other, other_claims) = jwt_service.generate_token(&user(UserRole::Analyst)).await.unwrap();
    jwt_service.revoke_token(&token, claims.exp).await.unwrap();
    jwt_service.revoke_token(&other, other_claims.exp + 3600).await.unwrap();
    assert_eq!(jwt_service.revoked_count().await, 2);

    // nothing is pruned while the token could still validate
    assert_eq!(jwt_service.prune_revoked_at(Utc::now()).await, 0);
    assert!(matches!(
        jwt_service.validate_token(&token).await.unwrap(),
        TokenValidation::Revoked
    ));

    assert_eq!(jwt_service.prune_revoked_at(claims.expires_at()).await, 1);
    assert_eq!(jwt_service.revoked_count().await, 1);
    assert!(matches!(
        jwt_service.validate_token(&other).await.unwrap(),
        TokenValidation::Revoked
    ));
}

#[tokio::test]
async fn test_token_from_other_secret_is_invalid() {
    let jwt_service = setup_jwt_service();
    let other = JwtService::new(JwtConfig {
        secret: "another-secret".to_string(),
        ..JwtConfig::default()
    });
    let (token, _) = other.generate_token(&user(UserRole::Admin)).await.unwrap();

    assert!(matches!(
        jwt_service.validate_token(&token).await.unwrap(),
        TokenValidation::Invalid(_)
    ));
}

#[tokio::test]
async fn test_wrong_audience_is_invalid() {
    let jwt_service = setup_jwt_service();
    let other = JwtService::new(JwtConfig {
        secret: "test-secret-key".to_string(),
        audience: "somebody-else".to_string(),
        ..JwtConfig::default()
    });
    let (token, _) = other.generate_token(&user(UserRole::Admin)).await.unwrap();

    assert!(matches!(
        jwt_service.validate_token(&token).await.unwrap(),
        TokenValidation::Invalid(_)
    ));
}

#[tokio::test]
async fn test_garbage_token_is_invalid() {
    let jwt_service = setup_jwt_service();
    assert!(matches!(
        jwt_service.validate_token("not.a.jwt").await.unwrap(),
        TokenValidation::Invalid(_)
    ));
}

#[tokio::test]
async fn test_session_response_hides_digest() {
    let jwt_service = setup_jwt_service();
    let mut account = user(UserRole::Customer);
    account.password_digest = "abcdef".to_string();
    let (token, claims) = jwt_service.generate_token(&account).await.unwrap();

    let response = jwt_service.session_response("Login successful", token, &claims, &account);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["user"]["email"], "test@fraudguard.com");
    assert!(json["user"].get("passwordDigest").is_none());
    assert_eq!(json["expiresAt"], claims.exp);
}
