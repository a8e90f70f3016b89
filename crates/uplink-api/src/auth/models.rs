use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role string carried in the JWT `roles` claim that grants system-admin
/// capability (required for Import sessions and cross-user reads).
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user_id
    pub roles: Vec<String>,
    /// Set only for federated remote-cluster callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

impl Claims {
    pub fn new(user_id: Uuid, roles: Vec<String>, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: user_id,
            roles,
            remote_id: None,
            exp: now + ttl_seconds,
            iat: now,
        }
    }
}

/// Caller identity extracted from the JWT and stored in request extensions
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub is_system_admin: bool,
    /// Set only for federated remote-cluster callers.
    pub remote_id: Option<String>,
}

impl CallerContext {
    pub fn from_claims(claims: &Claims) -> Self {
        CallerContext {
            user_id: claims.sub,
            is_system_admin: claims.roles.iter().any(|r| r == SYSTEM_ADMIN_ROLE),
            remote_id: claims.remote_id.clone(),
        }
    }
}

// Implement FromRequestParts for CallerContext to work with streaming bodies:
// Extension cannot be combined with a body-consuming extractor, so we read
// the context straight out of the request parts.
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        "Missing caller context",
                        "MISSING_CALLER_CONTEXT",
                    )),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_detection_from_roles() {
        let claims = Claims::new(
            Uuid::new_v4(),
            vec!["user".to_string(), "system_admin".to_string()],
            60,
        );
        let ctx = CallerContext::from_claims(&claims);
        assert!(ctx.is_system_admin);

        let claims = Claims::new(Uuid::new_v4(), vec!["user".to_string()], 60);
        assert!(!CallerContext::from_claims(&claims).is_system_admin);
    }
}
