use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::security::login_failure_message;
use crate::api::{ApiError, SecurityClient};
use crate::error::AppError;
use crate::handlers::AppState;
use crate::permissions::{Action, ModuleId, Permissions};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Rejected(String),

    #[error("The security service is unavailable")]
    Unavailable,

    #[error("Failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::Rejected(_) => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Unavailable => AppError::Upstream(err.to_string()),
            AuthError::Signing(e) => AppError::Internal(e.into()),
        }
    }
}

/// Authenticated user, decoded from the session token on every request and
/// stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub username: String,
    pub user_id: Option<i64>,
    pub module: String,
    pub permissions: Permissions,
}

impl AuthContext {
    pub fn allows(&self, module: ModuleId, action: Action) -> bool {
        self.permissions.allows(module, action)
    }

    /// Fails with `403` unless the user may perform `action` on `module`.
    pub fn require(&self, module: ModuleId, action: Action) -> Result<(), AppError> {
        if self.allows(module, action) {
            Ok(())
        } else {
            warn!("User {} denied {} on {:?}", self.username, action, module);
            Err(AppError::Forbidden(format!(
                "You do not have permission to {} {}",
                action,
                module.label()
            )))
        }
    }
}

/// Claims of the session JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the username
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub user_id: Option<i64>,
    pub module: String,
    pub permissions: Permissions,
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, context: &AuthContext) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: context.username.clone(),
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
            user_id: context.user_id,
            module: context.module.clone(),
            permissions: context.permissions.clone(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| AuthError::InvalidToken)?
            .claims;
        Ok(AuthContext {
            username: claims.sub,
            user_id: claims.user_id,
            module: claims.module,
            permissions: claims.permissions,
        })
    }
}

/// Verifies credentials against the security service.
///
/// # Errors
///
/// `Rejected` with the service's message when the credentials are refused,
/// `Unavailable` when the service cannot be reached or answers garbage.
pub async fn authenticate(
    security: &SecurityClient,
    module_id: &str,
    usuario: &str,
    contrasena: &str,
) -> Result<AuthContext, AuthError> {
    match security.login(usuario, contrasena, module_id).await {
        Ok(response) => {
            let permissions = Permissions::from_grants(&response.permisos);
            info!("User {} logged in to module {}", usuario, module_id);
            Ok(AuthContext {
                username: usuario.to_string(),
                user_id: response.id_usuario,
                module: module_id.to_string(),
                permissions,
            })
        }
        Err(ApiError::Status { status, body, .. }) if status < 500 => {
            warn!("Login rejected for {}", usuario);
            Err(AuthError::Rejected(login_failure_message(&body)))
        }
        Err(e) => {
            warn!("Login for {} failed: {}", usuario, e);
            Err(AuthError::Unavailable)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the decoded [`AuthContext`] is attached to the request; on
/// failure a `401` is returned.
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let context = state.sessions.verify(token)?;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::fixtures::full_access;

    fn context() -> AuthContext {
        AuthContext {
            username: "maria".to_string(),
            user_id: Some(4),
            module: "FAC".to_string(),
            permissions: full_access(),
        }
    }

    #[test]
    fn test_token_roundtrip_keeps_permissions() {
        let keys = SessionKeys::new("secret", 30);
        let token = keys.issue(&context()).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), context());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = SessionKeys::new("one", 30).issue(&context()).unwrap();
        assert!(matches!(
            SessionKeys::new("two", 30).verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = SessionKeys::new("secret", -10);
        let token = keys.issue(&context()).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_require_reports_forbidden() {
        let ctx = AuthContext {
            permissions: Permissions::default(),
            ..context()
        };
        assert!(ctx.require(ModuleId::Dashboard, Action::Read).is_ok());
        assert!(matches!(
            ctx.require(ModuleId::Invoices, Action::Create),
            Err(AppError::Forbidden(_))
        ));
    }
}
