use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, ServiceClient};
use crate::permissions::PermissionGrant;

const DEFAULT_LOGIN_ERROR: &str = "Invalid credentials";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    usuario: &'a str,
    contrasena: &'a str,
    id_modulo: &'a str,
}

/// Successful login answer of the security service.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub id_usuario: Option<i64>,
    #[serde(default)]
    pub permisos: Vec<PermissionGrant>,
}

/// Client for the security service, which verifies credentials and returns
/// the user's permission grants for a module.
#[derive(Debug, Clone)]
pub struct SecurityClient {
    inner: ServiceClient,
}

impl SecurityClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: ServiceClient::new(http, base_url),
        }
    }

    pub async fn login(&self, usuario: &str, contrasena: &str, module_id: &str) -> Result<LoginResponse, ApiError> {
        let request = LoginRequest {
            usuario,
            contrasena,
            id_modulo: module_id,
        };
        self.inner.post("/usuarios/login", &request).await
    }
}

/// Message to show for a rejected login: the JSON `message` field if there is
/// one, else the raw body, else a generic text.
pub fn login_failure_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        DEFAULT_LOGIN_ERROR.to_string()
    } else {
        body.to_string()
    }
}
