use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;
use validator::Validate;

use super::AppState;
use crate::api::billing::{client_type_delete_error, client_type_write_error};
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::forms::ClientTypeForm;
use crate::models::{Client, ClientType};
use crate::permissions::{Action, ModuleId};

/// Client type row of the listing; a type in use by any client cannot be deleted.
#[derive(Debug, Serialize)]
pub struct ClientTypeRow {
    #[serde(flatten)]
    pub client_type: ClientType,
    pub is_deletable: bool,
}

pub fn client_type_rows(mut types: Vec<ClientType>, clients: &[Client]) -> Vec<ClientTypeRow> {
    let used: HashSet<i64> = clients.iter().map(|c| c.tipo_cliente).filter(|id| *id > 0).collect();
    types.sort_by(|a, b| b.id_tipcli.cmp(&a.id_tipcli));
    types
        .into_iter()
        .map(|t| ClientTypeRow {
            is_deletable: !used.contains(&t.id_tipcli),
            client_type: t,
        })
        .collect()
}

/// `GET /api/client-types`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ClientTypeRow>>, AppError> {
    auth.require(ModuleId::ClientTypes, Action::Read)?;

    let (types, clients) = tokio::join!(state.billing.list_client_types(), state.billing.list_clients());
    Ok(Json(client_type_rows(types?, &clients?)))
}

/// `POST /api/client-types`
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<ClientTypeForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    auth.require(ModuleId::ClientTypes, Action::Create)?;
    form.validate()?;

    let created = state
        .billing
        .create_client_type(&form)
        .await
        .map_err(|e| client_type_write_error(e, "Could not create the client type."))?;

    info!("{} created client type {}", auth.username, form.nombre);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/client-types/:id`
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(form): Json<ClientTypeForm>,
) -> Result<Json<Value>, AppError> {
    auth.require(ModuleId::ClientTypes, Action::Update)?;
    form.validate()?;

    let updated = state
        .billing
        .update_client_type(id, &form)
        .await
        .map_err(|e| client_type_write_error(e, "Could not update the client type."))?;

    info!("{} updated client type {}", auth.username, id);
    Ok(Json(updated))
}

/// `DELETE /api/client-types/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    auth.require(ModuleId::ClientTypes, Action::Delete)?;

    state
        .billing
        .delete_client_type(id)
        .await
        .map_err(client_type_delete_error)?;

    info!("{} deleted client type {}", auth.username, id);
    Ok(StatusCode::NO_CONTENT)
}
