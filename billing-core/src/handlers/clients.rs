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
use crate::api::billing::{client_delete_error, client_write_error};
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::forms::ClientForm;
use crate::models::{Client, Invoice};
use crate::permissions::{Action, ModuleId};

/// Client row of the listing; a client with invoices cannot be deleted.
#[derive(Debug, Serialize)]
pub struct ClientRow {
    #[serde(flatten)]
    pub client: Client,
    pub is_deletable: bool,
}

pub fn client_rows(mut clients: Vec<Client>, invoices: &[Invoice]) -> Vec<ClientRow> {
    let invoiced: HashSet<i64> = invoices.iter().map(|i| i.id_cliente).collect();
    clients.sort_by(|a, b| b.id_cliente.cmp(&a.id_cliente));
    clients
        .into_iter()
        .map(|c| ClientRow {
            is_deletable: !invoiced.contains(&c.id_cliente),
            client: c,
        })
        .collect()
}

/// `GET /api/clients`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ClientRow>>, AppError> {
    auth.require(ModuleId::Clients, Action::Read)?;

    let (clients, invoices) = tokio::join!(state.billing.list_clients(), state.billing.list_invoices());
    Ok(Json(client_rows(clients?, &invoices?)))
}

/// `POST /api/clients`
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<ClientForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    auth.require(ModuleId::Clients, Action::Create)?;
    form.validate()?;

    let created = state.billing.create_client(&form).await.map_err(client_write_error)?;

    info!("{} created client {}", auth.username, form.numero_identificacion);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/clients/:id`
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(form): Json<ClientForm>,
) -> Result<Json<Value>, AppError> {
    auth.require(ModuleId::Clients, Action::Update)?;
    form.validate()?;

    let updated = state.billing.update_client(id, &form).await.map_err(client_write_error)?;

    info!("{} updated client {}", auth.username, id);
    Ok(Json(updated))
}

/// `DELETE /api/clients/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    auth.require(ModuleId::Clients, Action::Delete)?;

    state.billing.delete_client(id).await.map_err(client_delete_error)?;

    info!("{} deleted client {}", auth.username, id);
    Ok(StatusCode::NO_CONTENT)
}
