use axum::{extract::State, Extension, Json};
use chrono::Local;
use serde::Serialize;

use super::AppState;
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::permissions::{Action, ModuleId};
use crate::reports::{client_report, dashboard_stats, invoice_report, ClientReport, DashboardStats, InvoiceReport};

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub username: String,
    pub stats: DashboardStats,
}

/// `GET /api/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Dashboard>, AppError> {
    auth.require(ModuleId::Dashboard, Action::Read)?;

    Ok(Json(Dashboard {
        stats: dashboard_stats(&state.billing).await,
        username: auth.username,
    }))
}

/// `GET /api/reports/clients`
pub async fn clients(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ClientReport>, AppError> {
    auth.require(ModuleId::ClientReport, Action::Read)?;

    let clients = state.billing.list_clients().await?;
    Ok(Json(client_report(clients, Local::now().date_naive())))
}

/// `GET /api/reports/invoices`
pub async fn invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<InvoiceReport>, AppError> {
    auth.require(ModuleId::InvoiceReport, Action::Read)?;

    let (invoices, clients) = tokio::join!(state.billing.list_invoices(), state.billing.list_clients());
    Ok(Json(invoice_report(invoices?, &clients?, Local::now().date_naive())))
}
