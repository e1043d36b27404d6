use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::api::ApiError;
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::models::invoice::InvoiceWithClient;
use crate::models::{Client, Invoice, InvoiceDetail};
use crate::permissions::{Action, ModuleId};
use crate::reconcile::{self, BatchOutcome, ReconcileOutcome};
use crate::reports::{invoice_printout, join_clients, InvoicePrintout};

#[derive(Debug, Serialize)]
pub struct InvoiceDetailView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub cliente: Option<Client>,
    pub detalles: Vec<InvoiceDetail>,
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub ids: Vec<i64>,
}

/// `GET /api/invoices` - newest first, with their clients.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<InvoiceWithClient>>, AppError> {
    auth.require(ModuleId::Invoices, Action::Read)?;

    let (invoices, clients) = tokio::join!(state.billing.list_invoices(), state.billing.list_clients());
    let mut invoices = invoices?;
    invoices.sort_by(|a, b| b.id_factura.cmp(&a.id_factura));
    Ok(Json(join_clients(invoices, &clients?)))
}

/// `GET /api/invoices/:id`
pub async fn detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<InvoiceDetailView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Read)?;

    let (invoice, details, clients) = tokio::join!(
        state.billing.get_invoice(id),
        state.billing.invoice_details(id),
        state.billing.list_clients()
    );
    let invoice = invoice?;
    let cliente = clients?.into_iter().find(|c| c.id_cliente == invoice.id_cliente);

    Ok(Json(InvoiceDetailView {
        invoice,
        cliente,
        detalles: details?,
    }))
}

/// `DELETE /api/invoices/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    auth.require(ModuleId::Invoices, Action::Delete)?;

    state.billing.delete_invoice(id).await.map_err(|e| match e {
        ApiError::Status { .. } => AppError::conflict("Could not delete the invoice."),
        other => AppError::from(other),
    })?;

    info!("{} deleted invoice {}", auth.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/invoices/:id/print`
pub async fn print(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<InvoicePrintout>, AppError> {
    auth.require(ModuleId::Invoices, Action::Read)?;

    let (invoice, details, clients, products) = tokio::join!(
        state.billing.get_invoice(id),
        state.billing.invoice_details(id),
        state.billing.list_clients(),
        state.catalog.list_products()
    );
    let invoice = invoice?;
    let client = clients?
        .into_iter()
        .find(|c| c.id_cliente == invoice.id_cliente)
        .ok_or_else(|| AppError::NotFound(format!("The client of invoice {} could not be loaded", id)))?;

    let printout = invoice_printout(invoice, client, &details?, &products?).map_err(|e| {
        warn!("Invoice {} cannot be printed: {}", id, e);
        AppError::Upstream("The invoice amounts returned by the billing service are out of range.".to_string())
    })?;
    Ok(Json(printout))
}

/// `POST /api/invoices/mark-paid`
pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<BatchOutcome>, AppError> {
    auth.require(ModuleId::Invoices, Action::Update)?;

    let outcome = reconcile::mark_paid_batch(&state.billing, &request.ids).await;
    Ok(Json(outcome))
}

/// `POST /api/invoices/reconcile`
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    auth.require(ModuleId::Invoices, Action::Update)?;

    let outcome = reconcile::reconcile(&state.billing, &state.receivables).await?;
    Ok(Json(outcome))
}
