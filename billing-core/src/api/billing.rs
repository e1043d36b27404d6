use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use super::{ApiError, ServiceClient};
use crate::error::{AppError, FieldError};
use crate::forms::{ClientForm, ClientTypeForm};
use crate::models::invoice::{
    CreateInvoiceDetails, CreateInvoiceHeader, CreatedInvoice, InvoiceDetailGroup, InvoiceSubmission,
};
use crate::models::{Client, ClientType, Invoice, InvoiceDetail};

pub const DUPLICATE_CLIENT_TYPE: &str = "A client type with this name already exists.";
pub const CLIENT_TYPE_IN_USE: &str = "Could not delete the client type. It may be in use.";
pub const DUPLICATE_IDENTIFICATION: &str = "A client with this identification number already exists.";
pub const CLIENT_WRITE_FAILED: &str = "Could not process the request. Check the data and try again.";
pub const CLIENT_HAS_INVOICES: &str = "Could not delete the client. It may have associated invoices.";

/// Client for the billing API: client types, clients, invoices and their details.
#[derive(Debug, Clone)]
pub struct BillingClient {
    inner: ServiceClient,
}

impl BillingClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: ServiceClient::new(http, base_url),
        }
    }

    pub async fn list_client_types(&self) -> Result<Vec<ClientType>, ApiError> {
        self.inner.get("/tipo_clientes/").await
    }

    pub async fn create_client_type(&self, form: &ClientTypeForm) -> Result<Value, ApiError> {
        self.inner.post("/tipo_clientes/", form).await
    }

    pub async fn update_client_type(&self, id: i64, form: &ClientTypeForm) -> Result<Value, ApiError> {
        self.inner.put(&format!("/tipo_clientes/{}/", id), form).await
    }

    pub async fn delete_client_type(&self, id: i64) -> Result<(), ApiError> {
        self.inner.delete(&format!("/tipo_clientes/{}/", id)).await
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, ApiError> {
        self.inner.get("/clientes/").await
    }

    pub async fn create_client(&self, form: &ClientForm) -> Result<Value, ApiError> {
        self.inner.post("/clientes/", form).await
    }

    pub async fn update_client(&self, id: i64, form: &ClientForm) -> Result<Value, ApiError> {
        self.inner.put(&format!("/clientes/{}/", id), form).await
    }

    pub async fn delete_client(&self, id: i64) -> Result<(), ApiError> {
        self.inner.delete(&format!("/clientes/{}/", id)).await
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.inner.get("/facturas/").await
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
        self.inner.get(&format!("/facturas/{}/", id)).await
    }

    /// Fetches an invoice as raw JSON, preserving fields the console does not model.
    pub async fn get_invoice_raw(&self, id: i64) -> Result<Value, ApiError> {
        self.inner.get(&format!("/facturas/{}/", id)).await
    }

    pub async fn put_invoice_raw(&self, id: i64, invoice: &Value) -> Result<Value, ApiError> {
        self.inner.put(&format!("/facturas/{}/", id), invoice).await
    }

    pub async fn delete_invoice(&self, id: i64) -> Result<(), ApiError> {
        self.inner.delete(&format!("/facturas/{}/", id)).await
    }

    pub async fn list_invoice_details(&self) -> Result<Vec<InvoiceDetailGroup>, ApiError> {
        self.inner.get("/detalle_facturas/").await
    }

    /// Detail lines of one invoice; empty if the API has none for it.
    pub async fn invoice_details(&self, invoice_id: i64) -> Result<Vec<InvoiceDetail>, ApiError> {
        let groups = self.list_invoice_details().await?;
        Ok(groups
            .into_iter()
            .find(|g| g.id_factura == invoice_id)
            .map(|g| g.detalles)
            .unwrap_or_default())
    }

    /// Creates an invoice: header first, then its detail lines.
    ///
    /// The header goes out with a zero total; the billing API computes the
    /// real one from the details.
    ///
    /// # Returns
    ///
    /// The id of the new invoice.
    pub async fn create_invoice(&self, submission: &InvoiceSubmission) -> Result<i64, ApiError> {
        let header = CreateInvoiceHeader {
            header: &submission.header,
            monto_total: Decimal::ZERO,
        };
        let created: CreatedInvoice = self.inner.post("/facturas/", &header).await?;
        let id_factura = created.id_factura.ok_or_else(|| ApiError::Decode {
            url: format!("{}/facturas/", self.inner.base_url()),
            message: "the invoice header was created without an id_factura".to_string(),
        })?;

        let details = CreateInvoiceDetails {
            id_factura,
            productos: &submission.lines,
        };
        let _: Value = self.inner.post("/detalle_facturas/", &details).await?;

        info!(
            "Created invoice {} for client {} with {} line(s)",
            id_factura,
            submission.header.id_cliente,
            submission.lines.len()
        );
        Ok(id_factura)
    }
}

/// Maps a failed client type create/update to a user-facing error.
pub fn client_type_write_error(err: ApiError, fallback: &str) -> AppError {
    match err.body() {
        Some(body) if body.contains("already exists") => AppError::field_conflict("nombre", DUPLICATE_CLIENT_TYPE),
        _ => AppError::Upstream(fallback.to_string()),
    }
}

pub fn client_type_delete_error(err: ApiError) -> AppError {
    match err {
        ApiError::Status { .. } => AppError::conflict(CLIENT_TYPE_IN_USE),
        _ => AppError::Upstream(CLIENT_TYPE_IN_USE.to_string()),
    }
}

/// Maps a failed client create/update to a user-facing error.
///
/// The billing API reports identification problems in a `details` text and
/// duplicates either as a keyed error object or as an "already exists" text.
pub fn client_write_error(err: ApiError) -> AppError {
    let Some(body) = err.body() else {
        return AppError::Upstream(CLIENT_WRITE_FAILED.to_string());
    };

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(details) = json.get("details").and_then(Value::as_str) {
            let lowered = details.to_lowercase();
            if lowered.contains("cédula inválida") || lowered.contains("ruc inválido") {
                return AppError::Validation(vec![FieldError::new("numero_identificacion", details)]);
            }
        }
        if json.get("numero_identificacion").is_some() {
            return AppError::field_conflict("numero_identificacion", DUPLICATE_IDENTIFICATION);
        }
    }

    if body.contains("already exists") {
        return AppError::field_conflict("numero_identificacion", DUPLICATE_IDENTIFICATION);
    }

    match err.status() {
        Some(status) if (400..500).contains(&status) => AppError::BadRequest(CLIENT_WRITE_FAILED.to_string()),
        _ => AppError::Upstream(CLIENT_WRITE_FAILED.to_string()),
    }
}

pub fn client_delete_error(err: ApiError) -> AppError {
    match err {
        ApiError::Status { .. } => AppError::conflict(CLIENT_HAS_INVOICES),
        _ => AppError::Upstream(CLIENT_HAS_INVOICES.to_string()),
    }
}
