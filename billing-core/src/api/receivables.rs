use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{ApiError, ServiceClient};
use crate::models::debt::debt_for;
use crate::models::ClientDebt;

/// Client for the receivables service, the source of truth for client debt.
#[derive(Debug, Clone)]
pub struct ReceivablesClient {
    inner: ServiceClient,
}

impl ReceivablesClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: ServiceClient::new(http, base_url),
        }
    }

    pub async fn list_debtors(&self) -> Result<Vec<ClientDebt>, ApiError> {
        self.inner.get("/clientes/deudores").await
    }

    /// Outstanding debt of one client; zero when the client owes nothing.
    pub async fn current_debt(&self, client_id: i64) -> Result<Decimal, ApiError> {
        let debtors = self.list_debtors().await?;
        Ok(debt_for(&debtors, client_id))
    }

    /// Ids of every invoice the receivables service still considers open.
    pub async fn pending_invoice_ids(&self) -> Result<HashSet<i64>, ApiError> {
        let debtors = self.list_debtors().await?;
        Ok(debtors
            .iter()
            .flat_map(|d| d.facturas_pendientes.iter().map(|f| f.id_factura))
            .collect())
    }
}
