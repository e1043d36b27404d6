use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::{ApiError, BillingClient, ReceivablesClient};
use crate::models::{Invoice, InvoiceStatus};

/// Result of a mark-as-paid batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub updated_count: usize,
    pub failed: Vec<i64>,
    pub has_errors: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// True when the receivables service could not be read and nothing was done
    pub skipped: bool,
    pub candidates: Vec<i64>,
    #[serde(flatten)]
    pub batch: BatchOutcome,
}

/// Credit invoices still marked pending that receivables no longer lists as
/// open, i.e. invoices that have been collected.
pub fn reconcile_candidates(invoices: &[Invoice], open_invoice_ids: &HashSet<i64>) -> Vec<i64> {
    invoices
        .iter()
        .filter(|i| i.is_credit())
        .filter(|i| i.estado_factura.eq_ignore_ascii_case(InvoiceStatus::Pending.as_str()))
        .filter(|i| !open_invoice_ids.contains(&i.id_factura))
        .map(|i| i.id_factura)
        .collect()
}

/// Marks each invoice as paid, continuing past failures.
///
/// The billing API has no batch endpoint: every invoice is fetched, its
/// status changed and the record put back.
pub async fn mark_paid_batch(billing: &BillingClient, ids: &[i64]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for &id in ids {
        match mark_paid(billing, id).await {
            Ok(()) => outcome.updated_count += 1,
            Err(e) => {
                error!("Failed to update status for invoice {}: {}", id, e);
                outcome.failed.push(id);
            }
        }
    }

    outcome.has_errors = !outcome.failed.is_empty();
    if outcome.updated_count > 0 {
        info!("Marked {} invoice(s) as paid", outcome.updated_count);
    }
    outcome
}

async fn mark_paid(billing: &BillingClient, id: i64) -> Result<(), ApiError> {
    let mut invoice = billing.get_invoice_raw(id).await?;

    let Some(fields) = invoice.as_object_mut() else {
        return Err(ApiError::Decode {
            url: format!("/facturas/{}/", id),
            message: "expected an invoice object".to_string(),
        });
    };
    fields.remove("cliente");
    fields.remove("detalles");
    fields.insert("estado_factura".to_string(), json!(InvoiceStatus::Paid.as_str()));

    let _: Value = billing.put_invoice_raw(id, &invoice).await?;
    Ok(())
}

/// Runs one reconciliation pass.
///
/// # Errors
///
/// Returns an error if the invoice list cannot be fetched. An unreachable
/// receivables service skips the pass instead.
pub async fn reconcile(billing: &BillingClient, receivables: &ReceivablesClient) -> Result<ReconcileOutcome, ApiError> {
    let (invoices, open_ids) = tokio::join!(billing.list_invoices(), receivables.pending_invoice_ids());
    let invoices = invoices?;

    let open_ids = match open_ids {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Could not fetch debtors, skipping invoice status sync: {}", e);
            return Ok(ReconcileOutcome {
                skipped: true,
                ..Default::default()
            });
        }
    };

    let candidates = reconcile_candidates(&invoices, &open_ids);
    if candidates.is_empty() {
        return Ok(ReconcileOutcome::default());
    }

    info!("Identified {} invoice(s) to be marked as paid", candidates.len());
    let batch = mark_paid_batch(billing, &candidates).await;

    Ok(ReconcileOutcome {
        skipped: false,
        candidates,
        batch,
    })
}

/// Periodic reconciliation loop.
///
/// Re-runs [`reconcile`] every `poll_interval_seconds`; failures are logged
/// and the loop carries on.
pub struct Reconciler {
    billing: BillingClient,
    receivables: ReceivablesClient,
    poll_interval_seconds: u64,
    running: Arc<RwLock<bool>>,
}

impl Reconciler {
    /// Creates a new reconciler.
    ///
    /// # Arguments
    ///
    /// * `billing` - Billing API client
    /// * `receivables` - Receivables API client
    /// * `poll_interval_seconds` - Seconds between passes (default: 300)
    pub fn new(billing: BillingClient, receivables: ReceivablesClient, poll_interval_seconds: Option<u64>) -> Self {
        Self {
            billing,
            receivables,
            poll_interval_seconds: poll_interval_seconds.unwrap_or(300),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        *self.running.write().await = true;
        info!(
            "Reconciler started with poll interval: {} seconds",
            self.poll_interval_seconds
        );

        while *self.running.read().await {
            match reconcile(&self.billing, &self.receivables).await {
                Ok(outcome) if outcome.batch.has_errors => {
                    warn!(
                        "Reconciliation updated {} invoice(s), {} failed",
                        outcome.batch.updated_count,
                        outcome.batch.failed.len()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error in reconciliation loop: {}", e);
                }
            }

            sleep(Duration::from_secs(self.poll_interval_seconds)).await;
        }

        info!("Reconciler stopped");
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping Reconciler...");
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::http_client;
    use crate::models::invoice::fixtures::invoice;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clients(uri: &str) -> (BillingClient, ReceivablesClient) {
        let http = http_client(Duration::from_secs(5)).unwrap();
        (BillingClient::new(http.clone(), uri), ReceivablesClient::new(http, uri))
    }

    #[test]
    fn test_candidates_are_collected_credit_invoices() {
        let invoices = vec![
            invoice(1, 1, "Credito", "Pendiente", 10),
            invoice(2, 1, "Credito", "Pendiente", 10),
            invoice(3, 1, "Efectivo", "Pendiente", 10),
            invoice(4, 1, "Credito", "Pagado", 10),
        ];
        let open: HashSet<i64> = [2].into_iter().collect();

        assert_eq!(reconcile_candidates(&invoices, &open), vec![1]);
    }

    #[tokio::test]
    async fn test_mark_paid_strips_nested_objects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/facturas/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_factura": 1,
                "id_cliente": 3,
                "monto_total": "11.50",
                "tipo_pago": "Credito",
                "estado_factura": "Pendiente",
                "cliente": { "id_cliente": 3 },
                "detalles": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/facturas/1/"))
            .and(body_json(json!({
                "id_factura": 1,
                "id_cliente": 3,
                "monto_total": "11.50",
                "tipo_pago": "Credito",
                "estado_factura": "Pagado"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id_factura": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/facturas/2/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (billing, _) = clients(&server.uri());
        let outcome = mark_paid_batch(&billing, &[1, 2]).await;

        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.failed, vec![2]);
        assert!(outcome.has_errors);
    }

    #[tokio::test]
    async fn test_reconcile_skips_without_receivables() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/facturas/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id_factura": 1, "id_cliente": 1, "monto_total": 10, "tipo_pago": "Credito", "estado_factura": "Pendiente" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clientes/deudores"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (billing, receivables) = clients(&server.uri());
        let outcome = reconcile(&billing, &receivables).await.unwrap();

        assert!(outcome.skipped);
        assert!(outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_marks_collected_invoices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/facturas/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id_factura": 1, "id_cliente": 1, "monto_total": 10, "tipo_pago": "Credito", "estado_factura": "Pendiente" },
                { "id_factura": 2, "id_cliente": 1, "monto_total": 20, "tipo_pago": "Credito", "estado_factura": "Pendiente" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clientes/deudores"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id_cliente": 1, "total_deuda": 20, "facturas_pendientes": [{ "id_factura": 2 }] }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/facturas/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_factura": 1, "id_cliente": 1, "monto_total": 10, "tipo_pago": "Credito", "estado_factura": "Pendiente"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/facturas/1/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (billing, receivables) = clients(&server.uri());
        let outcome = reconcile(&billing, &receivables).await.unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.candidates, vec![1]);
        assert_eq!(outcome.batch.updated_count, 1);
        assert!(!outcome.batch.has_errors);
    }
}
