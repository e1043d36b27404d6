//! Read-only views assembled from the billing and catalog data: the two
//! printable reports, the invoice printout and the dashboard counters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::warn;

use crate::api::{ApiError, BillingClient};
use crate::draft::calculator::{round_money, AmountOverflow, IVA_RATE};
use crate::models::invoice::InvoiceWithClient;
use crate::models::{Client, Invoice, InvoiceDetail, Product};

#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    pub generated_on: NaiveDate,
    pub file_name: String,
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub clients: Vec<Client>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceReport {
    pub generated_on: NaiveDate,
    pub file_name: String,
    pub total_count: usize,
    pub paid_count: usize,
    pub paid_amount: Decimal,
    pub pending_count: usize,
    pub pending_amount: Decimal,
    pub total_amount: Decimal,
    pub invoices: Vec<InvoiceWithClient>,
}

/// One line of a printed invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintLine {
    pub id_producto: i64,
    pub nombre: String,
    pub cantidad: i64,
    pub precio_unitario: Decimal,
    pub iva: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoicePrintout {
    pub invoice: Invoice,
    pub client: Client,
    pub lines: Vec<PrintLine>,
    pub subtotal: Decimal,
    pub total_iva: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub client_types: usize,
    pub clients: usize,
    pub invoices: usize,
}

/// Clients report, sorted by first name.
pub fn client_report(mut clients: Vec<Client>, today: NaiveDate) -> ClientReport {
    clients.sort_by_key(|c| c.nombre.to_lowercase());
    let active = clients.iter().filter(|c| c.is_active()).count();

    ClientReport {
        generated_on: today,
        file_name: format!("Reporte Clientes - {}", today.format("%Y-%m-%d")),
        total: clients.len(),
        active,
        inactive: clients.len() - active,
        clients,
    }
}

/// Attaches each invoice's client, when the client is known.
pub fn join_clients(invoices: Vec<Invoice>, clients: &[Client]) -> Vec<InvoiceWithClient> {
    let by_id: HashMap<i64, &Client> = clients.iter().map(|c| (c.id_cliente, c)).collect();
    invoices
        .into_iter()
        .map(|invoice| InvoiceWithClient {
            cliente: by_id.get(&invoice.id_cliente).map(|c| (*c).clone()),
            invoice,
        })
        .collect()
}

/// Invoices report, newest first, with paid/pending totals.
pub fn invoice_report(mut invoices: Vec<Invoice>, clients: &[Client], today: NaiveDate) -> InvoiceReport {
    invoices.sort_by_key(|i| Reverse(i.issued_at()));

    let (paid_count, paid_amount) = tally(invoices.iter().filter(|i| i.is_paid()));
    let (pending_count, pending_amount) = tally(invoices.iter().filter(|i| i.is_pending()));
    let (total_count, total_amount) = tally(invoices.iter());

    InvoiceReport {
        generated_on: today,
        file_name: format!("Reporte Facturas - {}", today.format("%Y-%m-%d")),
        total_count,
        paid_count,
        paid_amount,
        pending_count,
        pending_amount,
        total_amount,
        invoices: join_clients(invoices, clients),
    }
}

fn tally<'a>(invoices: impl Iterator<Item = &'a Invoice>) -> (usize, Decimal) {
    invoices.fold((0, Decimal::ZERO), |(n, amount), i| (n + 1, amount + i.monto_total))
}

/// Printable invoice with IVA recomputed per line from the catalog's
/// current tax flags. Products no longer in the catalog are treated as
/// untaxed.
///
/// Fails when the remote amounts do not fit a `Decimal`.
pub fn invoice_printout(
    invoice: Invoice,
    client: Client,
    details: &[InvoiceDetail],
    products: &[Product],
) -> Result<InvoicePrintout, AmountOverflow> {
    let taxed: HashMap<i64, bool> = products.iter().map(|p| (p.id_producto, p.graba_iva)).collect();

    let lines = details
        .iter()
        .map(|d| {
            let subtotal = d
                .precio_unitario
                .checked_mul(Decimal::from(d.cantidad))
                .ok_or(AmountOverflow)?;
            let iva = if taxed.get(&d.id_producto).copied().unwrap_or(false) {
                round_money(subtotal.checked_mul(IVA_RATE).ok_or(AmountOverflow)?)
            } else {
                Decimal::ZERO
            };
            Ok(PrintLine {
                id_producto: d.id_producto,
                nombre: d.nombre.clone(),
                cantidad: d.cantidad,
                precio_unitario: d.precio_unitario,
                iva,
                subtotal,
            })
        })
        .collect::<Result<Vec<PrintLine>, AmountOverflow>>()?;

    let subtotal = checked_sum(lines.iter().map(|l| l.subtotal))?;
    let total_iva = checked_sum(lines.iter().map(|l| l.iva))?;

    Ok(InvoicePrintout {
        invoice,
        client,
        lines,
        subtotal,
        total_iva,
        total: subtotal.checked_add(total_iva).ok_or(AmountOverflow)?,
    })
}

fn checked_sum(amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, AmountOverflow> {
    amounts.fold(Ok(Decimal::ZERO), |sum, amount| sum?.checked_add(amount).ok_or(AmountOverflow))
}

/// Counts for the dashboard cards. A failing source counts as zero.
pub async fn dashboard_stats(billing: &BillingClient) -> DashboardStats {
    let (types, clients, invoices) = tokio::join!(
        billing.list_client_types(),
        billing.list_clients(),
        billing.list_invoices()
    );

    let count = |name: &str, result: Result<usize, ApiError>| match result {
        Ok(n) => n,
        Err(e) => {
            warn!("Dashboard: could not count {}: {}", name, e);
            0
        }
    };

    DashboardStats {
        client_types: count("client types", types.map(|v| v.len())),
        clients: count("clients", clients.map(|v| v.len())),
        invoices: count("invoices", invoices.map(|v| v.len())),
    }
}
