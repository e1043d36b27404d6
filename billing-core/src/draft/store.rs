use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::draft::calculator::{LineTotals, ProductCatalog};
use crate::draft::draft::{DraftTotals, InvoiceDraft};
use crate::draft::state_machine::DraftState;
use crate::error::FieldError;
use crate::models::{Client, ClientType, InvoiceStatus, PaymentType};

/// A draft together with the reference data it was opened with.
///
/// Clients, client types and products are snapshotted when the draft is
/// opened and stay fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct DraftSession {
    pub draft: InvoiceDraft,
    pub catalog: ProductCatalog,
    pub clients: Vec<Client>,
    pub client_types: Vec<ClientType>,
}

/// Summary of the selected client shown on the invoice header.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub id_cliente: i64,
    pub nombre: String,
    pub tipo_identificacion: String,
    pub numero_identificacion: String,
    pub direccion: String,
    pub correo_electronico: String,
    pub telefono: String,
}

/// One rendered line of a draft.
#[derive(Debug, Clone, Serialize)]
pub struct LineView {
    pub index: usize,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub stock: Option<i64>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Everything the invoice form needs to render a draft.
#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: DraftState,
    pub payment_type: PaymentType,
    pub invoice_status: InvoiceStatus,
    pub client: Option<ClientSummary>,
    pub lines: Vec<LineView>,
    pub grand_total: Decimal,
    pub credit_check_enabled: bool,
    pub submit_enabled: bool,
    pub can_add_line: bool,
    pub issues: Vec<FieldError>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DraftSession {
    pub fn new(
        owner: impl Into<String>,
        catalog: ProductCatalog,
        clients: Vec<Client>,
        client_types: Vec<ClientType>,
    ) -> Self {
        Self {
            draft: InvoiceDraft::new(owner),
            catalog,
            clients,
            client_types,
        }
    }

    pub fn view(&self) -> DraftView {
        let draft = &self.draft;
        // Line edits that overflow are refused, so this only trips on a
        // corrupted snapshot.
        let totals = draft.totals(&self.catalog).unwrap_or_else(|e| {
            warn!("Draft {}: totals unavailable: {}", draft.id(), e);
            DraftTotals {
                lines: vec![LineTotals::default(); draft.lines().len()],
                grand_total: Decimal::ZERO,
            }
        });

        let lines = draft
            .lines()
            .iter()
            .zip(totals.lines.iter())
            .enumerate()
            .map(|(index, (line, line_totals))| {
                let product = self.catalog.resolve(line);
                LineView {
                    index,
                    product_id: line.product_id,
                    product_name: product.map(|p| p.nombre.clone()),
                    stock: product.map(|p| p.stock_disponible),
                    unit_price: product.map(|p| p.precio).unwrap_or(Decimal::ZERO),
                    quantity: line.quantity,
                    subtotal: line_totals.subtotal,
                    tax: line_totals.tax,
                    total: line_totals.total,
                }
            })
            .collect();

        let client = draft
            .client_id()
            .and_then(|id| self.clients.iter().find(|c| c.id_cliente == id))
            .map(|c| ClientSummary {
                id_cliente: c.id_cliente,
                nombre: c.full_name(),
                tipo_identificacion: c.tipo_identificacion.clone(),
                numero_identificacion: c.numero_identificacion.clone(),
                direccion: c.direccion.clone(),
                correo_electronico: c.correo_electronico.clone(),
                telefono: c.telefono.clone(),
            });

        DraftView {
            id: draft.id(),
            state: draft.state(),
            payment_type: draft.payment_type(),
            invoice_status: draft.invoice_status(),
            client,
            lines,
            grand_total: totals.grand_total,
            credit_check_enabled: draft.credit_check_enabled(&self.catalog),
            submit_enabled: draft.submit_enabled(&self.catalog),
            can_add_line: draft.state().is_editable() && draft.lines().len() < self.catalog.len(),
            issues: draft.validate(&self.catalog, &self.clients),
            last_error: draft.last_error().map(str::to_string),
            updated_at: draft.updated_at(),
        }
    }
}

/// In-memory store of open drafts, keyed by draft id.
///
/// Each draft is visible only to the user who opened it. Locks are held for
/// in-memory work only, never across a remote call.
#[derive(Debug, Clone, Default)]
pub struct DraftStore {
    sessions: Arc<RwLock<HashMap<Uuid, DraftSession>>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new session and returns its id.
    pub async fn insert(&self, session: DraftSession) -> Uuid {
        let id = session.draft.id();
        info!("Opened draft {} for {}", id, session.draft.owner());
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Clone of the session `id` if it belongs to `owner`.
    pub async fn get(&self, id: Uuid, owner: &str) -> Option<DraftSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .filter(|s| s.draft.owner() == owner)
            .cloned()
    }

    /// Runs `f` against the session `id` under the write lock.
    ///
    /// Returns `None` when the draft does not exist or belongs to someone else.
    pub async fn update<T, F>(&self, id: Uuid, owner: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut DraftSession) -> T,
    {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(&id)
            .filter(|s| s.draft.owner() == owner)
            .map(f)
    }

    /// Discards the session `id`. Returns whether it existed for `owner`.
    pub async fn remove(&self, id: Uuid, owner: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&id) {
            Some(s) if s.draft.owner() == owner => {
                sessions.remove(&id);
                info!("Discarded draft {}", id);
                true
            }
            _ => false,
        }
    }

    /// Drops drafts untouched since `cutoff`. Returns how many were dropped.
    pub async fn purge_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.draft.updated_at() >= cutoff);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
