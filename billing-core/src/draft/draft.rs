use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::draft::calculator::{
    compute_grand_total, compute_line_totals, AmountOverflow, LineItem, LineTotals, ProductCatalog,
};
use crate::draft::credit::{check_credit_limit, CreditDecision};
use crate::draft::state_machine::{DraftEvent, DraftState, DraftStateMachine, Transition, TransitionError};
use crate::error::FieldError;
use crate::models::invoice::{InvoiceHeader, InvoiceSubmission, SubmissionLine};
use crate::models::{Client, ClientType, InvoiceStatus, PaymentType};

/// Errors raised while editing or submitting a draft.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("invalid invoice data")]
    Validation(Vec<FieldError>),

    #[error("line {0} does not exist")]
    LineOutOfRange(usize),

    #[error("an invoice needs at least one line")]
    LastLine,

    #[error("every available product is already on the invoice")]
    TooManyLines,

    #[error("client {0} is not available for invoicing")]
    UnknownClient(i64),

    #[error("select a client first")]
    NoClientSelected,

    #[error("the invoice total must be greater than zero")]
    EmptyTotal,

    #[error("the selected client changed while the debt of client {checked} was being read")]
    ClientChanged { checked: i64 },

    #[error(transparent)]
    Amount(#[from] AmountOverflow),
}

/// Snapshot of the figures a credit approval was granted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CreditApproval {
    client_id: i64,
    payment_type: PaymentType,
    total: Decimal,
}

/// Invoice being composed by a user, not yet sent to the billing API.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    id: Uuid,
    owner: String,
    client_id: Option<i64>,
    payment_type: PaymentType,
    lines: Vec<LineItem>,
    state: DraftState,
    approval: Option<CreditApproval>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Totals of a draft: one entry per line plus the grand total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftTotals {
    pub lines: Vec<LineTotals>,
    pub grand_total: Decimal,
}

impl InvoiceDraft {
    /// Creates a cash draft with a single blank line.
    pub fn new(owner: impl Into<String>) -> Self {
        let now = Utc::now();
        let payment_type = PaymentType::default();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            client_id: None,
            payment_type,
            lines: vec![LineItem::empty()],
            state: DraftStateMachine::initial_state(payment_type),
            approval: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn client_id(&self) -> Option<i64> {
        self.client_id
    }

    pub fn payment_type(&self) -> PaymentType {
        self.payment_type
    }

    /// Status the invoice will be created with.
    pub fn invoice_status(&self) -> InvoiceStatus {
        self.payment_type.initial_status()
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies an edit and drops any credit approval.
    ///
    /// The edit is refused up front while submitting or once submitted.
    fn edit<F>(&mut self, apply: F) -> Result<(), DraftError>
    where
        F: FnOnce(&mut Self) -> Result<(), DraftError>,
    {
        DraftStateMachine::transition(self.state, DraftEvent::Edited { payment: self.payment_type })?;
        apply(self)?;
        self.state =
            DraftStateMachine::transition(self.state, DraftEvent::Edited { payment: self.payment_type })?;
        self.approval = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Selects the client the invoice is issued to.
    pub fn select_client(&mut self, client_id: i64, clients: &[Client]) -> Result<(), DraftError> {
        if !clients.iter().any(|c| c.id_cliente == client_id) {
            return Err(DraftError::UnknownClient(client_id));
        }
        self.edit(|d| {
            d.client_id = Some(client_id);
            Ok(())
        })
    }

    pub fn set_payment_type(&mut self, payment_type: PaymentType) -> Result<(), DraftError> {
        self.edit(|d| {
            d.payment_type = payment_type;
            Ok(())
        })
    }

    /// Appends a blank line and returns its index.
    ///
    /// The draft cannot hold more lines than there are products to choose from.
    pub fn add_line(&mut self, catalog: &ProductCatalog) -> Result<usize, DraftError> {
        if self.lines.len() >= catalog.len() {
            return Err(DraftError::TooManyLines);
        }
        self.edit(|d| {
            d.lines.push(LineItem::empty());
            Ok(())
        })?;
        Ok(self.lines.len() - 1)
    }

    /// Replaces the product and quantity of line `index`.
    ///
    /// Refused when the resulting invoice amount cannot be represented, so
    /// the totals of a draft can always be computed.
    pub fn update_line(
        &mut self,
        catalog: &ProductCatalog,
        index: usize,
        product_id: Option<i64>,
        quantity: u32,
    ) -> Result<(), DraftError> {
        if index >= self.lines.len() {
            return Err(DraftError::LineOutOfRange(index));
        }
        let line = LineItem { product_id, quantity };
        let mut lines = self.lines.clone();
        lines[index] = line;
        compute_grand_total(&lines, catalog)?;

        self.edit(|d| {
            d.lines[index] = line;
            Ok(())
        })
    }

    pub fn remove_line(&mut self, index: usize) -> Result<(), DraftError> {
        if index >= self.lines.len() {
            return Err(DraftError::LineOutOfRange(index));
        }
        if self.lines.len() <= 1 {
            return Err(DraftError::LastLine);
        }
        self.edit(|d| {
            d.lines.remove(index);
            Ok(())
        })
    }

    pub fn totals(&self, catalog: &ProductCatalog) -> Result<DraftTotals, DraftError> {
        let lines = self
            .lines
            .iter()
            .map(|line| compute_line_totals(line, catalog.resolve(line)))
            .collect::<Result<Vec<LineTotals>, _>>()?;
        Ok(DraftTotals {
            grand_total: compute_grand_total(&self.lines, catalog)?,
            lines,
        })
    }

    pub fn grand_total(&self, catalog: &ProductCatalog) -> Result<Decimal, DraftError> {
        Ok(compute_grand_total(&self.lines, catalog)?)
    }

    /// Checks that `client_id` is still the selected client.
    ///
    /// Figures fetched for one client must not be applied to another.
    pub fn ensure_client(&self, client_id: i64) -> Result<(), DraftError> {
        if self.client_id == Some(client_id) {
            Ok(())
        } else {
            Err(DraftError::ClientChanged { checked: client_id })
        }
    }

    /// Field-level problems that block submission.
    ///
    /// Paths follow the form layout: `header.id_cliente`,
    /// `detalles.<index>.id_producto`, `detalles.<index>.cantidad`.
    pub fn validate(&self, catalog: &ProductCatalog, clients: &[Client]) -> Vec<FieldError> {
        let mut errors = Vec::new();

        match self.client_id {
            None => errors.push(FieldError::new("header.id_cliente", "A client must be selected.")),
            Some(id) if !clients.iter().any(|c| c.id_cliente == id) => {
                errors.push(FieldError::new("header.id_cliente", "The selected client is not available."))
            }
            Some(_) => {}
        }

        if self.lines.is_empty() {
            errors.push(FieldError::new("detalles", "The invoice needs at least one line."));
        }

        let mut seen = HashSet::new();
        for (index, line) in self.lines.iter().enumerate() {
            let product_field = format!("detalles.{}.id_producto", index);
            let quantity_field = format!("detalles.{}.cantidad", index);

            if line.quantity < 1 {
                errors.push(FieldError::new(&quantity_field, "Quantity must be at least 1."));
            }

            let Some(product_id) = line.product_id else {
                errors.push(FieldError::new(&product_field, "A product must be selected."));
                continue;
            };

            if !seen.insert(product_id) {
                errors.push(FieldError::new(&product_field, "This product is already on another line."));
            }

            match catalog.get(product_id) {
                None => errors.push(FieldError::new(&product_field, "The selected product is not available.")),
                Some(product) if i64::from(line.quantity) > product.stock_disponible => {
                    errors.push(FieldError::new(
                        &quantity_field,
                        &format!("Insufficient stock. Available: {}", product.stock_disponible),
                    ))
                }
                Some(_) => {}
            }
        }

        errors
    }

    /// Whether the credit check action is currently available.
    pub fn credit_check_enabled(&self, catalog: &ProductCatalog) -> bool {
        self.state.is_editable()
            && self.payment_type == PaymentType::Credit
            && self.client_id.is_some()
            && self.grand_total(catalog).is_ok_and(|total| total > Decimal::ZERO)
    }

    /// Whether the save action is currently available.
    pub fn submit_enabled(&self, catalog: &ProductCatalog) -> bool {
        match self.state {
            DraftState::Editing => true,
            DraftState::CreditApproved => self.has_valid_approval(catalog),
            _ => false,
        }
    }

    fn has_valid_approval(&self, catalog: &ProductCatalog) -> bool {
        match (self.approval, self.client_id) {
            (Some(approval), Some(client_id)) => self.grand_total(catalog).is_ok_and(|total| {
                approval
                    == CreditApproval {
                        client_id,
                        payment_type: self.payment_type,
                        total,
                    }
            }),
            _ => false,
        }
    }

    /// Credit limit of the selected client's type, if one is configured.
    pub fn credit_limit(&self, clients: &[Client], client_types: &[ClientType]) -> Option<Decimal> {
        let client_id = self.client_id?;
        clients
            .iter()
            .find(|c| c.id_cliente == client_id)
            .and_then(|c| c.resolve_type(client_types))
            .map(|t| t.monto_maximo)
    }

    /// Runs the credit check for the current client and total.
    ///
    /// A passing check approves exactly the current client, payment type and
    /// total; any later edit revokes it.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Product snapshot of the draft
    /// * `clients` - Client snapshot of the draft
    /// * `client_types` - Client types, for the credit limit
    /// * `debtor_id` - Client the debt figure was read for
    /// * `current_debt` - Outstanding debt of that client
    ///
    /// # Errors
    ///
    /// Returns `ClientChanged` when `debtor_id` is no longer the selected
    /// client; the draft is left untouched.
    pub fn run_credit_check(
        &mut self,
        catalog: &ProductCatalog,
        clients: &[Client],
        client_types: &[ClientType],
        debtor_id: i64,
        current_debt: Decimal,
    ) -> Result<CreditDecision, DraftError> {
        if self.payment_type != PaymentType::Credit {
            return Err(TransitionError::CreditCheckNotApplicable.into());
        }
        let client_id = self.client_id.ok_or(DraftError::NoClientSelected)?;
        self.ensure_client(debtor_id)?;
        let total = self.grand_total(catalog)?;
        if total <= Decimal::ZERO {
            return Err(DraftError::EmptyTotal);
        }

        let decision = check_credit_limit(self.credit_limit(clients, client_types), current_debt, total);

        self.state = DraftStateMachine::transition(
            self.state,
            DraftEvent::CreditChecked {
                approved: decision.is_approved(),
            },
        )?;
        self.approval = decision.is_approved().then_some(CreditApproval {
            client_id,
            payment_type: self.payment_type,
            total,
        });
        self.updated_at = Utc::now();

        info!(
            "Draft {}: credit check for client {} on {:.2} -> {}",
            self.id,
            client_id,
            total,
            if decision.is_approved() { "approved" } else { "rejected" }
        );

        Ok(decision)
    }

    /// Validates the draft and moves it to `Submitting`.
    ///
    /// # Returns
    ///
    /// The payload to send to the billing API.
    ///
    /// # Errors
    ///
    /// Returns `Validation` with field errors, `CreditCheckRequired` when a
    /// credit draft lacks an approval for its current figures, or a transition
    /// error when already submitting or submitted.
    pub fn begin_submission(
        &mut self,
        catalog: &ProductCatalog,
        clients: &[Client],
    ) -> Result<InvoiceSubmission, DraftError> {
        if !self.state.is_editable() {
            DraftStateMachine::transition(self.state, DraftEvent::SubmitRequested)?;
        }

        let errors = self.validate(catalog, clients);
        if !errors.is_empty() {
            return Err(DraftError::Validation(errors));
        }

        if self.payment_type == PaymentType::Credit && !self.has_valid_approval(catalog) {
            self.state = DraftStateMachine::transition(
                self.state,
                DraftEvent::Edited {
                    payment: self.payment_type,
                },
            )?;
            self.approval = None;
            return Err(TransitionError::CreditCheckRequired.into());
        }

        self.state = DraftStateMachine::transition(self.state, DraftEvent::SubmitRequested)?;
        self.last_error = None;
        self.updated_at = Utc::now();

        let client_id = self.client_id.ok_or(DraftError::NoClientSelected)?;
        Ok(InvoiceSubmission {
            header: InvoiceHeader {
                id_cliente: client_id,
                tipo_pago: self.payment_type,
                estado_factura: self.invoice_status(),
            },
            lines: self
                .lines
                .iter()
                .filter_map(|line| {
                    line.product_id.map(|id_producto| SubmissionLine {
                        id_producto,
                        cantidad: line.quantity,
                    })
                })
                .collect(),
        })
    }

    /// Marks the draft as persisted under `invoice_id`.
    pub fn complete_submission(&mut self, invoice_id: i64) -> Result<(), DraftError> {
        self.state = DraftStateMachine::transition(self.state, DraftEvent::SubmitSucceeded { invoice_id })?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns the draft to editing after a failed submission, keeping the
    /// error for the user. Credit drafts must be checked again.
    pub fn fail_submission(&mut self, message: impl Into<String>) -> Result<(), DraftError> {
        self.state = DraftStateMachine::transition(
            self.state,
            DraftEvent::SubmitFailed {
                payment: self.payment_type,
            },
        )?;
        if self.payment_type == PaymentType::Credit {
            self.approval = None;
        }
        self.last_error = Some(message.into());
        self.updated_at = Utc::now();
        Ok(())
    }
}
