pub mod calculator;
pub mod credit;
#[allow(clippy::module_inception)]
pub mod draft;
pub mod state_machine;
pub mod store;

pub use calculator::{
    compute_grand_total, compute_line_totals, line_amounts, AmountOverflow, LineItem, LineTotals, ProductCatalog, IVA_RATE,
};
pub use credit::{check_credit_limit, CreditDecision};
pub use draft::{DraftError, InvoiceDraft};
pub use state_machine::{DraftState, Transition};
pub use store::{DraftSession, DraftStore, DraftView};
