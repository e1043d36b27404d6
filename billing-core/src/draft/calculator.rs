//! Monetary figures of an invoice draft.
//!
//! Everything here is a pure function of its inputs: the same lines and the
//! same catalog snapshot always produce the same totals, in any line order.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::Product;

/// IVA rate applied to taxed products (15%).
pub const IVA_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

/// Rounds a monetary amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A line of an invoice draft: a product reference and a quantity.
///
/// A freshly added line has no product selected yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub product_id: Option<i64>,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: i64, quantity: u32) -> Self {
        Self {
            product_id: Some(product_id),
            quantity,
        }
    }

    /// Blank line, as added by the "add detail" action.
    pub fn empty() -> Self {
        Self {
            product_id: None,
            quantity: 1,
        }
    }
}

/// Derived amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Immutable product snapshot used while a draft is being composed.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<i64, Product>,
}

impl ProductCatalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id_producto, p)).collect(),
        }
    }

    /// Snapshot restricted to products that can be sold right now.
    pub fn sellable(products: impl IntoIterator<Item = Product>) -> Self {
        Self::new(products.into_iter().filter(Product::is_sellable))
    }

    pub fn get(&self, id: i64) -> Option<&Product> {
        self.products.get(&id)
    }

    /// Product referenced by `line`, if any and if present in the snapshot.
    pub fn resolve(&self, line: &LineItem) -> Option<&Product> {
        line.product_id.and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products ordered by name, for selection lists.
    pub fn products(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.products.values().collect();
        products.sort_by(|a, b| a.nombre.cmp(&b.nombre).then(a.id_producto.cmp(&b.id_producto)));
        products
    }
}

/// A line or total too large for `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("amount exceeds the representable range")]
pub struct AmountOverflow;

/// Subtotal, tax and total of `quantity` units at `unit_price`.
pub fn line_amounts(unit_price: Decimal, quantity: u32, taxed: bool) -> Result<LineTotals, AmountOverflow> {
    let subtotal = unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(AmountOverflow)?;
    let tax = if taxed {
        round_money(subtotal.checked_mul(IVA_RATE).ok_or(AmountOverflow)?)
    } else {
        Decimal::ZERO
    };

    Ok(LineTotals {
        subtotal,
        tax,
        total: subtotal.checked_add(tax).ok_or(AmountOverflow)?,
    })
}

/// Computes subtotal, tax and total of a single line.
///
/// An unresolved product yields all-zero totals rather than an error; the
/// caller renders a neutral line. Only an amount outside the range of
/// `Decimal` is an error.
pub fn compute_line_totals(line: &LineItem, product: Option<&Product>) -> Result<LineTotals, AmountOverflow> {
    match product {
        Some(product) => line_amounts(product.precio, line.quantity, product.graba_iva),
        None => Ok(LineTotals::default()),
    }
}

/// Sums the line totals of every line against the catalog snapshot.
pub fn compute_grand_total(lines: &[LineItem], catalog: &ProductCatalog) -> Result<Decimal, AmountOverflow> {
    lines.iter().try_fold(Decimal::ZERO, |sum, line| {
        let total = compute_line_totals(line, catalog.resolve(line))?.total;
        sum.checked_add(total).ok_or(AmountOverflow)
    })
}
