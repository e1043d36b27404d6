use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lenient;

/// Reference to an invoice the receivables service still considers open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvoiceRef {
    pub id_factura: i64,
}

/// Debtor entry from the receivables API (`GET /clientes/deudores`).
///
/// Clients without an entry owe nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDebt {
    pub id_cliente: i64,

    /// Outstanding debt across all pending invoices
    #[serde(default, deserialize_with = "lenient::decimal::deserialize")]
    pub total_deuda: Decimal,

    /// Invoices still pending collection
    #[serde(default)]
    pub facturas_pendientes: Vec<PendingInvoiceRef>,
}

/// Current debt of `client_id`, zero when the client is not a debtor.
pub fn debt_for(debts: &[ClientDebt], client_id: i64) -> Decimal {
    debts
        .iter()
        .find(|d| d.id_cliente == client_id)
        .map(|d| d.total_deuda)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_lookup_defaults_to_zero() {
        let debts: Vec<ClientDebt> = serde_json::from_str(
            r#"[
                {"id_cliente": 1, "total_deuda": "200.00", "facturas_pendientes": [{"id_factura": 9}]},
                {"id_cliente": 2, "total_deuda": 15}
            ]"#,
        )
        .unwrap();

        assert_eq!(debt_for(&debts, 1), Decimal::from(200));
        assert_eq!(debt_for(&debts, 2), Decimal::from(15));
        assert_eq!(debt_for(&debts, 3), Decimal::ZERO);
        assert!(debts[1].facturas_pendientes.is_empty());
    }
}
