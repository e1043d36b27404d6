use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::client::Client;
use super::lenient;

/// Payment type of an invoice, using the billing API's wire values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    /// Cash sale, settled on the spot
    #[default]
    #[serde(rename = "Efectivo")]
    Cash,

    /// Credit sale, added to the client's receivables
    #[serde(rename = "Credito")]
    Credit,
}

impl PaymentType {
    /// Invoice status implied by the payment type at creation time.
    pub fn initial_status(self) -> InvoiceStatus {
        match self {
            PaymentType::Cash => InvoiceStatus::Paid,
            PaymentType::Credit => InvoiceStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Cash => "Efectivo",
            PaymentType::Credit => "Credito",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[serde(rename = "Pagado")]
    Paid,
    #[serde(rename = "Pendiente")]
    Pending,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "Pagado",
            InvoiceStatus::Pending => "Pendiente",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice model mirroring the billing API's `/facturas/` resource.
///
/// `tipo_pago` and `estado_factura` are kept as the raw strings the API
/// returns; older records use values outside [`PaymentType`] and
/// [`InvoiceStatus`] (e.g. `"credito"` as a status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id_factura: i64,

    pub id_cliente: i64,

    /// Invoice number assigned by the billing API
    #[serde(default)]
    pub numero_factura: String,

    /// Issue date (date or date-time string)
    #[serde(default)]
    pub fecha_factura: String,

    /// Total computed by the billing API
    #[serde(deserialize_with = "lenient::decimal::deserialize")]
    pub monto_total: Decimal,

    pub tipo_pago: String,

    pub estado_factura: String,
}

impl Invoice {
    pub fn is_credit(&self) -> bool {
        self.tipo_pago.eq_ignore_ascii_case(PaymentType::Credit.as_str())
    }

    pub fn is_paid(&self) -> bool {
        self.estado_factura.eq_ignore_ascii_case(InvoiceStatus::Paid.as_str())
    }

    /// Pending collection: `Pendiente`, or the legacy `credito` status.
    pub fn is_pending(&self) -> bool {
        self.estado_factura.eq_ignore_ascii_case(InvoiceStatus::Pending.as_str())
            || self.estado_factura.eq_ignore_ascii_case("credito")
    }

    /// Parses `fecha_factura`, accepting RFC 3339, naive date-times and plain dates.
    pub fn issued_at(&self) -> Option<NaiveDateTime> {
        let raw = self.fecha_factura.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Invoice joined with its client, as listed by the console.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithClient {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub cliente: Option<Client>,
}

/// Detail line of a persisted invoice (`/detalle_facturas/`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetail {
    #[serde(default)]
    pub id_detalle_factura: i64,
    #[serde(default)]
    pub id_factura: i64,
    pub id_producto: i64,
    #[serde(default)]
    pub nombre: String,
    #[serde(deserialize_with = "lenient::integer::deserialize")]
    pub cantidad: i64,
    #[serde(deserialize_with = "lenient::decimal::deserialize")]
    pub precio_unitario: Decimal,
    #[serde(default, deserialize_with = "lenient::optional_decimal::deserialize")]
    pub total_producto: Option<Decimal>,
}

/// Detail lines grouped per invoice, the shape `GET /detalle_facturas/` returns.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceDetailGroup {
    pub id_factura: i64,
    #[serde(default)]
    pub detalles: Vec<InvoiceDetail>,
}

/// Header of a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceHeader {
    pub id_cliente: i64,
    pub tipo_pago: PaymentType,
    pub estado_factura: InvoiceStatus,
}

/// One line of a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionLine {
    pub id_producto: i64,
    pub cantidad: u32,
}

/// Complete payload for creating an invoice.
///
/// The billing API computes the authoritative total; the header is sent with
/// `monto_total: 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSubmission {
    pub header: InvoiceHeader,
    pub lines: Vec<SubmissionLine>,
}

/// Body of `POST /facturas/`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateInvoiceHeader<'a> {
    #[serde(flatten)]
    pub header: &'a InvoiceHeader,
    pub monto_total: Decimal,
}

/// Body of `POST /detalle_facturas/`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateInvoiceDetails<'a> {
    pub id_factura: i64,
    pub productos: &'a [SubmissionLine],
}

/// Response of `POST /facturas/`; only the id is relied upon.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedInvoice {
    #[serde(default)]
    pub id_factura: Option<i64>,
}
