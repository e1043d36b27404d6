pub mod client;
pub mod debt;
pub mod invoice;
pub mod lenient;
pub mod product;

pub use client::{Client, ClientType};
pub use debt::ClientDebt;
pub use invoice::{Invoice, InvoiceDetail, InvoiceStatus, PaymentType};
pub use product::Product;
