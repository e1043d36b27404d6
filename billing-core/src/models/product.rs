use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lenient;

/// Product as served by the catalog API (`GET /productos`).
///
/// The catalog uses its own vocabulary (`pvp`, `stock_actual`) and encodes
/// numbers as strings; [`Product`] is the normalized form used everywhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProduct {
    pub id_producto: i64,
    #[serde(default)]
    pub codigo: Option<String>,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(deserialize_with = "lenient::decimal::deserialize")]
    pub pvp: Decimal,
    #[serde(default, deserialize_with = "lenient::optional_decimal::deserialize")]
    pub costo: Option<Decimal>,
    #[serde(deserialize_with = "lenient::integer::deserialize")]
    pub stock_actual: i64,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub graba_iva: bool,
}

/// Envelope returned by the catalog API.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    pub productos: Vec<CatalogProduct>,
}

/// Product model as exposed by the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier
    pub id_producto: i64,

    /// Internal product code
    pub codigo: Option<String>,

    pub nombre: String,

    pub descripcion: Option<String>,

    /// Unit sale price
    pub precio: Decimal,

    /// Unit cost, when the catalog discloses it
    pub costo: Option<Decimal>,

    /// Units available for sale at snapshot time
    pub stock_disponible: i64,

    /// Catalog status (`ACTIVO` / `INACTIVO`)
    pub estado: Option<String>,

    /// Whether IVA applies to this product
    pub graba_iva: bool,
}

impl Product {
    /// A product can be put on a new invoice when it is active and in stock.
    pub fn is_sellable(&self) -> bool {
        let active = self
            .estado
            .as_deref()
            .map(|e| e.eq_ignore_ascii_case("activo"))
            .unwrap_or(false);
        active && self.stock_disponible > 0
    }
}

impl From<CatalogProduct> for Product {
    fn from(p: CatalogProduct) -> Self {
        Product {
            id_producto: p.id_producto,
            codigo: p.codigo,
            nombre: p.nombre,
            descripcion: p.descripcion,
            precio: p.pvp,
            costo: p.costo,
            stock_disponible: p.stock_actual,
            estado: p.estado,
            graba_iva: p.graba_iva,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_product_normalization() {
        let raw = r#"{
            "productos": [{
                "id_producto": 4,
                "codigo": "P-004",
                "nombre": "Cuaderno",
                "descripcion": "100 hojas",
                "pvp": "2.50",
                "costo": "1.10",
                "stock_actual": "40",
                "estado": "ACTIVO",
                "graba_iva": true
            }]
        }"#;
        let response: CatalogResponse = serde_json::from_str(raw).unwrap();
        let product = Product::from(response.productos.into_iter().next().unwrap());

        assert_eq!(product.precio, Decimal::new(250, 2));
        assert_eq!(product.costo, Some(Decimal::new(110, 2)));
        assert_eq!(product.stock_disponible, 40);
        assert!(product.graba_iva);
        assert!(product.is_sellable());
    }

    #[test]
    fn test_out_of_stock_or_inactive_is_not_sellable() {
        let mut product = Product {
            id_producto: 1,
            codigo: None,
            nombre: "Lapiz".to_string(),
            descripcion: None,
            precio: Decimal::ONE,
            costo: None,
            stock_disponible: 0,
            estado: Some("activo".to_string()),
            graba_iva: false,
        };
        assert!(!product.is_sellable());

        product.stock_disponible = 5;
        product.estado = Some("INACTIVO".to_string());
        assert!(!product.is_sellable());

        product.estado = None;
        assert!(!product.is_sellable());
    }
}
