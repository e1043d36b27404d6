use super::{ApiError, ServiceClient};
use crate::models::product::CatalogResponse;
use crate::models::Product;

/// Client for the read-only product catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    inner: ServiceClient,
}

impl CatalogClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: ServiceClient::new(http, base_url),
        }
    }

    /// All products, normalized from the catalog's wire format.
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let response: CatalogResponse = self.inner.get("/productos").await?;
        Ok(response.productos.into_iter().map(Product::from).collect())
    }
}
