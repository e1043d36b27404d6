use axum::{extract::State, Extension, Json};

use super::AppState;
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::models::Product;
use crate::permissions::{Action, ModuleId};

/// `GET /api/products` - the whole catalog, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Product>>, AppError> {
    auth.require(ModuleId::Products, Action::Read)?;

    let mut products = state.catalog.list_products().await?;
    products.sort_by(|a, b| b.id_producto.cmp(&a.id_producto));
    Ok(Json(products))
}
