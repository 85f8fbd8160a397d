use crate::{
    dto::products::{ProductList, UpsertProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = state.products.list_products().await?;
    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: &str) -> AppResult<ApiResponse<Product>> {
    let product = state
        .products
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::ProductNotFound(id.to_string()))?;
    Ok(ApiResponse::success("Product", product, None))
}

/// Creates or replaces a catalog entry. Stock set here bypasses the inventory
/// ledger, so it is an admin-only restock operation.
pub async fn upsert_product(
    state: &AppState,
    user: &AuthUser,
    payload: UpsertProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.id.trim().is_empty() {
        return Err(AppError::BadRequest("id is required".into()));
    }
    if payload.price < 0 || payload.stock < 0 {
        return Err(AppError::BadRequest("price and stock must not be negative".into()));
    }

    let product = state
        .products
        .save_product(Product {
            id: payload.id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            stock: payload.stock,
            image_url: payload.image_url,
            category: payload.category,
        })
        .await?;

    tracing::info!(product_id = %product.id, stock = product.stock, "product saved");
    Ok(ApiResponse::success("Product saved", product, Some(Meta::empty())))
}
