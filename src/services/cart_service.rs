use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLineDto, CartView, UpdateCartLineRequest},
    entity::{
        cart_items::{
            ActiveModel as CartActive, Column as CartCol, Entity as CartItems,
            Model as CartModel,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    state::AppState,
};

/// Add a product to the buyer's cart. A repeat add for the same product
/// merges into the existing line; the merged quantity is validated against
/// current stock, not just the delta.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::ProductNotFound(payload.product_id)),
    };

    let existing = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;

    let requested = match existing.as_ref() {
        Some(line) => line
            .quantity
            .checked_add(payload.quantity)
            .ok_or_else(|| AppError::Validation("quantity is too large".to_string()))?,
        None => payload.quantity,
    };

    if product.stock < requested {
        return Err(AppError::InsufficientStock(product.id));
    }

    let cart_item = match existing {
        Some(line) => {
            let mut active: CartActive = line.into();
            active.quantity = Set(requested);
            active.update(&state.orm).await?
        }
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("OK", cart_item_from_entity(cart_item)))
}

/// Cart breakdown priced from the current catalog. Totals can drift if a
/// seller reprices a product between add and checkout.
pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&state.orm)
        .await?;

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut grand_total = Decimal::ZERO;
    let mut dtos = Vec::with_capacity(lines.len());

    for line in lines {
        let product = Products::find_by_id(line.product_id).one(&state.orm).await?;
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::ProductNotFound(line.product_id)),
        };

        let line_total = product.discounted_price * Decimal::from(line.quantity);
        grand_total += line_total;

        dtos.push(CartLineDto {
            id: line.id,
            product_id: product.id,
            product_name: product.name,
            unit_price: product.discounted_price,
            quantity: line.quantity,
            line_total,
        });
    }

    Ok(ApiResponse::ok(
        "OK",
        CartView {
            grand_total,
            lines: dtos,
        },
    ))
}

/// Overwrite a line's quantity after re-validating stock for the new
/// absolute amount.
pub async fn update_cart_line(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
    payload: UpdateCartLineRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let line = CartItems::find_by_id(line_id)
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let line = match line {
        Some(l) => l,
        None => return Err(AppError::CartLineNotFound),
    };

    let product = Products::find_by_id(line.product_id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::ProductNotFound(line.product_id)),
    };

    if product.stock < payload.quantity {
        return Err(AppError::InsufficientStock(product.id));
    }

    let mut active: CartActive = line.into();
    active.quantity = Set(payload.quantity);
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": line_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("OK", cart_item_from_entity(updated)))
}

pub async fn delete_cart_line(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartCol::Id.eq(line_id))
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::CartLineNotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": line_id }),
    )
    .await;

    Ok(ApiResponse::ok("Removed from cart", serde_json::json!({})))
}

fn cart_item_from_entity(model: CartModel) -> CartItem {
    CartItem {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
