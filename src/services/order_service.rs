use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    codes::generate_tracking_number,
    dto::orders::{CheckoutSummary, CreateOrderRequest, OrderList, UpdateOrderRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        orders::{
            self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders,
            Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    state::AppState,
};

pub const STATUS_PENDING: &str = "Pending";
pub const PAYMENT_UNPAID: &str = "Unpaid";
pub const PAYMENT_PAID: &str = "Paid";
pub const CART_PAYMENT_METHOD: &str = "Cart Payment";
const DELIVERY_ESTIMATE_DAYS: i64 = 7;

struct LinePlan {
    product_id: Uuid,
    quantity: i32,
    line_total: Decimal,
}

/// Convert every cart line of the buyer into an order.
///
/// Runs as one transaction: every referenced product row is locked and the
/// whole line set is validated before any stock decrement or order insert.
/// A failure on any line rolls the entire checkout back, leaving stock,
/// orders and the cart untouched.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutSummary>> {
    let txn = state.orm.begin().await?;

    let buyer = Users::find_by_id(user.user_id).one(&txn).await?;
    let buyer = match buyer {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };

    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Validation pass: lock each product row and build the plan. Nothing is
    // mutated until every line has passed.
    let mut plans: Vec<LinePlan> = Vec::with_capacity(lines.len());
    let mut grand_total = Decimal::ZERO;

    for line in &lines {
        let product = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::ProductNotFound(line.product_id)),
        };

        if product.stock < line.quantity {
            return Err(AppError::InsufficientStock(product.id));
        }

        let line_total = product.discounted_price * Decimal::from(line.quantity);
        grand_total += line_total;

        plans.push(LinePlan {
            product_id: product.id,
            quantity: line.quantity,
            line_total,
        });
    }

    // Commit pass: decrement stock and create one order per line.
    let estimated_delivery = Utc::now() + Duration::days(DELIVERY_ESTIMATE_DAYS);
    let mut created: Vec<Order> = Vec::with_capacity(plans.len());

    for plan in &plans {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(plan.quantity))
            .filter(ProdCol::Id.eq(plan.product_id))
            .exec(&txn)
            .await?;

        let order = OrderActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(plan.product_id),
            quantity: Set(plan.quantity),
            total_price: Set(plan.line_total),
            status: Set(STATUS_PENDING.into()),
            payment_status: Set(PAYMENT_UNPAID.into()),
            delivery_address: Set(buyer.address.clone()),
            payment_method: Set(CART_PAYMENT_METHOD.into()),
            tracking_number: Set(Some(generate_tracking_number())),
            estimated_delivery_date: Set(Some(estimated_delivery.into())),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        created.push(order_from_entity(order));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "orders": created.len(), "grand_total": grand_total }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Checkout success",
        CheckoutSummary {
            grand_total,
            orders: created,
        },
    ))
}

/// Direct order for a single product, bypassing the cart. Same validation
/// and record construction as checkout, but the caller supplies the payment
/// method label.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;

    let buyer = Users::find_by_id(user.user_id).one(&txn).await?;
    let buyer = match buyer {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };

    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::ProductNotFound(payload.product_id)),
    };

    if product.stock < payload.quantity {
        return Err(AppError::InsufficientStock(product.id));
    }

    let total_price = product.discounted_price * Decimal::from(payload.quantity);

    Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(payload.quantity))
        .filter(ProdCol::Id.eq(product.id))
        .exec(&txn)
        .await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        total_price: Set(total_price),
        status: Set(STATUS_PENDING.into()),
        payment_status: Set(PAYMENT_UNPAID.into()),
        delivery_address: Set(buyer.address),
        payment_method: Set(payload.payment_method),
        tracking_number: Set(Some(generate_tracking_number())),
        estimated_delivery_date: Set(Some(
            (Utc::now() + Duration::days(DELIVERY_ESTIMATE_DAYS)).into(),
        )),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::ok("Order created", order_from_entity(order)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    Ok(ApiResponse::ok("OK", order_from_entity(order)))
}

/// Partial update: only fields present in the payload are written; absent
/// fields keep their stored values.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let existing = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    let mut active: OrderActive = existing.into();
    apply_order_update(&mut active, payload);
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_update",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::ok("Order updated", order_from_entity(order)))
}

/// Sets payment status to "Paid" unconditionally, then applies the same
/// partial-update rule to the remaining fields.
pub async fn mark_order_paid(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let existing = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    let mut active: OrderActive = existing.into();
    apply_order_update(&mut active, payload);
    active.payment_status = Set(PAYMENT_PAID.into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::ok("Payment recorded", order_from_entity(order)))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Orders::delete_many()
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::OrderNotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Order deleted", serde_json::json!({})))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let orders: Vec<Order> = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let total = orders.len() as i64;
    Ok(ApiResponse::paginated(
        "Orders",
        OrderList { items: orders },
        1,
        total,
        total,
    ))
}

/// Orders placed against any product the seller owns.
pub async fn list_seller_orders(
    state: &AppState,
    seller: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let orders: Vec<Order> = Orders::find()
        .join(JoinType::InnerJoin, orders::Relation::Products.def())
        .filter(ProdCol::SellerId.eq(seller.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let total = orders.len() as i64;
    Ok(ApiResponse::paginated(
        "Orders",
        OrderList { items: orders },
        1,
        total,
        total,
    ))
}

fn apply_order_update(active: &mut OrderActive, payload: UpdateOrderRequest) {
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(payment_status) = payload.payment_status {
        active.payment_status = Set(payment_status);
    }
    if let Some(tracking_number) = payload.tracking_number {
        active.tracking_number = Set(Some(tracking_number));
    }
    if let Some(estimated_delivery_date) = payload.estimated_delivery_date {
        active.estimated_delivery_date = Set(Some(estimated_delivery_date.into()));
    }
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        quantity: model.quantity,
        total_price: model.total_price,
        status: model.status,
        payment_status: model.payment_status,
        delivery_address: model.delivery_address,
        payment_method: model.payment_method,
        tracking_number: model.tracking_number,
        estimated_delivery_date: model
            .estimated_delivery_date
            .map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
