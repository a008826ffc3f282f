use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterSellerRequest},
        orders::OrderList,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_seller},
    models::Seller,
    response::ApiResponse,
    services::{auth_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me/orders", get(seller_orders))
}

#[utoipa::path(
    post,
    path = "/api/sellers/register",
    request_body = RegisterSellerRequest,
    responses(
        (status = 201, description = "Register seller account", body = ApiResponse<Seller>)
    ),
    tag = "Sellers"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterSellerRequest>,
) -> AppResult<Json<ApiResponse<Seller>>> {
    let resp = auth_service::register_seller(&state.pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/sellers/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login seller", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Sellers"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_seller(&state.pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sellers/me/orders",
    responses(
        (status = 200, description = "Orders on the seller's products", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Sellers"
)]
pub async fn seller_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_seller(&user)?;
    let resp = order_service::list_seller_orders(&state, &user).await?;
    Ok(Json(resp))
}
