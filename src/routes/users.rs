use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};

use crate::{
    dto::{
        orders::OrderList,
        users::{PasswordResetRequest, UpdateUserRequest},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_buyer},
    models::User,
    response::ApiResponse,
    services::{order_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update_me).delete(delete_me))
        .route("/me/password", put(update_password))
        .route("/me/orders", get(my_orders))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current buyer profile", body = ApiResponse<User>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    ensure_buyer(&user)?;
    let resp = user_service::get_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse<User>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    ensure_buyer(&user)?;
    let resp = user_service::update_account(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Account deleted", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_buyer(&user)?;
    let resp = user_service::delete_account(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/me/password",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Password updated", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PasswordResetRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_buyer(&user)?;
    let resp = user_service::update_password(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/me/orders",
    responses(
        (status = 200, description = "Orders placed by the current buyer", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_buyer(&user)?;
    let resp = order_service::list_my_orders(&state, &user).await?;
    Ok(Json(resp))
}
