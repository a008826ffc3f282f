use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use crate::{
    audit,
    dto::users::{PasswordResetRequest, UpdateUserRequest},
    entity::users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::auth_service::hash_password,
    state::AppState,
};

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let model = match model {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };
    Ok(ApiResponse::ok("OK", user_from_entity(model)))
}

/// Partial profile update; absent fields keep their current values.
pub async fn update_account(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone);
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(address) = payload.address {
        active.address = Set(address);
    }

    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::ok("Updated", user_from_entity(updated)))
}

pub async fn update_password(
    state: &AppState,
    user: &AuthUser,
    payload: PasswordResetRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.password.is_empty() {
        return Err(AppError::Validation("password must not be empty".into()));
    }

    let existing = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::UserNotFound),
    };

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.password)?);
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::ok("Password updated", serde_json::json!({})))
}

/// Hard delete of the buyer account. Cart lines and orders cascade away
/// with the row.
pub async fn delete_account(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Users::delete_by_id(user.user_id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::UserNotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::ok("Account deleted", serde_json::json!({})))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        phone: model.phone,
        email: model.email,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
