use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::auth::{
        Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterSellerRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{ROLE_BUYER, ROLE_SELLER},
    models::{Seller, User},
    response::ApiResponse,
};

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    phone: String,
    email: String,
    address: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SellerRow {
    id: Uuid,
    name: String,
    phone: String,
    email: String,
    address: String,
    password_hash: String,
    gstin: String,
    created_at: DateTime<Utc>,
}

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let id = Uuid::new_v4();

    let user: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, phone, email, address, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name.as_str())
    .bind(payload.phone.as_str())
    .bind(payload.email.as_str())
    .bind(payload.address.as_str())
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    audit::record(
        pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::ok("User created", user_from_row(user)))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    verify_password(&payload.password, &user.password_hash)?;
    let token = issue_token(user.id, ROLE_BUYER)?;

    audit::record(
        pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::ok("Logged in", LoginResponse { token }))
}

pub async fn register_seller(
    pool: &DbPool,
    payload: RegisterSellerRequest,
) -> AppResult<ApiResponse<Seller>> {
    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM sellers WHERE email = $1 OR gstin = $2")
            .bind(payload.email.as_str())
            .bind(payload.gstin.as_str())
            .fetch_optional(pool)
            .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest(
            "Email or GSTIN is already registered".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let id = Uuid::new_v4();

    let seller: SellerRow = sqlx::query_as(
        r#"
        INSERT INTO sellers (id, name, phone, email, address, password_hash, gstin)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name.as_str())
    .bind(payload.phone.as_str())
    .bind(payload.email.as_str())
    .bind(payload.address.as_str())
    .bind(password_hash)
    .bind(payload.gstin.as_str())
    .fetch_one(pool)
    .await?;

    audit::record(
        pool,
        Some(seller.id),
        "seller_register",
        "sellers",
        serde_json::json!({ "seller_id": seller.id }),
    )
    .await;

    Ok(ApiResponse::ok("Seller created", seller_from_row(seller)))
}

pub async fn login_seller(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let seller: Option<SellerRow> = sqlx::query_as("SELECT * FROM sellers WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(pool)
        .await?;

    let seller = match seller {
        Some(s) => s,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    verify_password(&payload.password, &seller.password_hash)?;
    let token = issue_token(seller.id, ROLE_SELLER)?;

    audit::record(
        pool,
        Some(seller.id),
        "seller_login",
        "sellers",
        serde_json::json!({ "seller_id": seller.id }),
    )
    .await;

    Ok(ApiResponse::ok("Logged in", LoginResponse { token }))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }
    Ok(())
}

fn issue_token(subject: Uuid, role: &str) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(format!("Bearer {}", token))
}

fn user_from_row(row: UserRow) -> User {
    User {
        id: row.id,
        name: row.name,
        phone: row.phone,
        email: row.email,
        address: row.address,
        created_at: row.created_at,
    }
}

fn seller_from_row(row: SellerRow) -> Seller {
    Seller {
        id: row.id,
        name: row.name,
        phone: row.phone,
        email: row.email,
        address: row.address,
        gstin: row.gstin,
        created_at: row.created_at,
    }
}
