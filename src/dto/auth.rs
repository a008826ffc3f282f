use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterSellerRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub password: String,
    pub gstin: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
