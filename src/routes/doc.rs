use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterSellerRequest},
        cart::{AddToCartRequest, CartLineDto, CartView, UpdateCartLineRequest},
        orders::{CheckoutSummary, CreateOrderRequest, OrderList, UpdateOrderRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{PasswordResetRequest, UpdateUserRequest},
    },
    models::{CartItem, Order, Product, Seller, User},
    response::{ApiResponse, PageMeta},
    routes::{auth, cart, health, orders, params, products, sellers, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        users::me,
        users::update_me,
        users::delete_me,
        users::update_password,
        users::my_orders,
        sellers::register,
        sellers::login,
        sellers::seller_orders,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_line,
        cart::delete_cart_line,
        orders::checkout,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::pay_order,
        orders::delete_order
    ),
    components(
        schemas(
            User,
            Seller,
            Product,
            CartItem,
            Order,
            RegisterRequest,
            RegisterSellerRequest,
            LoginRequest,
            LoginResponse,
            UpdateUserRequest,
            PasswordResetRequest,
            CreateProductRequest,
            UpdateProductRequest,
            AddToCartRequest,
            UpdateCartLineRequest,
            CreateOrderRequest,
            UpdateOrderRequest,
            CartLineDto,
            CartView,
            CheckoutSummary,
            OrderList,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            PageMeta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<CheckoutSummary>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Buyer authentication"),
        (name = "Users", description = "Buyer account endpoints"),
        (name = "Sellers", description = "Seller account endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order and checkout endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
