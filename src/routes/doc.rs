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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        orders::{OrderList, OrderRequest, UpdateOrderStatusRequest},
        payments::{ConfirmPaymentRequest, ConfirmPaymentResponse, InitiatePaymentResponse},
        products::{ProductList, UpsertProductRequest},
    },
    models::{DeliveryOption, Order, OrderItem, OrderStatus, Product, ShippingInfo, User},
    response::{ApiResponse, Meta},
    routes::{auth, health, orders, payments, products},
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
        auth::me,
        products::list_products,
        products::get_product,
        products::upsert_product,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order,
        payments::initiate_payment,
        payments::confirm_payment
    ),
    components(
        schemas(
            User,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            DeliveryOption,
            ShippingInfo,
            OrderRequest,
            OrderList,
            UpdateOrderStatusRequest,
            InitiatePaymentResponse,
            ConfirmPaymentRequest,
            ConfirmPaymentResponse,
            ProductList,
            UpsertProductRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            health::HealthData,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<InitiatePaymentResponse>,
            ApiResponse<ConfirmPaymentResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Orders", description = "Checkout and order management"),
        (name = "Payments", description = "Two-phase payment sessions"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
