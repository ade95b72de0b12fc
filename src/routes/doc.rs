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
        clients::{ClientList, CreateClientRequest, UpdateClientRequest},
        orders::{
            CreateOrderRequest, OrderItemRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{Client, Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, clients, health, orders, params, products},
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
        clients::list_clients,
        clients::get_client,
        clients::create_client,
        clients::update_client,
        clients::delete_client,
        clients::deactivate_client,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::get_order,
        orders::create_order,
        orders::update_order_status,
        orders::delete_order
    ),
    components(
        schemas(
            User,
            Client,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            CreateClientRequest,
            UpdateClientRequest,
            ClientList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Client>,
            ApiResponse<Product>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Clients", description = "Client endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
