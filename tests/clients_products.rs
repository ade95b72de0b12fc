use axum_orders_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        clients::{CreateClientRequest, UpdateClientRequest},
        orders::{CreateOrderRequest, OrderItemRequest},
        products::CreateProductRequest,
    },
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    services::{client_service, order_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Catalog rules: unique emails and names, soft deactivation, and the
// restrict-delete behavior once orders reference a record.
#[tokio::test]
async fn client_and_product_rules_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "owner@example.com").await?;
    let user = AuthUser { user_id };

    // A client email can only be registered once.
    let alpha = client_service::create_client(
        &state,
        &user,
        CreateClientRequest {
            name: "Alpha".into(),
            email: "alpha@example.com".into(),
            phone: Some("555-0100".into()),
            address: None,
        },
    )
    .await?
    .data
    .unwrap();
    let err = client_service::create_client(
        &state,
        &user,
        CreateClientRequest {
            name: "Alpha Again".into(),
            email: "alpha@example.com".into(),
            phone: None,
            address: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // Updates cannot steal another client's email either.
    let beta = client_service::create_client(
        &state,
        &user,
        CreateClientRequest {
            name: "Beta".into(),
            email: "beta@example.com".into(),
            phone: None,
            address: None,
        },
    )
    .await?
    .data
    .unwrap();
    let err = client_service::update_client(
        &state,
        &user,
        beta.id,
        UpdateClientRequest {
            name: None,
            email: Some("alpha@example.com".into()),
            phone: None,
            address: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // Deactivation is a soft delete: the record stays but leaves the listing.
    let deactivated = client_service::deactivate_client(&state, &user, beta.id)
        .await?
        .data
        .unwrap();
    assert!(!deactivated.active);
    let listing = client_service::list_clients(
        &state,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(listing.items.iter().all(|c| c.id != beta.id));
    assert!(listing.items.iter().any(|c| c.id == alpha.id));

    // Product names are unique; price and stock are validated.
    let widget = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "Widget".into(),
            description: Some("A test widget".into()),
            price: 1000,
            stock: 5,
        },
    )
    .await?
    .data
    .unwrap();
    let err = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "Widget".into(),
            description: None,
            price: 500,
            stock: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    let err = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "Freebie".into(),
            description: None,
            price: 0,
            stock: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    let err = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "Phantom".into(),
            description: None,
            price: 100,
            stock: -1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // Once an order references them, neither product nor client can be removed.
    order_service::create_order(
        &state,
        &user,
        CreateOrderRequest {
            client_id: alpha.id,
            items: vec![OrderItemRequest {
                product_id: widget.id,
                quantity: 1,
            }],
        },
    )
    .await?;
    let err = product_service::delete_product(&state, &user, widget.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    let err = client_service::delete_client(&state, &user, alpha.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // An unreferenced product can be removed for good.
    let spare = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "Spare".into(),
            description: None,
            price: 100,
            stock: 1,
        },
    )
    .await?
    .data
    .unwrap();
    product_service::delete_product(&state, &user, spare.id).await?;
    let err = product_service::get_product(&state, spare.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // A client with no orders can be removed as well.
    client_service::delete_client(&state, &user, beta.id).await?;
    let err = client_service::get_client(&state, beta.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, clients, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
