use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::clients::{ClientList, CreateClientRequest, UpdateClientRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Client,
    response::ApiResponse,
    routes::params::Pagination,
    services::client_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route(
            "/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/{id}/deactivate", patch(deactivate_client))
}

#[utoipa::path(
    get,
    path = "/api/clients",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20, max 200")
    ),
    responses(
        (status = 200, description = "List active clients", body = ApiResponse<ClientList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ClientList>>> {
    let resp = client_service::list_clients(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    params(
        ("id" = Uuid, Path, description = "Client ID")
    ),
    responses(
        (status = 200, description = "Get client", body = ApiResponse<Client>),
        (status = 404, description = "Client not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::get_client(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Create client", body = ApiResponse<Client>),
        (status = 400, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::create_client(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    params(
        ("id" = Uuid, Path, description = "Client ID")
    ),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Updated client", body = ApiResponse<Client>),
        (status = 404, description = "Client not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::update_client(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    params(
        ("id" = Uuid, Path, description = "Client ID")
    ),
    responses(
        (status = 200, description = "Deleted client"),
        (status = 400, description = "Client has orders"),
        (status = 404, description = "Client not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = client_service::delete_client(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/clients/{id}/deactivate",
    params(
        ("id" = Uuid, Path, description = "Client ID")
    ),
    responses(
        (status = 200, description = "Deactivated client", body = ApiResponse<Client>),
        (status = 404, description = "Client not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clients"
)]
pub async fn deactivate_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::deactivate_client(&state, &user, id).await?;
    Ok(Json(resp))
}
