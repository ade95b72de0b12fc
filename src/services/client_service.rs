use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::clients::{ClientList, CreateClientRequest, UpdateClientRequest},
    entity::{
        clients::{
            ActiveModel as ClientActive, Column as ClientCol, Entity as Clients,
            Model as ClientModel,
        },
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Client,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Active clients only; deactivated ones drop out of the listing.
pub async fn list_clients(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ClientList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Clients::find()
        .filter(ClientCol::Active.eq(true))
        .order_by_desc(ClientCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(client_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Clients", ClientList { items }, Some(meta)))
}

pub async fn get_client(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Client>> {
    let client = Clients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".into()))?;

    Ok(ApiResponse::success(
        "Client",
        client_from_entity(client),
        None,
    ))
}

pub async fn create_client(
    state: &AppState,
    user: &AuthUser,
    payload: CreateClientRequest,
) -> AppResult<ApiResponse<Client>> {
    let existing = Clients::find()
        .filter(ClientCol::Email.eq(payload.email.clone()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BusinessRule(
            "Email already registered for another client".into(),
        ));
    }

    let client = ClientActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(payload.name),
        email: Set(payload.email),
        phone: Set(payload.phone),
        address: Set(payload.address),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_create",
        Some("clients"),
        Some(serde_json::json!({ "client_id": client.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Client created",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

pub async fn update_client(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateClientRequest,
) -> AppResult<ApiResponse<Client>> {
    let existing = Clients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".into()))?;

    if let Some(email) = payload.email.as_ref().filter(|e| **e != existing.email) {
        let taken = Clients::find()
            .filter(
                Condition::all()
                    .add(ClientCol::Email.eq(email.clone()))
                    .add(ClientCol::Id.ne(id)),
            )
            .one(&state.orm)
            .await?;
        if taken.is_some() {
            return Err(AppError::BusinessRule(
                "Email already registered for another client".into(),
            ));
        }
    }

    let mut active: ClientActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }

    let client = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_update",
        Some("clients"),
        Some(serde_json::json!({ "client_id": client.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

/// Physical removal. A client that has orders is kept (the order history
/// references it); use deactivation instead.
pub async fn delete_client(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let order_count = Orders::find()
        .filter(OrderCol::ClientId.eq(id))
        .count(&state.orm)
        .await?;
    if order_count > 0 {
        return Err(AppError::BusinessRule(
            "Client has orders and cannot be removed".into(),
        ));
    }

    let result = Clients::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Client not found".into()));
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_delete",
        Some("clients"),
        Some(serde_json::json!({ "client_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Soft delete: flips active to false, keeping the record.
pub async fn deactivate_client(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Client>> {
    let existing = Clients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".into()))?;

    let mut active: ClientActive = existing.into();
    active.active = Set(false);
    let client = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_deactivate",
        Some("clients"),
        Some(serde_json::json!({ "client_id": client.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Client deactivated",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

fn client_from_entity(model: ClientModel) -> Client {
    Client {
        id: model.id,
        user_id: model.user_id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        active: model.active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
