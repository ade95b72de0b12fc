use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        clients::{Column as ClientCol, Entity as Clients},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders,
            Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

/// Create an order for one of the user's clients.
///
/// Every line snapshots the product price at order time; the order total is
/// the sum of the line subtotals. Stock is reserved inside the same
/// transaction as the availability check, so concurrent orders cannot
/// oversell. Any validation failure rolls the whole thing back.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BusinessRule(
            "Order must contain at least one item".into(),
        ));
    }
    for item in &payload.items {
        if item.quantity <= 0 {
            return Err(AppError::BusinessRule(format!(
                "Quantity for product {} must be greater than 0",
                item.product_id
            )));
        }
    }

    let txn = state.orm.begin().await?;

    let client = Clients::find()
        .filter(
            Condition::all()
                .add(ClientCol::Id.eq(payload.client_id))
                .add(ClientCol::UserId.eq(user.user_id)),
        )
        .one(&txn)
        .await?;
    if client.is_none() {
        return Err(AppError::NotFound(
            "Client not found or does not belong to the user".into(),
        ));
    }

    let mut seen: HashSet<Uuid> = HashSet::with_capacity(payload.items.len());
    for item in &payload.items {
        if !seen.insert(item.product_id) {
            return Err(AppError::BusinessRule(format!(
                "Product {} is listed more than once in the order items",
                item.product_id
            )));
        }
    }

    // Lock the product rows until commit so the stock check and the
    // decrement below see the same values under concurrent creation.
    let product_ids: Vec<Uuid> = payload.items.iter().map(|i| i.product_id).collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.clone()))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if products.len() != product_ids.len() {
        let found: HashSet<Uuid> = products.iter().map(|p| p.id).collect();
        let missing: Vec<String> = product_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        return Err(AppError::NotFound(format!(
            "Products not found: {}",
            missing.join(", ")
        )));
    }

    let product_map: HashMap<Uuid, &ProductModel> =
        products.iter().map(|p| (p.id, p)).collect();

    let mut total: i64 = 0;
    let mut lines: Vec<(Uuid, i32, i64, i64)> = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = product_map[&item.product_id];
        if product.stock < item.quantity {
            return Err(AppError::BusinessRule(format!(
                "Insufficient stock for product '{}'. Available: {}, Requested: {}",
                product.name, product.stock, item.quantity
            )));
        }
        let unit_price = product.price;
        let subtotal = unit_price * i64::from(item.quantity);
        total += subtotal;
        lines.push((item.product_id, item.quantity, unit_price, subtotal));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        client_id: Set(payload.client_id),
        status: Set(OrderStatus::Pending.as_str().to_owned()),
        total: Set(total),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (product_id, quantity, unit_price, subtotal) in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            subtotal: Set(subtotal),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        items.push(order_item_from_entity(item));

        // reserve stock
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .filter(ProdCol::Id.eq(product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let order = order_from_entity(order)?;
    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// List the user's orders, newest first, with optional client/status/date
/// filters. The meta carries the total match count for pagination.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(ClientCol::UserId.eq(user.user_id));
    if let Some(client_id) = query.client_id {
        condition = condition.add(OrderCol::ClientId.eq(client_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(start) = query.start_date {
        condition = condition.add(OrderCol::CreatedAt.gte(start));
    }
    if let Some(end) = query.end_date {
        condition = condition.add(OrderCol::CreatedAt.lte(end));
    }

    let finder = Orders::find()
        .join(JoinType::InnerJoin, orders::Relation::Clients.def())
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_owned_order(&state.orm, user, id, false).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let order = order_from_entity(order)?;
    Ok(ApiResponse::success(
        "Ok",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Move an order along the status graph. A request without a target status
/// returns the order unchanged.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let existing = find_owned_order(&txn, user, id, true).await?;

    let Some(requested) = payload.status else {
        txn.commit().await?;
        let order = order_from_entity(existing)?;
        return Ok(ApiResponse::success("Ok", order, Some(Meta::empty())));
    };

    let current = parse_stored_status(&existing.status)?;
    if !current.can_transition_to(requested) {
        let allowed: Vec<&str> = current.allowed_next().iter().map(|s| s.as_str()).collect();
        return Err(AppError::BusinessRule(format!(
            "Invalid transition from '{}' to '{}'. Allowed transitions: [{}]",
            current,
            requested,
            allowed.join(", ")
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(requested.as_str().to_owned());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": updated.id, "status": updated.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let order = order_from_entity(updated)?;
    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

/// Delete an order, allowed only while it is still pending. Items go with it.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let existing = find_owned_order(&txn, user, id, true).await?;

    let current = parse_stored_status(&existing.status)?;
    if current != OrderStatus::Pending {
        return Err(AppError::BusinessRule(format!(
            "Cannot delete an order with status '{current}'. Only pending orders can be deleted."
        )));
    }

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(existing.id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Resolve an order scoped to the requesting user via client ownership.
/// Not-found and not-owned are indistinguishable to the caller.
async fn find_owned_order<C>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
    for_update: bool,
) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    let mut finder = Orders::find()
        .join(JoinType::InnerJoin, orders::Relation::Clients.def())
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(id))
                .add(ClientCol::UserId.eq(user.user_id)),
        );
    if for_update {
        finder = finder.lock(LockType::Update);
    }

    finder
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

fn parse_stored_status(raw: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(raw).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status '{raw}' in storage"))
    })
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = parse_stored_status(&model.status)?;
    Ok(Order {
        id: model.id,
        client_id: model.client_id,
        status,
        total: model.total,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
