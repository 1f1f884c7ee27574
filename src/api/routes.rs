//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, OrderStatus, Project, User};
use crate::domain::{OrderItem, UserChanges};
use crate::error::AppError;
use crate::handlers::{
    AddItemCommand, CreateOrderCommand, CreateProjectCommand, CreateUserCommand,
    UpdateProjectCommand, UpdateUserCommand,
};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            display_name: user.display_name().map(str::to_string),
            version: user.version(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Partial project update; `"description": null` clears the description
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
}

/// Tell a field set to null apart from a missing one
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct AddWorkerRequest {
    pub worker_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub workers: Vec<Uuid>,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Project> for ProjectResponse {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id(),
            name: project.name().to_string(),
            description: project.description().map(str::to_string),
            owner_id: project.owner_id(),
            workers: project.workers().to_vec(),
            version: project.version(),
            created_at: project.created_at(),
            updated_at: project.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl From<OrderItemRequest> for OrderItem {
    fn from(request: OrderItemRequest) -> Self {
        OrderItem::new(request.product_id, request.quantity, request.unit_price)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub customer_id: Uuid,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total: Decimal,
    pub cancellation_reason: Option<String>,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer_id: order.customer_id(),
            status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total(),
                })
                .collect(),
            total: order.total(),
            cancellation_reason: order.cancellation_reason().map(str::to_string),
            version: order.version(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// Id chosen by the client, or a fresh one
fn new_id(requested: Option<Uuid>, field: &str) -> Result<Uuid, AppError> {
    match requested {
        Some(id) if id.is_nil() => Err(AppError::InvalidRequest(format!("{} must not be nil", field))),
        Some(id) => Ok(id),
        None => Ok(Uuid::new_v4()),
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users", post(create_user))
        .route(
            "/users/:user_id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:user_id/projects", get(list_user_projects))
        // Projects
        .route("/projects", post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:project_id/workers", post(add_worker))
        .route(
            "/projects/:project_id/workers/:worker_id",
            delete(remove_worker),
        )
        // Orders
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order).delete(delete_order))
        .route("/orders/:order_id/items", post(add_order_item))
        .route(
            "/orders/:order_id/items/:product_id",
            delete(remove_order_item),
        )
        .route("/orders/:order_id/confirm", post(confirm_order))
        .route("/orders/:order_id/ship", post(ship_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
}

// =========================================================================
// Users
// =========================================================================

/// Create a new user
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user_id = new_id(request.user_id, "user_id")?;
    let command = CreateUserCommand::new(user_id, request.username, request.email);
    let command = if let Some(display_name) = request.display_name {
        command.with_display_name(display_name)
    } else {
        command
    };

    let user = state.users.create(command).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get(user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let changes = UserChanges {
        display_name: request.display_name,
        email: request.email,
    };

    let user = state
        .users
        .update(UpdateUserCommand::new(user_id, changes))
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// Soft delete; the user's projects are cleaned up by the event bus
async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.users.delete(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_user_projects(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ProjectResponse>>, AppError> {
    let projects = state.projects.list_for_user(user_id).await?;
    Ok(Json(projects.iter().map(ProjectResponse::from).collect()))
}

// =========================================================================
// Projects
// =========================================================================

async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let project_id = new_id(request.project_id, "project_id")?;
    let command = CreateProjectCommand::new(project_id, request.name, request.owner_id);
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let project = state.projects.create(command).await?;

    Ok((StatusCode::CREATED, Json(ProjectResponse::from(&project))))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = state.projects.get(project_id).await?;
    Ok(Json(ProjectResponse::from(&project)))
}

async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    let mut command = UpdateProjectCommand::new(project_id);
    if let Some(name) = request.name {
        command = command.rename(name);
    }
    if let Some(description) = request.description {
        command = command.describe(description);
    }

    let project = state.projects.update(command).await?;
    Ok(Json(ProjectResponse::from(&project)))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.projects.delete(project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_worker(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<AddWorkerRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = state
        .projects
        .add_worker(project_id, request.worker_id)
        .await?;
    Ok(Json(ProjectResponse::from(&project)))
}

async fn remove_worker(
    State(state): State<AppState>,
    Path((project_id, worker_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = state.projects.remove_worker(project_id, worker_id).await?;
    Ok(Json(ProjectResponse::from(&project)))
}

// =========================================================================
// Orders
// =========================================================================

async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let command = CreateOrderCommand {
        order_id: new_id(request.order_id, "order_id")?,
        customer_id: request.customer_id,
        items: request.items.into_iter().map(OrderItem::from).collect(),
    };

    let order = state.orders.create(command).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.get(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.orders.delete(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_order_item(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<OrderItemRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let command = AddItemCommand::new(
        order_id,
        request.product_id,
        request.quantity,
        request.unit_price,
    );

    let order = state.orders.add_item(command).await?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn remove_order_item(
    State(state): State<AppState>,
    Path((order_id, product_id)): Path<(Uuid, String)>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.remove_item(order_id, &product_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn confirm_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.confirm(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.ship(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// Cancel with an optional `{"reason": "..."}` body
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    request: Option<Json<CancelOrderRequest>>,
) -> Result<Json<OrderResponse>, AppError> {
    let reason = request.and_then(|Json(request)| request.reason);

    let order = state.orders.cancel(order_id, reason).await?;
    Ok(Json(OrderResponse::from(&order)))
}
