use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
};
use tracing::info;

use crate::{
    database::TodoRepository,
    error::{ApiError, Result},
    models::{CreateTodoItem, TodoItem},
};

/// Base path of the to-do resource; also used to build `Location` headers.
pub const TODO_ITEMS_PATH: &str = "/api/TodoItems";

/// List all to-do items
#[utoipa::path(
    get,
    path = "/api/TodoItems",
    tag = "todo-items",
    responses(
        (status = 200, description = "All to-do items ordered by id", body = [TodoItem])
    )
)]
pub async fn list_todo_items(State(repo): State<TodoRepository>) -> Result<Json<Vec<TodoItem>>> {
    Ok(Json(repo.find_all().await?))
}

/// Get a to-do item by id
#[utoipa::path(
    get,
    path = "/api/TodoItems/{id}",
    tag = "todo-items",
    params(("id" = i64, Path, description = "To-do item id")),
    responses(
        (status = 200, description = "The to-do item", body = TodoItem),
        (status = 404, description = "No item with this id")
    )
)]
pub async fn get_todo_item(
    State(repo): State<TodoRepository>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<TodoItem>> {
    let Path(id) = id?;
    repo.find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::TodoNotFound(id))
}

/// Create a to-do item
#[utoipa::path(
    post,
    path = "/api/TodoItems",
    tag = "todo-items",
    request_body = CreateTodoItem,
    responses(
        (status = 201, description = "Item created", body = TodoItem),
        (status = 400, description = "Malformed body"),
        (status = 409, description = "An item with this id already exists")
    )
)]
pub async fn create_todo_item(
    State(repo): State<TodoRepository>,
    payload: std::result::Result<Json<CreateTodoItem>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<TodoItem>)> {
    let Json(request) = payload?;
    let item = repo.create(request).await?;

    info!(id = item.id, "Todo item created");
    let location = format!("{}/{}", TODO_ITEMS_PATH, item.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(item)))
}

/// Replace a to-do item
#[utoipa::path(
    put,
    path = "/api/TodoItems/{id}",
    tag = "todo-items",
    params(("id" = i64, Path, description = "To-do item id")),
    request_body = CreateTodoItem,
    responses(
        (status = 204, description = "Item updated"),
        (status = 400, description = "Body id does not match the path"),
        (status = 404, description = "No item with this id")
    )
)]
pub async fn update_todo_item(
    State(repo): State<TodoRepository>,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<CreateTodoItem>, JsonRejection>,
) -> Result<StatusCode> {
    let Path(id) = id?;
    let Json(request) = payload?;

    if let Some(body_id) = request.requested_id() {
        if body_id != id {
            return Err(ApiError::IdMismatch { path: id, body: body_id });
        }
    }

    if repo.update(id, &request).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::TodoNotFound(id))
    }
}

/// Delete a to-do item
#[utoipa::path(
    delete,
    path = "/api/TodoItems/{id}",
    tag = "todo-items",
    params(("id" = i64, Path, description = "To-do item id")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "No item with this id")
    )
)]
pub async fn delete_todo_item(
    State(repo): State<TodoRepository>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = id?;

    if repo.delete(id).await? {
        info!(id, "Todo item deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::TodoNotFound(id))
    }
}
