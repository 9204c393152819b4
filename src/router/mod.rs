//! Router configuration.
//!
//! Route paths keep the casing clients of the to-do service already use
//! (`/WeatherForecast`, `/api/TodoItems`).

use axum::{Router, routing::get};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;
use crate::handlers::{health, todo_items, weather_forecast};
use crate::middleware::request_logger_middleware;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "Todo API", version = "1.0.0"),
    paths(
        health::health_check,
        weather_forecast::get_weather_forecast,
        todo_items::list_todo_items,
        todo_items::get_todo_item,
        todo_items::create_todo_item,
        todo_items::update_todo_item,
        todo_items::delete_todo_item,
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "weather", description = "Sample forecast"),
        (name = "todo-items", description = "To-do item resource")
    )
)]
pub struct ApiDoc;

/// Build the application router.
pub fn build_router(app_state: AppState) -> Router {
    let request_timeout = Duration::from_secs(app_state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/WeatherForecast", get(weather_forecast::get_weather_forecast))
        .route(
            "/api/TodoItems",
            get(todo_items::list_todo_items).post(todo_items::create_todo_item),
        )
        .route(
            "/api/TodoItems/{id}",
            get(todo_items::get_todo_item)
                .put(todo_items::update_todo_item)
                .delete(todo_items::delete_todo_item),
        )
        .merge(SwaggerUi::new("/swagger").url("/swagger/v1/swagger.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_logger_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    axum::http::StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
