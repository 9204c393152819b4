use axum::Json;

use crate::models::WeatherForecast;

/// Sample forecast for the next few days
#[utoipa::path(
    get,
    path = "/WeatherForecast",
    tag = "weather",
    responses(
        (status = 200, description = "Forecast for the coming days", body = [WeatherForecast])
    )
)]
pub async fn get_weather_forecast() -> Json<Vec<WeatherForecast>> {
    Json(WeatherForecast::sample())
}
