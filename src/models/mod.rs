// Data models and DTOs

pub mod todo;
pub mod weather;

pub use todo::{CreateTodoItem, TodoItem};
pub use weather::{FORECAST_DAYS, WeatherForecast};
