pub mod health;
pub mod todo_items;
pub mod weather_forecast;
