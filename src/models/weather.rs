use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of forecasts returned by the sample generator.
pub const FORECAST_DAYS: usize = 5;

const SUMMARIES: [&str; 10] = [
    "Freezing", "Bracing", "Chilly", "Cool", "Mild", "Warm", "Balmy", "Hot", "Sweltering",
    "Scorching",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub summary: Option<String>,
}

impl WeatherForecast {
    pub fn new(date: NaiveDate, temperature_c: i32, summary: Option<String>) -> Self {
        Self {
            date,
            temperature_c,
            temperature_f: fahrenheit(temperature_c),
            summary,
        }
    }

    /// Random forecasts for the `days` days following `today`.
    pub fn sample_from<R: Rng + ?Sized>(today: NaiveDate, days: usize, rng: &mut R) -> Vec<Self> {
        (1..=days as u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .map(|date| {
                let summary = SUMMARIES[rng.gen_range(0..SUMMARIES.len())];
                WeatherForecast::new(date, rng.gen_range(-20..55), Some(summary.to_string()))
            })
            .collect()
    }

    /// The stub forecast served by `GET /WeatherForecast`.
    pub fn sample() -> Vec<Self> {
        Self::sample_from(Utc::now().date_naive(), FORECAST_DAYS, &mut rand::thread_rng())
    }
}

fn fahrenheit(celsius: i32) -> i32 {
    32 + (celsius as f64 / 0.5556) as i32
}
