mod common;

use anyhow::Result;
use todo_api::harness::Scenario;
use todo_api::models::WeatherForecast;

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_weather_forecast_returns_five_entries() -> Result<()> {
    let mut harness = common::harness();

    let forecasts = harness
        .run(|env| async move {
            env.run_scenario(&Scenario::get("/WeatherForecast"))
                .await?
                .json::<Vec<WeatherForecast>>()
        })
        .await?;

    assert_eq!(forecasts.len(), 5);
    for forecast in &forecasts {
        assert!((-20..55).contains(&forecast.temperature_c));
        assert!(forecast.summary.is_some());
    }
    Ok(())
}
