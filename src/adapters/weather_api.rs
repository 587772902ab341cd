//! WeatherAPI.com forecast adapter.
//!
//! `GET {api_base}/forecast.json?key=…&q=<location>&days=3&aqi=no&alerts=no`
//!
//! Mapping of each `forecast.forecastday[].day` object:
//!
//! | DailyWeather   | Provider field                               |
//! |----------------|----------------------------------------------|
//! | `tmax_c`       | `maxtemp_c`                                  |
//! | `tmin_c`       | `mintemp_c`                                  |
//! | `rh_max_pct`   | `avghumidity`                                |
//! | `rh_min_pct`   | `max(0, avghumidity − rh_min_spread_pct)`    |
//! | `wind_10m_ms`  | `maxwind_kph / 3.6` (2 m/s when absent)      |
//! | `rain_flag`    | `daily_will_it_rain == 1`                    |
//! | `precip_mm`    | `totalprecip_mm`                             |
//!
//! The provider only reports a daily mean humidity, so the minimum is
//! derived with a fixed spread.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::agronomy::{DailyWeather, FORECAST_DAYS, Forecast};
use crate::error::WeatherError;

/// Wind speed assumed when the provider omits it (m/s).
pub const DEFAULT_WIND_MS: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    forecast: ForecastBlock,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: NaiveDate,
    day: DayAggregate,
}

#[derive(Debug, Deserialize)]
struct DayAggregate {
    maxtemp_c: f64,
    mintemp_c: f64,
    avghumidity: f64,
    maxwind_kph: Option<f64>,
    #[serde(default)]
    daily_will_it_rain: u8,
    #[serde(default)]
    totalprecip_mm: f64,
}

impl DayAggregate {
    fn to_daily(&self, date: NaiveDate, rh_min_spread_pct: f64) -> DailyWeather {
        DailyWeather {
            date,
            tmax_c: self.maxtemp_c,
            tmin_c: self.mintemp_c,
            rh_max_pct: self.avghumidity,
            rh_min_pct: (self.avghumidity - rh_min_spread_pct).max(0.0),
            wind_10m_ms: self.maxwind_kph.map_or(DEFAULT_WIND_MS, |kph| kph / 3.6),
            rain_flag: self.daily_will_it_rain == 1,
            precip_mm: self.totalprecip_mm,
        }
    }
}

/// Decode a `forecast.json` body into exactly `days` consecutive days.
pub fn parse_forecast(
    body: &str,
    days: usize,
    rh_min_spread_pct: f64,
) -> Result<Forecast, WeatherError> {
    if days > FORECAST_DAYS {
        return Err(WeatherError::HorizonTooLong { requested: days });
    }
    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|_| WeatherError::Malformed)?;
    let entries = response.forecast.forecastday;
    if entries.len() < days {
        return Err(WeatherError::Incomplete { got: entries.len() });
    }

    let mut forecast = Forecast::new();
    for entry in entries.iter().take(days) {
        forecast
            .push(entry.day.to_daily(entry.date, rh_min_spread_pct))
            .map_err(|_| WeatherError::HorizonTooLong { requested: days })?;
    }

    let consecutive = forecast
        .windows(2)
        .all(|w| w[0].date.succ_opt() == Some(w[1].date));
    if !consecutive {
        return Err(WeatherError::Malformed);
    }
    Ok(forecast)
}

#[cfg(feature = "hardware")]
pub use client::WeatherApiClient;

#[cfg(feature = "hardware")]
mod client {
    use std::time::Duration;

    use log::{debug, warn};
    use reqwest::blocking::Client;

    use super::parse_forecast;
    use crate::agronomy::Forecast;
    use crate::app::ports::WeatherSource;
    use crate::config::SystemConfig;
    use crate::error::WeatherError;

    /// Blocking HTTP client for the WeatherAPI.com forecast endpoint.
    pub struct WeatherApiClient {
        client: Client,
        api_base: String,
        api_key: String,
        rh_min_spread_pct: f64,
    }

    impl WeatherApiClient {
        pub fn new(config: &SystemConfig) -> Result<Self, reqwest::Error> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.weather.timeout_secs))
                .build()?;
            Ok(Self {
                client,
                api_base: config.weather.api_base.trim_end_matches('/').to_owned(),
                api_key: config.weather.api_key.clone(),
                rh_min_spread_pct: config.site.rh_min_spread_pct,
            })
        }
    }

    impl WeatherSource for WeatherApiClient {
        fn fetch_forecast(
            &mut self,
            location: &str,
            days: usize,
        ) -> Result<Forecast, WeatherError> {
            let url = format!("{}/forecast.json", self.api_base);
            debug!("GET {} q={} days={}", url, location, days);

            let days_param = days.to_string();
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("q", location),
                    ("days", days_param.as_str()),
                    ("aqi", "no"),
                    ("alerts", "no"),
                ])
                .send()
                .map_err(|e| {
                    warn!("weather request failed: {}", e.without_url());
                    WeatherError::Unreachable
                })?;

            let status = response.status();
            if !status.is_success() {
                warn!("weather provider answered {}", status);
                return Err(WeatherError::HttpStatus(status.as_u16()));
            }

            let body = response.text().map_err(|e| {
                warn!("weather response body unreadable: {}", e.without_url());
                WeatherError::Malformed
            })?;
            parse_forecast(&body, days, self.rh_min_spread_pct)
        }
    }
}
