//! External facts: weather, public holidays, exchange rates, traffic, economy.
//!
//! [`HttpFactsGateway`] queries OpenWeatherMap and Fixer when the matching API
//! key env var is set, and otherwise answers from built-in Moroccan reference
//! data. Holidays, traffic and economy always come from reference data.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use reqwest::Client;
use rhassistant_shared::{AssistantError, FactsConfig, Result, read_secret_env};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub city: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Percent.
    pub humidity: f64,
    /// Metres per second.
    pub wind_speed: f64,
}

impl WeatherInfo {
    /// Placeholder reported when no weather source answered.
    pub fn unavailable() -> Self {
        Self {
            city: "Rabat".into(),
            temperature: 22.0,
            description: "Données non disponibles".into(),
            humidity: 65.0,
            wind_speed: 10.0,
        }
    }
}

/// A public holiday occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    #[serde(rename = "type")]
    pub holiday_type: String,
}

/// Value in MAD of one unit of each foreign currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRates {
    pub base: String,
    pub date: String,
    pub rates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficInfo {
    pub status: String,
    /// Local time, `HH:MM`.
    pub update_time: String,
    pub main_routes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyInfo {
    pub inflation: String,
    pub growth: String,
    pub unemployment: String,
    pub update_date: String,
}

/// Situational facts used to enrich answers. Each lookup fails independently.
#[async_trait]
pub trait FactsGateway: Send + Sync {
    async fn weather(&self, city: &str) -> Result<WeatherInfo>;

    /// The next `limit` holidays on or after `from`, soonest first.
    async fn holidays(&self, from: NaiveDate, limit: usize) -> Result<Vec<Holiday>>;

    async fn currency_rates(&self) -> Result<CurrencyRates>;

    async fn traffic(&self) -> Result<TrafficInfo>;

    async fn economy(&self) -> Result<EconomyInfo>;
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// (city, temperature, description, humidity)
const REFERENCE_WEATHER: &[(&str, f64, &str, f64)] = &[
    ("Rabat", 22.0, "Ensoleillé", 65.0),
    ("Casablanca", 24.0, "Nuageux", 70.0),
    ("Marrakech", 28.0, "Dégagé", 45.0),
    ("Fès", 25.0, "Partiellement nuageux", 55.0),
    ("Tanger", 23.0, "Brouillard", 80.0),
];

const REFERENCE_WIND_SPEED: f64 = 10.0;

/// Fixed-date Moroccan public holidays: (month, day, name, type).
const HOLIDAY_CALENDAR: &[(u32, u32, &str, &str)] = &[
    (1, 1, "Nouvel An", "national"),
    (1, 11, "Manifeste de l'Indépendance", "national"),
    (5, 1, "Fête du Travail", "international"),
    (7, 30, "Fête du Trône", "national"),
    (8, 14, "Oued Ed-Dahab", "national"),
    (8, 20, "Révolution du Roi et du Peuple", "national"),
    (8, 21, "Fête de la Jeunesse", "national"),
    (11, 6, "Marche Verte", "national"),
    (11, 18, "Fête de l'Indépendance", "national"),
];

const REFERENCE_RATES: &[(&str, f64)] = &[
    ("EUR", 10.85),
    ("USD", 9.95),
    ("GBP", 12.45),
    ("JPY", 0.067),
    ("CHF", 11.20),
];

const MAIN_ROUTES: &[&str] = &["A1: Rabat-Casablanca", "A2: Rabat-Fès", "A3: Rabat-Tanger"];

fn reference_weather(city: &str) -> WeatherInfo {
    let (name, temperature, description, humidity) = REFERENCE_WEATHER
        .iter()
        .find(|(name, ..)| name.eq_ignore_ascii_case(city))
        .copied()
        .unwrap_or(REFERENCE_WEATHER[0]);
    WeatherInfo {
        city: name.into(),
        temperature,
        description: description.into(),
        humidity,
        wind_speed: REFERENCE_WIND_SPEED,
    }
}

/// Project each calendar entry onto its next occurrence on or after `from`.
pub(crate) fn upcoming_holidays(from: NaiveDate, limit: usize) -> Vec<Holiday> {
    let mut upcoming: Vec<Holiday> = HOLIDAY_CALENDAR
        .iter()
        .filter_map(|&(month, day, name, holiday_type)| {
            let this_year = NaiveDate::from_ymd_opt(from.year(), month, day)?;
            let date = if this_year >= from {
                this_year
            } else {
                NaiveDate::from_ymd_opt(from.year() + 1, month, day)?
            };
            Some(Holiday {
                date,
                name: name.into(),
                holiday_type: holiday_type.into(),
            })
        })
        .collect();
    upcoming.sort_by_key(|h| h.date);
    upcoming.truncate(limit);
    upcoming
}

fn reference_rates() -> CurrencyRates {
    CurrencyRates {
        base: "MAD".into(),
        date: Local::now().format("%Y-%m-%d").to_string(),
        rates: REFERENCE_RATES
            .iter()
            .map(|(code, rate)| ((*code).to_string(), *rate))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// HTTP gateway
// ---------------------------------------------------------------------------

/// Facts gateway backed by public APIs with reference-data fallback.
pub struct HttpFactsGateway {
    client: Client,
    weather_base_url: String,
    currency_base_url: String,
    weather_api_key: Option<String>,
    currency_api_key: Option<String>,
}

impl HttpFactsGateway {
    pub fn new(
        config: &FactsConfig,
        weather_api_key: Option<String>,
        currency_api_key: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: crate::build_client(config.timeout_secs)?,
            weather_base_url: crate::parse_base_url(&config.weather_base_url)?,
            currency_base_url: crate::parse_base_url(&config.currency_base_url)?,
            weather_api_key,
            currency_api_key,
        })
    }

    /// Build from config, reading API keys from the configured env vars.
    pub fn from_config(config: &FactsConfig) -> Result<Self> {
        let weather_key = read_secret_env(&config.weather_api_key_env);
        let currency_key = read_secret_env(&config.currency_api_key_env);
        if weather_key.is_none() {
            debug!(var = %config.weather_api_key_env, "no weather API key, using reference data");
        }
        if currency_key.is_none() {
            debug!(var = %config.currency_api_key_env, "no currency API key, using reference data");
        }
        Self::new(config, weather_key, currency_key)
    }

    async fn fetch_weather(&self, city: &str, api_key: &str) -> Result<WeatherInfo> {
        #[derive(Deserialize)]
        struct OwmResponse {
            main: OwmMain,
            weather: Vec<OwmWeather>,
            #[serde(default)]
            wind: OwmWind,
        }
        #[derive(Deserialize)]
        struct OwmMain {
            temp: f64,
            humidity: f64,
        }
        #[derive(Deserialize)]
        struct OwmWeather {
            description: String,
        }
        #[derive(Deserialize, Default)]
        struct OwmWind {
            #[serde(default)]
            speed: f64,
        }

        let url = format!("{}/data/2.5/weather", self.weather_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", api_key),
                ("units", "metric"),
                ("lang", "fr"),
            ])
            .send()
            .await
            .map_err(|e| AssistantError::Upstream(format!("weather request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AssistantError::Upstream(format!(
                "weather service returned HTTP {}",
                response.status()
            )));
        }

        let body: OwmResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Upstream(format!("malformed weather response: {e}")))?;

        let description = body
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| AssistantError::Upstream("weather response has no conditions".into()))?;

        Ok(WeatherInfo {
            city: city.to_string(),
            temperature: body.main.temp.round(),
            description,
            humidity: body.main.humidity,
            wind_speed: body.wind.speed,
        })
    }

    async fn fetch_rates(&self, api_key: &str) -> Result<CurrencyRates> {
        #[derive(Deserialize)]
        struct FixerResponse {
            success: bool,
            #[serde(default)]
            date: Option<String>,
            #[serde(default)]
            rates: BTreeMap<String, f64>,
        }

        let symbols = REFERENCE_RATES
            .iter()
            .map(|(code, _)| *code)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/api/latest", self.currency_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_key", api_key),
                ("base", "MAD"),
                ("symbols", symbols.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AssistantError::Upstream(format!("currency request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AssistantError::Upstream(format!(
                "currency service returned HTTP {}",
                response.status()
            )));
        }

        let body: FixerResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Upstream(format!("malformed currency response: {e}")))?;

        if !body.success {
            return Err(AssistantError::Upstream(
                "currency service reported failure".into(),
            ));
        }

        Ok(CurrencyRates {
            base: "MAD".into(),
            date: body
                .date
                .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string()),
            // Fixer quotes foreign units per MAD
            rates: body
                .rates
                .into_iter()
                .filter(|(_, rate)| *rate > 0.0)
                .map(|(code, rate)| (code, 1.0 / rate))
                .collect(),
        })
    }
}

#[async_trait]
impl FactsGateway for HttpFactsGateway {
    #[instrument(skip(self))]
    async fn weather(&self, city: &str) -> Result<WeatherInfo> {
        match &self.weather_api_key {
            Some(key) => self.fetch_weather(city, key).await,
            None => Ok(reference_weather(city)),
        }
    }

    async fn holidays(&self, from: NaiveDate, limit: usize) -> Result<Vec<Holiday>> {
        Ok(upcoming_holidays(from, limit))
    }

    #[instrument(skip(self))]
    async fn currency_rates(&self) -> Result<CurrencyRates> {
        match &self.currency_api_key {
            Some(key) => self.fetch_rates(key).await,
            None => Ok(reference_rates()),
        }
    }

    async fn traffic(&self) -> Result<TrafficInfo> {
        Ok(TrafficInfo {
            status: "Fluide".into(),
            update_time: Local::now().format("%H:%M").to_string(),
            main_routes: MAIN_ROUTES.iter().map(|r| (*r).to_string()).collect(),
        })
    }

    async fn economy(&self) -> Result<EconomyInfo> {
        Ok(EconomyInfo {
            inflation: "2.1%".into(),
            growth: "3.2%".into(),
            unemployment: "11.8%".into(),
            update_date: "2024".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> FactsConfig {
        FactsConfig {
            weather_base_url: server.uri(),
            currency_base_url: server.uri(),
            ..FactsConfig::default()
        }
    }

    fn offline() -> HttpFactsGateway {
        HttpFactsGateway::new(&FactsConfig::default(), None, None).unwrap()
    }

    #[tokio::test]
    async fn reference_weather_by_city() {
        let gateway = offline();
        let weather = gateway.weather("Marrakech").await.unwrap();
        assert_eq!(weather.temperature, 28.0);
        assert_eq!(weather.description, "Dégagé");

        // Unknown cities fall back to Rabat
        let weather = gateway.weather("Oujda").await.unwrap();
        assert_eq!(weather.city, "Rabat");
    }

    #[test]
    fn holidays_roll_over_to_next_year() {
        let from = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let holidays = upcoming_holidays(from, 5);
        assert_eq!(holidays.len(), 5);
        assert_eq!(holidays[0].name, "Fête de l'Indépendance");
        assert_eq!(holidays[0].date, NaiveDate::from_ymd_opt(2025, 11, 18).unwrap());
        assert_eq!(holidays[1].name, "Nouvel An");
        assert_eq!(holidays[1].date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(holidays.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn holiday_on_the_day_counts_as_upcoming() {
        let from = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let holidays = upcoming_holidays(from, 1);
        assert_eq!(holidays[0].name, "Fête du Travail");
    }

    #[tokio::test]
    async fn reference_rates_are_mad_based() {
        let rates = offline().currency_rates().await.unwrap();
        assert_eq!(rates.base, "MAD");
        assert_eq!(rates.rates.get("EUR"), Some(&10.85));
        assert_eq!(rates.rates.len(), 5);
    }

    #[tokio::test]
    async fn live_weather_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Rabat"))
            .and(query_param("units", "metric"))
            .and(query_param("lang", "fr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "main": {"temp": 19.6, "humidity": 72},
                "weather": [{"description": "ciel dégagé"}],
                "wind": {"speed": 4.1}
            })))
            .mount(&server)
            .await;

        let gateway =
            HttpFactsGateway::new(&config_for(&server), Some("owm-key".into()), None).unwrap();
        let weather = gateway.weather("Rabat").await.unwrap();
        assert_eq!(weather.temperature, 20.0);
        assert_eq!(weather.description, "ciel dégagé");
        assert_eq!(weather.wind_speed, 4.1);
    }

    #[tokio::test]
    async fn live_weather_failure_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gateway =
            HttpFactsGateway::new(&config_for(&server), Some("bad-key".into()), None).unwrap();
        let err = gateway.weather("Rabat").await.unwrap_err();
        assert!(matches!(err, AssistantError::Upstream(_)));
    }

    #[tokio::test]
    async fn live_rates_reject_unsuccessful_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .and(query_param("base", "MAD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": {"code": 105}
            })))
            .mount(&server)
            .await;

        let gateway =
            HttpFactsGateway::new(&config_for(&server), None, Some("fixer-key".into())).unwrap();
        assert!(gateway.currency_rates().await.is_err());
    }

    #[tokio::test]
    async fn live_rates_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "date": "2025-03-14",
                "rates": {"EUR": 0.092, "USD": 0.5}
            })))
            .mount(&server)
            .await;

        let gateway =
            HttpFactsGateway::new(&config_for(&server), None, Some("fixer-key".into())).unwrap();
        let rates = gateway.currency_rates().await.unwrap();
        assert_eq!(rates.date, "2025-03-14");
        assert_eq!(rates.rates.get("USD"), Some(&2.0));
    }
}
