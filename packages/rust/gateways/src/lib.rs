//! Clients for the services the assistant calls out to.
//!
//! Each gateway is an `async_trait` so the pipeline can run against test
//! doubles. Every failure surfaces as [`AssistantError::Upstream`]; deciding
//! how to degrade is the caller's job.
//!
//! [`AssistantError::Upstream`]: rhassistant_shared::AssistantError::Upstream

mod facts;
mod llm;

use std::time::Duration;

use reqwest::Client;
use rhassistant_shared::{AssistantError, Result};
use url::Url;

pub use facts::{
    CurrencyRates, EconomyInfo, FactsGateway, Holiday, HttpFactsGateway, TrafficInfo, WeatherInfo,
};
pub use llm::{APOLOGY_TEXT, LlmGateway, OpenAiLlm};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("rhassistant/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the given request timeout.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AssistantError::config(format!("failed to build HTTP client: {e}")))
}

/// Parse a configured API root, dropping any trailing slash.
fn parse_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw)
        .map_err(|e| AssistantError::config(format!("invalid base URL '{raw}': {e}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(
            parse_base_url("https://api.openai.com/v1/").unwrap(),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            parse_base_url("http://api.openweathermap.org").unwrap(),
            "http://api.openweathermap.org"
        );
    }

    #[test]
    fn garbage_base_url_is_config_error() {
        let err = parse_base_url("not a url").unwrap_err();
        assert!(matches!(err, AssistantError::Config { .. }));
    }
}
