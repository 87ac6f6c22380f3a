//! Context enrichment: situational facts attached to an answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Local;
use rhassistant_gateways::{FactsGateway, WeatherInfo};
use rhassistant_shared::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::intent::{self, FactCategory};

/// Number of upcoming holidays reported.
const HOLIDAY_LIMIT: usize = 5;

/// Fetches the facts a query's intents call for.
///
/// Every lookup is independent and best-effort. A failed weather lookup is
/// replaced by [`WeatherInfo::unavailable`]; any other failed category is left
/// out. Nothing is retried.
pub struct Enricher {
    facts: Arc<dyn FactsGateway>,
    city: String,
}

impl Enricher {
    pub fn new(facts: Arc<dyn FactsGateway>, city: impl Into<String>) -> Self {
        Self {
            facts,
            city: city.into(),
        }
    }

    pub async fn enrich(&self, query: &str) -> BTreeMap<String, Value> {
        let mut info = BTreeMap::new();

        for category in intent::facts_for(query) {
            let fetched = match category {
                FactCategory::Weather => match self.facts.weather(&self.city).await {
                    Ok(weather) => to_value(weather),
                    Err(e) => {
                        warn!(error = %e, "weather lookup failed, using placeholder");
                        to_value(WeatherInfo::unavailable())
                    }
                },
                FactCategory::Holidays => {
                    let today = Local::now().date_naive();
                    to_value_or_skip(category, self.facts.holidays(today, HOLIDAY_LIMIT).await)
                }
                FactCategory::Currency => {
                    to_value_or_skip(category, self.facts.currency_rates().await)
                }
                FactCategory::Traffic => to_value_or_skip(category, self.facts.traffic().await),
                FactCategory::Economy => to_value_or_skip(category, self.facts.economy().await),
            };

            if let Some(value) = fetched {
                info.insert(category.as_str().to_string(), value);
            }
        }

        debug!(categories = info.len(), "enrichment done");
        info
    }
}

fn to_value<T: Serialize>(data: T) -> Option<Value> {
    serde_json::to_value(data)
        .map_err(|e| warn!(error = %e, "unserializable enrichment payload"))
        .ok()
}

fn to_value_or_skip<T: Serialize>(category: FactCategory, fetched: Result<T>) -> Option<Value> {
    match fetched {
        Ok(data) => to_value(data),
        Err(e) => {
            warn!(category = category.as_str(), error = %e, "fact lookup failed, omitting");
            None
        }
    }
}
