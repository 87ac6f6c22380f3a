//! Response composition: retrieval + enrichment → answer text and sources.
//!
//! Pure and infallible. Missing or malformed data degrades to default text.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rhassistant_gateways::{CurrencyRates, EconomyInfo, Holiday, TrafficInfo, WeatherInfo};
use rhassistant_shared::{ComposedResponse, KnowledgeItem, KnowledgePayload, RetrievalResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::intent::{self, FactCategory};

/// Provenance of the generic templated answers.
pub const FALLBACK_SOURCE: &str = "Base de connaissances CDG";

/// Maximum characters of source content quoted in a summary.
const EXCERPT_CHARS: usize = 300;

/// Holidays listed in the enrichment sentence.
const HOLIDAYS_SHOWN: usize = 3;

pub fn compose(
    query: &str,
    retrieval: &RetrievalResult,
    enrichment: &BTreeMap<String, Value>,
) -> ComposedResponse {
    let (base, sources) = match retrieval.best() {
        Some(best) => (render_item(best), vec![best.source.clone()]),
        None => (
            intent::fallback_template(query).to_string(),
            vec![FALLBACK_SOURCE.to_string()],
        ),
    };

    let mut text = base;

    let sentences: Vec<String> = enrichment
        .iter()
        .filter_map(|(key, value)| {
            let category = FactCategory::from_key(key)?;
            if !has_data(value) || !intent::fact_triggered(query, category) {
                return None;
            }
            enrichment_sentence(category, value)
        })
        .collect();
    if !sentences.is_empty() {
        text.push_str("\n\n");
        text.push_str(&sentences.join("\n"));
    }

    text.push_str("\n\nConseil : ");
    text.push_str(&intent::tips(query));

    ComposedResponse {
        response_text: text,
        sources,
        additional_info: enrichment.clone(),
        fallback_used: false,
    }
}

fn render_item(item: &KnowledgeItem) -> String {
    match &item.payload {
        KnowledgePayload::Faq { answer, .. } => answer.clone(),
        KnowledgePayload::Policy { title, content, .. } => {
            format!("Selon la politique « {title} » :\n{}", excerpt(content.trim()))
        }
        KnowledgePayload::Procedure { title, steps, .. } => {
            let steps = steps
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Procédure « {title} » :\n{}", excerpt(&steps))
        }
        KnowledgePayload::Document { title, content, .. } => match title {
            Some(t) => format!("D'après le document « {t} » :\n{}", excerpt(content.trim())),
            None => format!("D'après nos documents RH :\n{}", excerpt(content.trim())),
        },
        KnowledgePayload::Holiday {
            date,
            name,
            holiday_type,
        } => format!("Jour férié ({holiday_type}) : {}", excerpt(&format!("{name}, le {date}"))),
    }
}

/// First [`EXCERPT_CHARS`] characters, with `...` when cut.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn parse<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

fn enrichment_sentence(category: FactCategory, value: &Value) -> Option<String> {
    match category {
        FactCategory::Weather => {
            let w: WeatherInfo = parse(value)?;
            Some(format!(
                "Météo actuelle à {} : {}°C, {}.",
                w.city, w.temperature, w.description
            ))
        }
        FactCategory::Holidays => {
            let holidays: Vec<Holiday> = parse(value)?;
            let listed = holidays
                .iter()
                .take(HOLIDAYS_SHOWN)
                .map(|h| format!("{} ({})", h.name, french_date(h.date)))
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("Prochains jours fériés : {listed}."))
        }
        FactCategory::Currency => {
            let rates: CurrencyRates = parse(value)?;
            let listed = ["EUR", "USD"]
                .iter()
                .filter_map(|code| {
                    rates
                        .rates
                        .get(*code)
                        .map(|rate| format!("1 {code} = {rate:.2} {}", rates.base))
                })
                .collect::<Vec<_>>()
                .join(", ");
            (!listed.is_empty()).then(|| format!("Taux de change indicatifs : {listed}."))
        }
        FactCategory::Traffic => {
            let t: TrafficInfo = parse(value)?;
            Some(format!(
                "Trafic : {} (mis à jour à {}) sur {}.",
                t.status.to_lowercase(),
                t.update_time,
                t.main_routes.join(", ")
            ))
        }
        FactCategory::Economy => {
            let e: EconomyInfo = parse(value)?;
            Some(format!(
                "Indicateurs économiques ({}) : inflation {}, croissance {}, chômage {}.",
                e.update_date, e.inflation, e.growth, e.unemployment
            ))
        }
    }
}

fn french_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
