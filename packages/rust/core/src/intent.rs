//! Keyword intent table shared by the enricher and the composer.
//!
//! Each [`IntentRule`] ties a set of trigger keywords to the external facts
//! worth fetching, the generic answer used when retrieval finds nothing, and
//! the tip appended to the answer. Keeping all four in one row means a fact is
//! only ever fetched for a query that can also surface it.

use std::collections::BTreeSet;

/// Category of external fact, keyed by name in `additional_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FactCategory {
    Weather,
    Holidays,
    Currency,
    Traffic,
    Economy,
}

impl FactCategory {
    pub const ALL: [FactCategory; 5] = [
        Self::Weather,
        Self::Holidays,
        Self::Currency,
        Self::Traffic,
        Self::Economy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Holidays => "holidays",
            Self::Currency => "currency",
            Self::Traffic => "traffic",
            Self::Economy => "economy",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

/// One row of the intent table.
#[derive(Debug)]
pub struct IntentRule {
    /// Lowercase word prefixes; any one fires the rule.
    pub triggers: &'static [&'static str],
    pub facts: &'static [FactCategory],
    /// Generic answer when retrieval is empty.
    pub template: Option<&'static str>,
    pub tip: Option<&'static str>,
}

impl IntentRule {
    pub fn matches(&self, query_lower: &str) -> bool {
        self.triggers
            .iter()
            .any(|t| starts_a_word(query_lower, t))
    }
}

/// Whether `needle` occurs in `haystack` at the start of a word.
///
/// "jour" fires on "jours fériés" but not on "bonjour" or "aujourd'hui".
fn starts_a_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        haystack[..at]
            .chars()
            .next_back()
            .is_none_or(|prev| !prev.is_alphanumeric())
    })
}

pub const LEAVE_TEMPLATE: &str = "Les collaborateurs de la CDG bénéficient de 30 jours ouvrables de \
congés payés par an. Les congés se planifient en accord avec votre manager, avec un délai de préavis \
d'au moins 15 jours. Des congés exceptionnels sont prévus pour les événements familiaux \
(mariage, naissance, décès).";

pub const SALARY_TEMPLATE: &str = "Votre rémunération est versée mensuellement. Les cotisations CDG \
sont calculées sur le salaire brut : 14 % à la charge de l'employé et 28 % à la charge de \
l'employeur. Pour le détail de votre bulletin, rapprochez-vous du service paie.";

pub const TRAINING_TEMPLATE: &str = "La CDG consacre 3 % de sa masse salariale à la formation \
continue et chaque collaborateur dispose de 5 jours de formation par an. Les demandes se font \
via l'intranet après évaluation des besoins avec votre manager.";

/// Catalogue overview used when no rule offers a template.
pub const DEFAULT_TEMPLATE: &str = "Je peux vous renseigner sur les congés, la rémunération et \
les cotisations, la retraite et les pensions, la formation continue, la mutuelle santé et les \
avantages sociaux de la CDG. Pouvez-vous préciser votre question ?";

pub const GENERIC_TIP: &str = "Pour toute question spécifique, contactez votre gestionnaire RH.";

pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        triggers: &["congé", "vacance", "repos", "férié", "jour"],
        facts: &[FactCategory::Holidays],
        template: Some(LEAVE_TEMPLATE),
        tip: Some("Pensez à poser vos congés au moins 15 jours à l'avance."),
    },
    IntentRule {
        triggers: &["salaire", "rémunération", "paie", "euro", "dollar", "devise"],
        facts: &[FactCategory::Currency],
        template: Some(SALARY_TEMPLATE),
        tip: Some("Vos bulletins de paie sont disponibles sur l'intranet RH."),
    },
    IntentRule {
        triggers: &["formation"],
        facts: &[],
        template: Some(TRAINING_TEMPLATE),
        tip: Some("Consultez le catalogue des formations sur l'intranet."),
    },
    IntentRule {
        triggers: &["retraite", "pension"],
        facts: &[FactCategory::Currency],
        template: None,
        tip: Some("Demandez votre relevé de carrière pour vérifier vos droits à pension."),
    },
    IntentRule {
        triggers: &["événement", "congé", "sortie", "météo", "temps"],
        facts: &[FactCategory::Weather],
        template: None,
        tip: None,
    },
    IntentRule {
        triggers: &["transport", "trafic", "déplacement", "route"],
        facts: &[FactCategory::Traffic],
        template: None,
        tip: None,
    },
    IntentRule {
        triggers: &["économie", "inflation", "croissance", "marché"],
        facts: &[FactCategory::Economy],
        template: None,
        tip: None,
    },
];

/// Rules fired by `query`, in table order.
pub fn matching_rules(query: &str) -> impl Iterator<Item = &'static IntentRule> {
    let lower = query.to_lowercase();
    INTENT_RULES.iter().filter(move |rule| rule.matches(&lower))
}

/// Fact categories worth fetching for `query`.
pub fn facts_for(query: &str) -> BTreeSet<FactCategory> {
    matching_rules(query)
        .flat_map(|rule| rule.facts.iter().copied())
        .collect()
}

/// Whether `query` triggers `category` through any rule.
pub fn fact_triggered(query: &str, category: FactCategory) -> bool {
    matching_rules(query).any(|rule| rule.facts.contains(&category))
}

/// First matching template, else the catalogue overview.
pub fn fallback_template(query: &str) -> &'static str {
    matching_rules(query)
        .find_map(|rule| rule.template)
        .unwrap_or(DEFAULT_TEMPLATE)
}

/// All matching tips joined, else the generic tip.
pub fn tips(query: &str) -> String {
    let tips: Vec<&str> = matching_rules(query).filter_map(|rule| rule.tip).collect();
    if tips.is_empty() {
        GENERIC_TIP.to_string()
    } else {
        tips.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_query_fetches_holidays_and_weather() {
        let facts = facts_for("Combien de jours de congés payés ai-je ?");
        assert_eq!(
            facts.into_iter().collect::<Vec<_>>(),
            vec![FactCategory::Weather, FactCategory::Holidays]
        );
    }

    #[test]
    fn triggers_only_fire_at_word_starts() {
        let query = "Bonjour, comment contacter la mutuelle aujourd'hui ?";
        assert!(facts_for(query).is_empty());
        assert_eq!(fallback_template(query), DEFAULT_TEMPLATE);
        assert_eq!(tips(query), GENERIC_TIP);

        assert!(facts_for("toujours en séjour depuis longtemps").is_empty());
        assert!(fact_triggered("mes jours de repos", FactCategory::Holidays));
        assert!(fact_triggered("l'événement annuel", FactCategory::Weather));
        assert_eq!(fallback_template("Mes congés ?"), LEAVE_TEMPLATE);
    }

    #[test]
    fn triggers_are_case_insensitive() {
        assert!(fact_triggered("Quel est le TAUX en EURO ?", FactCategory::Currency));
        assert!(!fact_triggered("Quel est le taux ?", FactCategory::Currency));
    }

    #[test]
    fn template_follows_table_order() {
        assert_eq!(fallback_template("congés et salaire"), LEAVE_TEMPLATE);
        assert_eq!(fallback_template("ma fiche de paie"), SALARY_TEMPLATE);
        assert_eq!(fallback_template("plan de formation"), TRAINING_TEMPLATE);
        // Retirement has a tip but no template
        assert_eq!(fallback_template("ma retraite"), DEFAULT_TEMPLATE);
    }

    #[test]
    fn all_matching_tips_are_joined() {
        let tips = tips("formation et retraite");
        assert!(tips.contains("catalogue des formations"));
        assert!(tips.contains("relevé de carrière"));
        assert_eq!(super::tips("merci"), GENERIC_TIP);
    }

    #[test]
    fn category_keys_roundtrip() {
        for category in FactCategory::ALL {
            assert_eq!(FactCategory::from_key(category.as_str()), Some(category));
        }
        assert_eq!(FactCategory::from_key("news"), None);
    }
}
