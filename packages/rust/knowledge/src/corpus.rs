//! The curated CDG knowledge corpus.

use std::path::Path;

use rhassistant_shared::{AssistantError, Result};
use serde::{Deserialize, Serialize};

/// Built-in corpus shipped with the binary.
const BUILTIN_CORPUS: &str = include_str!("../data/cdg_corpus.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default = "default_policy_source")]
    pub source: String,
}

fn default_policy_source() -> String {
    "CDG_Maroc".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEntry {
    pub title: String,
    pub steps: Vec<String>,
    pub category: String,
}

/// A recurring public holiday; `date` is `MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub date: String,
    pub name: String,
    #[serde(rename = "type")]
    pub holiday_type: String,
}

/// FAQ, policies, procedures and holidays, in that search order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
    #[serde(default)]
    pub procedures: Vec<ProcedureEntry>,
    #[serde(default)]
    pub holidays: Vec<HolidayEntry>,
}

impl Corpus {
    /// The built-in CDG corpus.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_CORPUS)
            .map_err(|e| AssistantError::config(format!("built-in corpus is malformed: {e}")))
    }

    /// Load a corpus from a JSON file with the built-in layout.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AssistantError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            AssistantError::config(format!("failed to parse corpus {}: {e}", path.display()))
        })
    }

    /// The configured corpus file if any, else the built-in one.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_corpus_sections() {
        let corpus = Corpus::builtin().unwrap();
        assert_eq!(corpus.faq.len(), 8);
        assert_eq!(corpus.policies.len(), 5);
        assert_eq!(corpus.procedures.len(), 5);
        assert_eq!(corpus.holidays.len(), 9);
        assert!(corpus.policies.iter().all(|p| p.source == "CDG_Maroc"));
    }

    #[test]
    fn partial_corpus_file_loads() {
        let path = std::env::temp_dir().join(format!(
            "rha_corpus_{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{"faq":[{"question":"Q ?","answer":"R.","category":"test"}],
                "policies":[{"title":"T","content":"C","category":"x"}]}"#,
        )
        .unwrap();

        let corpus = Corpus::load(&path).unwrap();
        assert_eq!(corpus.faq.len(), 1);
        assert_eq!(corpus.policies[0].source, "CDG_Maroc");
        assert!(corpus.holidays.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_corpus_file_is_io_error() {
        let err = Corpus::load(Path::new("/nonexistent/corpus.json")).unwrap_err();
        assert!(matches!(err, AssistantError::Io { .. }));
    }
}
