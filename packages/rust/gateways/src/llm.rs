//! LLM gateway over an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use rhassistant_shared::{AssistantError, LlmConfig, Result, read_secret_env};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Shown to the requester when the LLM could not produce an answer.
pub const APOLOGY_TEXT: &str = "Désolé, je n'ai pas pu générer de réponse pour le moment.";

/// Text completion capability.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete `prompt` under the given system instructions.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Client for `/chat/completions`.
pub struct OpenAiLlm {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiLlm {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: crate::build_client(config.timeout_secs)?,
            base_url: crate::parse_base_url(&config.base_url)?,
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
        })
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = read_secret_env(&config.api_key_env).ok_or_else(|| {
            AssistantError::config(format!(
                "LLM is enabled but {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl LlmGateway for OpenAiLlm {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, "calling LLM");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Upstream(format!("LLM request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream(format!("LLM returned HTTP {status}: {body}")));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AssistantError::Upstream(format!("malformed LLM response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AssistantError::Upstream("LLM returned no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            enabled: true,
            base_url: server.uri(),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Vous avez droit à 30 jours.  "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let llm = OpenAiLlm::new(&config_for(&server), "sk-test").unwrap();
        let text = llm.complete("system", "question").await.unwrap();
        assert_eq!(text, "Vous avez droit à 30 jours.");
    }

    #[tokio::test]
    async fn server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let llm = OpenAiLlm::new(&config_for(&server), "sk-test").unwrap();
        let err = llm.complete("system", "question").await.unwrap_err();
        assert!(matches!(err, AssistantError::Upstream(_)));
    }

    #[tokio::test]
    async fn empty_choices_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let llm = OpenAiLlm::new(&config_for(&server), "sk-test").unwrap();
        assert!(llm.complete("system", "question").await.is_err());
    }

    #[test]
    fn missing_key_is_config_error() {
        let config = LlmConfig {
            api_key_env: "RHA_TEST_NO_SUCH_LLM_KEY_98765".into(),
            ..LlmConfig::default()
        };
        let err = OpenAiLlm::from_config(&config).err().unwrap();
        assert!(matches!(err, AssistantError::Config { .. }));
    }
}
