use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::error::CompletionError;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: String, user_prompt: String, max_output_tokens: u32) -> Self {
        Self {
            system_prompt,
            user_prompt,
            max_output_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A hosted (or local) text-in, text-out language model.
///
/// One call is one attempt: implementations do not retry.
pub trait TextCompleter: Send + Sync {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

impl<T: TextCompleter> TextCompleter for Arc<T> {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send {
        (**self).complete(request)
    }
}

// ---------------------------------------------------------------------------
// OpenAI chat completions

#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiClient {
    pub const SERVICE: &'static str = "OpenAI";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4.5-preview";

    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        }
    }

    fn first_choice(response: ChatResponse) -> Result<String, CompletionError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::Empty {
                service: Self::SERVICE,
            })
    }
}

impl TextCompleter for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| CompletionError::Transport {
                service: Self::SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                service: Self::SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| CompletionError::Decode {
            service: Self::SERVICE,
            message: e.to_string(),
        })?;
        tracing::debug!(model = %self.model, choices = chat.choices.len(), "Raw completion received");

        Self::first_choice(chat)
    }
}

// ---------------------------------------------------------------------------
// Ollama

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub const SERVICE: &'static str = "Ollama";
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "llama3";

    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_BASE_URL.to_string(),
            Self::DEFAULT_MODEL.to_string(),
        )
    }
}

impl TextCompleter for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = OllamaRequest {
            model: &self.model,
            system: &request.system_prompt,
            prompt: &request.user_prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: request.max_output_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport {
                service: Self::SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                service: Self::SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let ollama_response: OllamaResponse =
            response.json().await.map_err(|e| CompletionError::Decode {
                service: Self::SERVICE,
                message: e.to_string(),
            })?;

        Ok(ollama_response.response)
    }
}

// ---------------------------------------------------------------------------

/// Runtime choice between the hosted and the local service.
#[derive(Clone)]
pub enum CompletionBackend {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
}

impl CompletionBackend {
    pub fn describe(&self) -> String {
        match self {
            Self::OpenAi(client) => format!("{} ({})", OpenAiClient::SERVICE, client.model()),
            Self::Ollama(client) => format!("{} ({})", OllamaClient::SERVICE, client.model()),
        }
    }
}

impl TextCompleter for CompletionBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        match self {
            Self::OpenAi(client) => client.complete(request).await,
            Self::Ollama(client) => client.complete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_body_shape() {
        let client = OpenAiClient::new(
            "https://api.openai.com/v1/".to_string(),
            "gpt-test".to_string(),
            "sk-test".to_string(),
        );
        let request = CompletionRequest::new("sys".to_string(), "user".to_string(), 4000);

        let body = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "user"}
                ],
                "max_tokens": 4000
            })
        );
        assert_eq!(client.base_url, "https://api.openai.com/v1");

        let body = serde_json::to_value(client.build_body(&request.with_temperature(0.0))).unwrap();
        assert_eq!(body["temperature"], serde_json::json!(0.0));
    }

    #[test]
    fn test_openai_first_choice() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Ethanol $ 64-17-5"}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(OpenAiClient::first_choice(response).unwrap(), "Ethanol $ 64-17-5");

        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            OpenAiClient::first_choice(response),
            Err(CompletionError::Empty { .. })
        ));

        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(OpenAiClient::first_choice(response).is_err());
    }
}
