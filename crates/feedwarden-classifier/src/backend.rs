//! Completion backends.
//!
//! A backend turns one [`CompletionRequest`] into reply text. The HTTP
//! backend speaks the chat APIs of the supported providers and maps HTTP
//! failures onto [`ClassifyError`]. Requests are never retried here; a fresh
//! attempt only happens on the engine's next natural trigger.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ClassifyError, ClassifyResult};
use crate::prompt::CompletionRequest;

/// Produces completion text for a request.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> ClassifyResult<String>;
}

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Groq,
    Gemini,
    Local,
}

impl Provider {
    fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            Provider::Local => "http://localhost:11434/api/chat",
        }
    }

    fn needs_key(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

impl std::str::FromStr for Provider {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "groq" => Ok(Provider::Groq),
            "gemini" => Ok(Provider::Gemini),
            "local" => Ok(Provider::Local),
            other => Err(ClassifyError::Config(format!("invalid AI provider: {other}"))),
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    /// API key (not needed for local models)
    pub api_key: Option<String>,
    /// Override the provider's default endpoint
    pub endpoint: Option<String>,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Transcript service used by summarization
    pub transcript_url: Option<String>,
    pub transcript_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            provider: Provider::Gemini,
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            endpoint: None,
            timeout_secs: 60,
            transcript_url: None,
            transcript_key: None,
        }
    }
}

impl BackendConfig {
    /// Create a config from `FEEDWARDEN_*` environment variables
    pub fn from_env() -> ClassifyResult<Self> {
        let mut config = BackendConfig::default();
        if let Ok(provider) = std::env::var("FEEDWARDEN_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("FEEDWARDEN_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("FEEDWARDEN_API_KEY").ok();
        config.endpoint = std::env::var("FEEDWARDEN_ENDPOINT").ok();
        if let Ok(timeout) = std::env::var("FEEDWARDEN_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .map_err(|_| ClassifyError::Config(format!("invalid timeout: {timeout}")))?;
        }
        config.transcript_url = std::env::var("FEEDWARDEN_TRANSCRIPT_URL").ok();
        config.transcript_key = std::env::var("FEEDWARDEN_TRANSCRIPT_KEY").ok();
        Ok(config)
    }

    /// Create config for a specific provider and model
    pub fn new(provider: Provider, model: &str) -> Self {
        BackendConfig {
            provider,
            model: model.to_string(),
            ..BackendConfig::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    pub fn validate(&self) -> ClassifyResult<()> {
        if self.model.trim().is_empty() {
            return Err(ClassifyError::Config("model must not be empty".into()));
        }
        if self.provider.needs_key() && self.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ClassifyError::Config(format!(
                "{:?} requires an API key",
                self.provider
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ClassifyError::Config("timeout must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Provider reply shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicReply {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiReply {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct LocalReply {
    message: Option<ChatMessage>,
}

fn chat_messages(request: &CompletionRequest) -> Value {
    json!([
        { "role": "system", "content": request.system },
        { "role": "user", "content": request.prompt },
    ])
}

/// Build the provider-specific request body.
pub(crate) fn request_body(config: &BackendConfig, request: &CompletionRequest) -> Value {
    match config.provider {
        Provider::OpenAi => {
            let mut body = json!({
                "model": config.model,
                "messages": chat_messages(request),
            });
            if request.shape.expects_json() {
                body["response_format"] = json!({ "type": "json_object" });
            }
            body
        }
        Provider::Groq => json!({
            "model": config.model,
            "messages": chat_messages(request),
        }),
        Provider::Anthropic => json!({
            "model": config.model,
            "system": request.system,
            "max_tokens": 2048,
            "messages": [{ "role": "user", "content": request.prompt }],
        }),
        Provider::Gemini => {
            let mut generation = json!({
                "temperature": 1,
                "topP": 0.95,
                "topK": 64,
                "maxOutputTokens": 8192,
            });
            if let Some(schema) = request.shape.schema() {
                generation["responseMimeType"] = json!("application/json");
                generation["responseSchema"] = schema;
            }
            json!({
                "systemInstruction": { "parts": [{ "text": request.system }] },
                "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
                "generationConfig": generation,
            })
        }
        Provider::Local => json!({
            "model": config.model,
            "messages": chat_messages(request),
            "stream": false,
        }),
    }
}

/// Pull the reply text out of a provider response body.
pub(crate) fn extract_text(provider: Provider, body: &str) -> ClassifyResult<String> {
    let text = match provider {
        Provider::OpenAi | Provider::Groq => {
            let reply: ChatCompletion = serde_json::from_str(body)?;
            reply
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
        }
        Provider::Anthropic => {
            let reply: AnthropicReply = serde_json::from_str(body)?;
            reply.content.into_iter().find_map(|b| b.text)
        }
        Provider::Gemini => {
            let reply: GeminiReply = serde_json::from_str(body)?;
            reply
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        }
        Provider::Local => {
            let reply: LocalReply = serde_json::from_str(body)?;
            reply.message.and_then(|m| m.content)
        }
    };
    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ClassifyError::Malformed(format!("no completion from {provider:?}")))
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Completion backend over HTTP
pub struct HttpBackend {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend, validating the config first
    pub fn new(config: BackendConfig) -> ClassifyResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("feedwarden-classifier/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifyError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(HttpBackend {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn build(&self, body: &Value) -> reqwest::RequestBuilder {
        let key = self.config.api_key.as_deref().unwrap_or_default();
        let endpoint = self.config.endpoint();
        match self.config.provider {
            Provider::OpenAi | Provider::Groq => self
                .http_client
                .post(endpoint)
                .bearer_auth(key)
                .json(body),
            Provider::Anthropic => self
                .http_client
                .post(endpoint)
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01")
                .json(body),
            Provider::Gemini => self
                .http_client
                .post(format!(
                    "{}/{}:generateContent",
                    endpoint.trim_end_matches('/'),
                    self.config.model
                ))
                .query(&[("key", key)])
                .json(body),
            Provider::Local => self.http_client.post(endpoint).json(body),
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: &CompletionRequest) -> ClassifyResult<String> {
        let body = request_body(&self.config, request);
        debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            shape = ?request.shape,
            "sending completion request"
        );

        let response = self.build(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(provider = ?self.config.provider, status = %status, "completion request failed");
            return Err(ClassifyError::from_status(status.as_u16(), text));
        }

        extract_text(self.config.provider, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ResponseShape;

    fn request(shape: ResponseShape) -> CompletionRequest {
        CompletionRequest {
            system: "sys".into(),
            prompt: "user prompt".into(),
            shape,
        }
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("local".parse::<Provider>().unwrap(), Provider::Local);
        assert!(matches!(
            "bard".parse::<Provider>(),
            Err(ClassifyError::Config(_))
        ));
    }

    #[test]
    fn test_validate_requires_key_for_remote() {
        let config = BackendConfig::new(Provider::Anthropic, "claude");
        assert!(matches!(config.validate(), Err(ClassifyError::Config(_))));
        assert!(config.with_api_key("k").validate().is_ok());
        assert!(BackendConfig::new(Provider::Local, "llama3").validate().is_ok());
    }

    #[test]
    fn test_endpoint_override() {
        let config = BackendConfig::new(Provider::Local, "llama3")
            .with_endpoint("http://127.0.0.1:9999/api/chat");
        assert_eq!(config.endpoint(), "http://127.0.0.1:9999/api/chat");
        assert_eq!(
            BackendConfig::new(Provider::Groq, "m").endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_gemini_body_carries_schema_only_for_json_shapes() {
        let config = BackendConfig::default();
        let body = request_body(&config, &request(ResponseShape::Verdict));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        let body = request_body(&config, &request(ResponseShape::FreeText));
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_openai_body_requests_json_object() {
        let config = BackendConfig::new(Provider::OpenAi, "gpt-4o-mini");
        let body = request_body(&config, &request(ResponseShape::ShownList));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user prompt");
    }

    #[test]
    fn test_extract_text_per_provider() {
        let openai = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        assert_eq!(extract_text(Provider::OpenAi, openai).unwrap(), "hi");

        let anthropic = r#"{"content":[{"type":"text","text":"hello"}]}"#;
        assert_eq!(extract_text(Provider::Anthropic, anthropic).unwrap(), "hello");

        let gemini = r#"{"candidates":[{"content":{"parts":[{"text":"{}"}]}}]}"#;
        assert_eq!(extract_text(Provider::Gemini, gemini).unwrap(), "{}");

        let local = r#"{"message":{"role":"assistant","content":"ok"}}"#;
        assert_eq!(extract_text(Provider::Local, local).unwrap(), "ok");
    }

    #[test]
    fn test_extract_text_empty_is_malformed() {
        let err = extract_text(Provider::Groq, r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
        let err = extract_text(Provider::Gemini, "<html>").unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let config = BackendConfig::new(Provider::Local, "llama3")
            .with_endpoint("http://127.0.0.1:1/api/chat");
        let backend = HttpBackend::new(config).unwrap();
        let err = backend
            .complete(&request(ResponseShape::Verdict))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Transport(_)));
    }
}
