//! Answer generation backends.
//!
//! - **[`AnthropicGenerator`]** sends the retrieved context and the question
//!   to the Anthropic Messages API in a single request.
//! - **[`DisabledGenerator`]** fails every call; used when
//!   `answer.provider = "disabled"`.
//!
//! Use [`create_generator`] to build the one the configuration asks for.
//!
//! Upstream failures are not retried. A non-success response surfaces its
//! raw body through [`AnswerError::Status`] so the user sees what the API
//! said.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AnswerConfig;
use crate::traits::AnswerGenerator;

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("answer generation is disabled")]
    Disabled,

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model request failed: {0}")]
    Http(String),

    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("Invalid model response: {0}")]
    MalformedResponse(String),
}

/// Wrap `context` and `question` in the grounding instructions sent to the model.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use ONLY the information below.\nDo NOT invent facts.\n\n<context>\n{}\n</context>\n\nQuestion:\n{}\n",
        context, question
    )
}

// ============ Disabled Generator ============

pub struct DisabledGenerator;

#[async_trait]
impl AnswerGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _context: &[String], _question: &str) -> Result<String, AnswerError> {
        Err(AnswerError::Disabled)
    }
}

// ============ Anthropic Generator ============

/// Generator backed by `POST /v1/messages`.
///
/// Context chunks are joined with blank lines and placed in the prompt; the
/// first content block of the reply is the answer.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    api_version: String,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
}

impl AnthropicGenerator {
    /// Build a generator with an explicit API key.
    pub fn new(config: &AnswerConfig, api_key: impl Into<String>) -> Result<Self, AnswerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnswerError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: config.api_url.clone(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build a generator reading the key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// [`AnswerError::MissingApiKey`] when the variable is unset or blank.
    pub fn from_config(config: &AnswerConfig) -> Result<Self, AnswerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnswerError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    fn request_body(&self, context: &[String], question: &str) -> serde_json::Value {
        let prompt = build_prompt(&context.join("\n\n"), question);
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }
}

#[async_trait]
impl AnswerGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, context: &[String], question: &str) -> Result<String, AnswerError> {
        let body = self.request_body(context, question);

        tracing::debug!(
            model = %self.model,
            chunks = context.len(),
            "sending answer request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "model API returned an error");
            return Err(AnswerError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnswerError::MalformedResponse(e.to_string()))?;
        parse_response(&json)
    }
}

impl AnthropicGenerator {
    fn transport_error(&self, e: reqwest::Error) -> AnswerError {
        if e.is_timeout() {
            AnswerError::Timeout(self.timeout_secs)
        } else {
            AnswerError::Http(e.to_string())
        }
    }
}

/// Extract `content[0].text` from a Messages API reply.
fn parse_response(json: &serde_json::Value) -> Result<String, AnswerError> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| AnswerError::MalformedResponse("missing content[0].text".to_string()))
}

/// Create the generator selected by `config.provider`.
///
/// Unknown providers are rejected when the config is loaded, so anything
/// other than `"anthropic"` here is treated as disabled.
pub fn create_generator(config: &AnswerConfig) -> Result<Box<dyn AnswerGenerator>, AnswerError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicGenerator::from_config(config)?)),
        _ => Ok(Box::new(DisabledGenerator)),
    }
}
