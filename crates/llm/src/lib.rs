//! Chat-completion clients for the coaching commands.

mod coach;

pub use coach::{
    Coach, IDEA_GUIDANCE, IDEA_REQUEST, REWRITE_GUIDANCE, SYSTEM_PROMPT, reflection_prompt,
    rewrite_prompt,
};

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use habitual_config::LlmConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("ollama") {
            Self::Ollama
        } else {
            Self::OpenAi
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Any endpoint speaking the OpenAI `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn chat(&self, model: &str, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        if !self.has_key() {
            bail!("OpenAI API key is not set");
        }

        let payload = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("OpenAI unreachable at {}", self.base_url))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("OpenAI error ({status}): {body}");
        }

        openai_content(&body).with_context(|| format!("OpenAI response missing text: {body}"))
    }
}

/// A local Ollama server, via `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn chat(&self, model: &str, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        let payload = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": { "num_predict": max_tokens },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Ollama unavailable at {}. Start Ollama and ensure model '{model}' is installed",
                    self.base_url
                )
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("Ollama error ({status}): {body}");
        }

        ollama_content(&body).with_context(|| format!("Ollama response missing text: {body}"))
    }
}

/// Routes a chat to whichever provider the config selects.
#[derive(Debug, Clone)]
pub struct LlmRouter {
    provider: Provider,
    openai: OpenAiClient,
    openai_model: String,
    ollama: OllamaClient,
    ollama_model: String,
}

impl LlmRouter {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            provider: Provider::from_name(&config.provider),
            openai: OpenAiClient::new(&config.openai_base_url, &config.openai_api_key)?,
            openai_model: config.openai_model.clone(),
            ollama: OllamaClient::new(&config.ollama_base_url)?,
            ollama_model: config.ollama_model.clone(),
        })
    }

    /// Ollama needs no credentials; OpenAI needs a key.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            Provider::OpenAi => self.openai.has_key(),
            Provider::Ollama => true,
        }
    }

    pub async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<(Provider, String)> {
        debug!(provider = ?self.provider, max_tokens, "llm: chat request");
        let text = match self.provider {
            Provider::OpenAi => {
                self.openai
                    .chat(&self.openai_model, messages, max_tokens)
                    .await?
            }
            Provider::Ollama => {
                self.ollama
                    .chat(&self.ollama_model, messages, max_tokens)
                    .await?
            }
        };
        Ok((self.provider, text.trim().to_string()))
    }
}

fn openai_content(body: &serde_json::Value) -> Option<String> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(ToString::to_string)
}

fn ollama_content(body: &serde_json::Value) -> Option<String> {
    body.get("message")
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(ToString::to_string)
}

// ── Tests ────────────────────────────────────────────────────────────────────
