// src/llm.rs

use crate::config::OllamaSection;
use crate::error::{AppError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Blocking-style request/response client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn from_config(cfg: &OllamaSection) -> Self {
        Self::new(&cfg.base_url, &cfg.model, cfg.timeout_secs)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the Ollama server is reachable.
    pub async fn check_health(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!(url = %self.base_url, "Ollama server is reachable");
                    true
                } else {
                    warn!(status = %resp.status(), "Ollama server returned non-OK status");
                    false
                }
            }
            Err(e) => {
                warn!(error = %e, "Ollama server not reachable");
                false
            }
        }
    }

    /// Send one non-streaming prompt to `/api/generate` and return the text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Ollama { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }

    /// Like [`generate`](Self::generate), but any failure becomes an inline
    /// placeholder answer so the conversation can carry on.
    pub async fn ask(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(answer) => {
                info!(model = %self.model, chars = answer.len(), "Ollama query answered");
                answer
            }
            Err(e) => {
                error!(error = %e, "Ollama query failed");
                format!("[Error contacting Ollama: {e}]")
            }
        }
    }

    /// Fetch an embedding vector from `/api/embeddings`.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f64>> {
        let request = EmbeddingRequest {
            model,
            prompt: text,
        };
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Ollama { status, body });
        }

        let body: EmbeddingResponse = response.json().await?;
        Ok(body.embedding)
    }
}
