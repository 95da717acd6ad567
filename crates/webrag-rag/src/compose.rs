//! Answer composition through a local Ollama server.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use webrag_core::config::OllamaSettings;
use webrag_core::traits::AnswerComposer;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Prompt that confines the model to the retrieved context.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful AI assistant.\n\
         Answer ONLY using the context below.\n\
         If the answer is not in the context, say \"I don't know\".\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n"
    )
}

pub struct OllamaComposer {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl OllamaComposer {
    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building Ollama HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl AnswerComposer for OllamaComposer {
    async fn compose(&self, context: &str, question: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(context, question),
            stream: false,
            options: GenerateOptions { temperature: self.temperature, top_p: self.top_p },
        };
        debug!(model = %self.model, prompt_chars = request.prompt.len(), "calling Ollama");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Ollama request to {} failed", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Ollama returned error: {status}"));
        }
        let body: GenerateResponse = response.json().await.context("Failed to parse Ollama response")?;
        Ok(body.response)
    }
}
