// src/analysis/provider.rs
//! Text-generation providers behind one async seam.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// One prompt in, free text out. Transport and quota problems surface as
    /// errors; the orchestrator maps every error to the fallback path.
    async fn generate(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Gemini `generateContent` REST client.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("egx-news-bot/0.1 (+github.com/egx-research/egx-news-bot)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        let model = model_override.unwrap_or("gemini-1.5-pro").to_string();
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl AnalysisProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: CandidateContent,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            #[serde(default)]
            text: String,
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("gemini request failed")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("gemini returned HTTP {status}"));
        }

        let body: Resp = resp.json().await.context("gemini response body")?;
        let text: String = body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(anyhow!("gemini returned an empty candidate"));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Deterministic provider for tests and local dry runs. Counts invocations so
/// scenario tests can assert which pipeline stages actually ran.
pub struct MockProvider {
    reply: String,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for MockProvider {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_counts_calls() {
        let p = MockProvider::new("التأثير: لا شيء");
        assert_eq!(p.calls(), 0);
        let _ = p.generate("x").await.unwrap();
        let _ = p.generate("y").await.unwrap();
        assert_eq!(p.calls(), 2);
    }
}
