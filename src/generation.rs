use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::OllamaConfig;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_definition(&self, word: &str) -> anyhow::Result<String>;

    /// A sentence that uses `word` verbatim (case-insensitive).
    async fn generate_example(&self, word: &str, definition: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Strip whitespace and a single pair of surrounding quotes.
pub(crate) fn clean_output(raw: &str) -> String {
    lazy_static! {
        static ref QUOTED: Regex = Regex::new(r#"^["'](.*)["']$"#).unwrap();
    }
    let trimmed = raw.trim();
    QUOTED.replace(trimmed, "$1").into_owned()
}

fn contains_word(text: &str, word: &str) -> bool {
    text.to_lowercase().contains(&word.to_lowercase())
}

#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    max_attempts: u32,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, cfg: &OllamaConfig) -> Self {
        Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            max_attempts: cfg.max_attempts.max(1),
        }
    }

    async fn generate(&self, prompt: String) -> anyhow::Result<String> {
        let res = self
            .http
            .post(format!("{}/generate", self.api_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .context("ollama request")?
            .error_for_status()
            .context("ollama status")?
            .json::<GenerateResponse>()
            .await
            .context("ollama response body")?;
        Ok(clean_output(&res.response))
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    #[instrument(skip(self))]
    async fn generate_definition(&self, word: &str) -> anyhow::Result<String> {
        let prompt = format!(
            "Define the word \"{word}\" in a clear and concise way. Provide only the definition \
             without any quotation marks or additional context, nothing else."
        );
        self.generate(prompt)
            .await
            .context("failed to generate AI definition")
    }

    #[instrument(skip(self, definition))]
    async fn generate_example(&self, word: &str, definition: &str) -> anyhow::Result<String> {
        let prompt = format!(
            "Given the word \"{word}\" which means \"{definition}\", generate one natural example \
             sentence that MUST use the exact word \"{word}\". The sentence should demonstrate \
             proper usage and help understand the meaning. Provide only the example sentence \
             without any quotation marks, nothing else."
        );
        for attempt in 1..=self.max_attempts {
            let example = self
                .generate(prompt.clone())
                .await
                .context("failed to generate AI example")?;
            if contains_word(&example, word) {
                debug!(attempt, "example accepted");
                return Ok(example);
            }
            warn!(attempt, "generated example does not contain the word");
        }
        anyhow::bail!(
            "failed to generate AI example containing \"{word}\" after {} attempts",
            self.max_attempts
        )
    }
}

#[cfg(test)]
pub(crate) use stub::StubGenerator;

#[cfg(test)]
mod stub {
    use async_trait::async_trait;

    use super::TextGenerator;

    /// Deterministic generator for handler tests.
    pub struct StubGenerator;

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate_definition(&self, word: &str) -> anyhow::Result<String> {
            Ok(format!("the meaning of {word}"))
        }

        async fn generate_example(&self, word: &str, _definition: &str) -> anyhow::Result<String> {
            Ok(format!("I used {word} in a sentence."))
        }
    }
}
