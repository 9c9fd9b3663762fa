use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::ServiceError,
    generator::{GenerationParams, ModelInfo, ResponseGenerator, word_tokens},
};

pub const OLLAMA_MODEL_ID: &str = "minivault-ollama";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: CompletionOptions,
}

#[derive(Serialize)]
struct CompletionOptions {
    num_predict: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct Completion {
    response: String,
}

#[derive(Deserialize)]
struct CompletionFragment {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Generator backed by an external Ollama daemon. Any backend failure
/// (connection refused, timeout, bad status, decode error) is absorbed and
/// replaced by the apology fallback, so callers always see a successful
/// outcome; the failure itself goes to the tracing channel.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    stream_delay: Duration,
    loaded_at: DateTime<Utc>,
}

impl OllamaBackend {
    pub fn new(config: &AppConfig) -> Self {
        // Bound the connect phase for both call shapes; the full-response
        // timeout is applied per request so long token streams are not cut
        // off mid-flight.
        let client = reqwest::Client::builder()
            .connect_timeout(config.backend_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.ollama_host.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            timeout: config.backend_timeout,
            stream_delay: config.stream_delay,
            loaded_at: Utc::now(),
        }
    }

    fn fallback_text(prompt: &str) -> String {
        let head: String = prompt.chars().take(50).collect();
        format!(
            "I understand your request about '{head}...'. However, I'm currently \
             unable to connect to the language model service. Please ensure the \
             Ollama service is running and try again."
        )
    }

    fn stream_fallback_text(prompt: &str) -> String {
        let head: String = prompt.chars().take(50).collect();
        format!(
            "I understand your request about '{head}...'. However, I'm currently \
             unable to connect to the language model service."
        )
    }

    async fn request_completion(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> anyhow::Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: CompletionOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
            },
        };
        let completion: Completion = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(completion.response)
    }
}

#[async_trait]
impl ResponseGenerator for OllamaBackend {
    fn model_id(&self) -> &str {
        OLLAMA_MODEL_ID
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            model_type: "ollama".to_string(),
            model_name: self.model.clone(),
            loaded_at: self.loaded_at,
            status: "loaded".to_string(),
            capabilities: vec!["text_generation".to_string(), "streaming".to_string()],
        }
    }

    async fn ready(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .is_ok()
    }

    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, ServiceError> {
        match self.request_completion(prompt, params).await {
            Ok(text) => Ok(text),
            Err(err) => {
                tracing::warn!(error = %err, "backend generation failed, serving fallback");
                Ok(Self::fallback_text(prompt))
            }
        }
    }

    fn generate_stream(
        &self,
        prompt: String,
        params: GenerationParams,
    ) -> BoxStream<'static, String> {
        let client = self.client.clone();
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "options": {
                "num_predict": params.max_tokens,
                "temperature": params.temperature,
            },
        });
        let delay = self.stream_delay;

        Box::pin(async_stream::stream! {
            let response = match client.post(&url).json(&body).send().await {
                Ok(resp) => resp.error_for_status(),
                Err(err) => Err(err),
            };

            let mut broken = false;
            match response {
                Ok(resp) => {
                    let mut bytes = resp.bytes_stream();
                    let mut buf: Vec<u8> = Vec::new();
                    'read: while let Some(item) = bytes.next().await {
                        let chunk = match item {
                            Ok(chunk) => chunk,
                            Err(err) => {
                                tracing::warn!(error = %err, "backend stream broke mid-response");
                                broken = true;
                                break;
                            }
                        };
                        buf.extend_from_slice(&chunk);
                        // Ollama emits one JSON object per line.
                        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buf.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&line);
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<CompletionFragment>(line) {
                                Ok(fragment) => {
                                    if !fragment.response.is_empty() {
                                        yield fragment.response;
                                    }
                                    if fragment.done {
                                        break 'read;
                                    }
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, "undecodable backend fragment");
                                    broken = true;
                                    break 'read;
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "backend stream unavailable, serving fallback");
                    broken = true;
                }
            }

            if broken {
                for token in word_tokens(&Self::stream_fallback_text(&prompt), None) {
                    yield token;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn unreachable_backend() -> OllamaBackend {
        let dir = std::env::temp_dir();
        let config = AppConfig::for_tests(&dir);
        OllamaBackend::new(&config)
    }

    fn params() -> GenerationParams {
        GenerationParams {
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    #[test]
    fn fallback_embeds_prompt_head() {
        let prompt = "p".repeat(200);
        let text = OllamaBackend::fallback_text(&prompt);
        assert!(text.contains(&format!("'{}...'", "p".repeat(50))));
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_to_fallback() {
        let backend = unreachable_backend();
        let text = backend
            .generate("Explain the borrow checker", params())
            .await
            .unwrap();
        assert!(text.contains("Explain the borrow checker"));
        assert!(text.contains("unable to connect"));
    }

    #[tokio::test]
    async fn unreachable_backend_streams_fallback_words() {
        let backend = unreachable_backend();
        let tokens: Vec<String> = backend
            .generate_stream("Explain the borrow checker".to_string(), params())
            .collect()
            .await;
        assert!(!tokens.is_empty());
        let text = tokens.concat();
        assert!(text.contains("Explain the borrow checker"));
        assert!(text.contains("unable to connect"));
    }

    #[tokio::test]
    async fn unreachable_backend_reports_not_ready() {
        assert!(!unreachable_backend().ready().await);
    }
}
