mod backend;
mod registry;
mod stub;
mod types;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

pub use backend::OllamaBackend;
pub use registry::GeneratorRegistry;
pub use stub::{Category, StubGenerator, categorize};
pub use types::{GenerateRequest, GenerateResponse, GenerationParams, ModelInfo, StreamChunk};

use crate::error::ServiceError;

/// A source of generated text, either the external Ollama backend or the
/// deterministic stub. Backend unavailability never surfaces through this
/// trait: both operations degrade to fallback text internally. An `Err` from
/// `generate` means a genuinely unexpected internal failure.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    fn info(&self) -> ModelInfo;

    /// Whether the underlying model is reachable. Used by the health check.
    async fn ready(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, params: GenerationParams)
    -> Result<String, ServiceError>;

    /// Lazy, finite, non-restartable token sequence for the same prompt.
    fn generate_stream(&self, prompt: String, params: GenerationParams)
    -> BoxStream<'static, String>;
}

/// Number the raw token stream into wire chunks: ids from 0 with no gaps,
/// terminated by exactly one final chunk carrying an empty token and the
/// whitespace-token count of the accumulated text.
pub fn into_chunks(tokens: BoxStream<'static, String>) -> BoxStream<'static, StreamChunk> {
    Box::pin(async_stream::stream! {
        let mut tokens = tokens;
        let mut chunk_id: u64 = 0;
        let mut full = String::new();
        while let Some(token) = tokens.next().await {
            full.push_str(&token);
            yield StreamChunk {
                token,
                chunk_id,
                is_final: false,
                total_tokens: None,
            };
            chunk_id += 1;
        }
        yield StreamChunk {
            token: String::new(),
            chunk_id,
            is_final: true,
            total_tokens: Some(full.split_whitespace().count()),
        };
    })
}

/// Split `text` into per-word stream tokens whose concatenation reproduces the
/// whitespace-normalized text: the first word bare, every later word prefixed
/// with a single space.
pub(crate) fn word_tokens(text: &str, cap: Option<usize>) -> Vec<String> {
    let words = text.split_whitespace();
    let words: Vec<&str> = match cap {
        Some(cap) => words.take(cap).collect(),
        None => words.collect(),
    };
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                (*word).to_string()
            } else {
                format!(" {word}")
            }
        })
        .collect()
}
