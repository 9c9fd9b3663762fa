use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_false() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_false")]
    pub stream: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub response: String,
    pub model: String,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_generated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// One frame of a streamed generation. Chunk ids start at 0 and increase
/// without gaps; exactly one chunk has `is_final` set, it is always last,
/// carries an empty token and the total whitespace-token count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub token: String,
    pub chunk_id: u64,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<usize>,
}

/// Request knobs resolved against config defaults before generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub model_name: String,
    pub loaded_at: DateTime<Utc>,
    pub status: String,
    pub capabilities: Vec<String>,
}
