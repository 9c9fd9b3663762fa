use std::{convert::Infallible, sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    error::ServiceError,
    generator::{
        GenerateRequest, GenerateResponse, GenerationParams, GeneratorRegistry, ModelInfo,
        ResponseGenerator, into_chunks,
    },
    logging::{InteractionLogger, LogRecord},
    stats::{self, StatsSummary},
    system::{self, SystemInfo},
    validate::{validate_params, validate_prompt},
};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model id recorded when generation itself fails unexpectedly.
const ERROR_MODEL_ID: &str = "error";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<GeneratorRegistry>,
    pub logger: Arc<InteractionLogger>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    logs_directory: bool,
    api_version: &'static str,
    model_type: &'static str,
    model_loaded: bool,
    system_info: SystemInfo,
}

pub fn build_router(
    config: Arc<AppConfig>,
    registry: Arc<GeneratorRegistry>,
    logger: Arc<InteractionLogger>,
) -> Router {
    let state = AppState {
        config,
        registry,
        logger,
    };

    Router::new()
        .route("/", get(root))
        .route("/generate", post(generate))
        .route("/health", get(health))
        .route("/logs/stats", get(log_stats))
        .route("/models/info", get(model_info))
        .route("/models/reload", post(reload_model))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "MiniVault API",
        "version": API_VERSION,
        "endpoints": {
            "generate": "POST /generate",
            "health": "GET /health",
            "logs/stats": "GET /logs/stats",
            "models/info": "GET /models/info",
            "models/reload": "POST /models/reload",
        },
        "features": ["ollama_integration", "streaming_responses", "comprehensive_logging"],
    }))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ServiceError> {
    let started = Instant::now();
    let prompt = validate_prompt(&request.prompt)?;
    validate_params(request.max_tokens, request.temperature)?;

    let params = GenerationParams {
        max_tokens: request.max_tokens.unwrap_or(state.config.max_new_tokens),
        temperature: request.temperature.unwrap_or(state.config.temperature),
    };
    let generator = state.registry.active();

    if request.stream {
        let events = sse_events(state, generator, prompt, params, started);
        return Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response());
    }

    let response = generate_once(&state, generator, &prompt, params, started).await?;
    Ok(Json(response).into_response())
}

/// Non-streaming path: generate, log, build the wire response. An unexpected
/// generator failure is logged under the sentinel model id and surfaced as a
/// 500.
async fn generate_once(
    state: &AppState,
    generator: Arc<dyn ResponseGenerator>,
    prompt: &str,
    params: GenerationParams,
    started: Instant,
) -> Result<GenerateResponse, ServiceError> {
    match generator.generate(prompt, params).await {
        Ok(text) => {
            let response_time_ms = started.elapsed().as_millis() as u64;
            let tokens_generated = text.split_whitespace().count();
            state.logger.log(&LogRecord::new(
                prompt,
                &text,
                response_time_ms,
                generator.model_id(),
                false,
                Some(tokens_generated),
            ));
            Ok(GenerateResponse {
                response: text,
                model: generator.model_id().to_string(),
                response_time_ms,
                tokens_generated: Some(tokens_generated),
                model_info: Some(generator.info()),
            })
        }
        Err(err) => {
            let response_time_ms = started.elapsed().as_millis() as u64;
            let text = format!("Error generating response: {err}");
            state.logger.log(&LogRecord::new(
                prompt,
                &text,
                response_time_ms,
                ERROR_MODEL_ID,
                false,
                None,
            ));
            Err(ServiceError::Generation(err.to_string()))
        }
    }
}

/// Streaming path: numbered chunks as SSE data frames. The interaction is
/// logged on normal completion only; a client disconnect drops this stream
/// and abandons the record.
fn sse_events(
    state: AppState,
    generator: Arc<dyn ResponseGenerator>,
    prompt: String,
    params: GenerationParams,
    started: Instant,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut chunks = into_chunks(generator.generate_stream(prompt.clone(), params));
        let mut full = String::new();
        while let Some(chunk) = chunks.next().await {
            let is_final = chunk.is_final;
            if is_final {
                let response_time_ms = started.elapsed().as_millis() as u64;
                state.logger.log(&LogRecord::new(
                    &prompt,
                    &full,
                    response_time_ms,
                    generator.model_id(),
                    true,
                    chunk.total_tokens,
                ));
            } else {
                full.push_str(&chunk.token);
            }
            let data = serde_json::to_string(&chunk)
                .unwrap_or_else(|_| r#"{"error":"serialization failed"}"#.to_string());
            yield Ok(Event::default().data(data));
            if is_final {
                break;
            }
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        logs_directory: state.logger.log_dir_exists(),
        api_version: API_VERSION,
        model_type: state.registry.kind().as_str(),
        model_loaded: state.registry.model_loaded().await,
        system_info: system::snapshot(),
    })
}

async fn log_stats(State(state): State<AppState>) -> Result<Json<StatsSummary>, ServiceError> {
    Ok(Json(stats::compute_stats(&state.config.log_path)?))
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.registry.active().info())
}

async fn reload_model(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.registry.reload();
    Json(serde_json::json!({
        "status": status,
        "model_type": state.registry.kind().as_str(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn test_state() -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        let config = Arc::new(AppConfig::for_tests(dir.path()));
        let registry = Arc::new(GeneratorRegistry::initialize(config.clone()));
        let logger = Arc::new(InteractionLogger::new(config.log_path.clone()));
        (
            AppState {
                config,
                registry,
                logger,
            },
            dir,
        )
    }

    fn request(prompt: &str, stream: bool) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            stream,
            max_tokens: None,
            temperature: None,
        }
    }

    fn log_lines(state: &AppState) -> Vec<LogRecord> {
        let raw = fs::read_to_string(&state.config.log_path).unwrap_or_default();
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn generate_responds_and_logs() {
        let (state, _dir) = test_state();
        let generator = state.registry.active();
        let response = generate_once(
            &state,
            generator,
            "What is AI?",
            GenerationParams {
                max_tokens: 100,
                temperature: 0.7,
            },
            Instant::now(),
        )
        .await
        .unwrap();

        assert!(!response.response.is_empty());
        assert_eq!(response.model, "minivault-stubbed");
        assert_eq!(
            response.tokens_generated,
            Some(response.response.split_whitespace().count())
        );

        let records = log_lines(&state);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prompt_length, 11);
        assert!(!records[0].stream);

        let summary = stats::compute_stats(&state.config.log_path).unwrap();
        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.model_usage["minivault-stubbed"], 1);
    }

    #[tokio::test]
    async fn invalid_prompt_is_rejected_without_logging() {
        let (state, _dir) = test_state();
        let result = generate(
            State(state.clone()),
            Json(request("   ", false)),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(!state.config.log_path.exists());
    }

    #[tokio::test]
    async fn out_of_range_params_are_rejected() {
        let (state, _dir) = test_state();
        let mut req = request("hello", false);
        req.max_tokens = Some(5000);
        let result = generate(State(state.clone()), Json(req)).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(!state.config.log_path.exists());
    }

    #[tokio::test]
    async fn streaming_completion_logs_once() {
        let (state, _dir) = test_state();
        let generator = state.registry.active();
        let events: Vec<_> = sse_events(
            state.clone(),
            generator,
            "What is AI?".to_string(),
            GenerationParams {
                max_tokens: 100,
                temperature: 0.7,
            },
            Instant::now(),
        )
        .collect()
        .await;

        // Streamed at least one token chunk plus the final frame.
        assert!(events.len() >= 2);

        let records = log_lines(&state);
        assert_eq!(records.len(), 1);
        assert!(records[0].stream);
        assert_eq!(records[0].prompt_length, 11);
        assert!(!records[0].response.is_empty());
        assert_eq!(
            records[0].tokens_generated,
            Some(records[0].response.split_whitespace().count())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ten_concurrent_requests_log_ten_lines() {
        let (state, _dir) = test_state();

        let mut handles = Vec::new();
        for i in 0..10 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let generator = state.registry.active();
                generate_once(
                    &state,
                    generator,
                    &format!("Concurrent prompt number {i}"),
                    GenerationParams {
                        max_tokens: 100,
                        temperature: 0.7,
                    },
                    Instant::now(),
                )
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = log_lines(&state);
        assert_eq!(records.len(), 10);
        let summary = stats::compute_stats(&state.config.log_path).unwrap();
        assert_eq!(summary.total_requests, 10);
    }

    #[tokio::test]
    async fn stats_endpoint_zero_case() {
        let (state, _dir) = test_state();
        let Json(summary) = log_stats(State(state)).await.unwrap();
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.avg_response_time_ms, 0.0);
    }

    #[tokio::test]
    async fn health_reports_stub_loaded() {
        let (state, _dir) = test_state();
        let Json(body) = health(State(state)).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.model_type, "stubbed");
        assert!(body.model_loaded);
        assert!(body.logs_directory);
    }

    #[tokio::test]
    async fn reload_is_a_noop_for_the_stub() {
        let (state, _dir) = test_state();
        let Json(body) = reload_model(State(state)).await;
        assert_eq!(body["status"], "no_reload_needed");
        assert_eq!(body["model_type"], "stubbed");
    }
}
