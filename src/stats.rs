use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

use chrono::Utc;
use serde::Serialize;

use crate::{error::ServiceError, logging::LogRecord};

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,
    pub avg_memory_usage_mb: f64,
    pub total_tokens_generated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub avg_prompt_length: f64,
    pub last_24h_requests: u64,
    pub streaming_requests: u64,
    pub regular_requests: u64,
    pub model_usage: BTreeMap<String, u64>,
    pub performance_metrics: PerformanceMetrics,
}

/// Full-file scan of the interaction log. Runs with no exclusion against the
/// writer, so a torn final line is possible under concurrent appends; blank
/// and unparsable lines are skipped rather than treated as fatal. A missing
/// file yields the all-zero summary.
pub fn compute_stats(path: &Path) -> Result<StatsSummary, ServiceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StatsSummary::default()),
        Err(err) => return Err(ServiceError::Stats(err.to_string())),
    };

    let now = Utc::now();
    let mut summary = StatsSummary::default();
    let mut elapsed_sum: u64 = 0;
    let mut prompt_len_sum: u64 = 0;
    let mut memory_sum = 0.0;
    let mut memory_count: u64 = 0;
    let mut min_elapsed: Option<u64> = None;
    let mut max_elapsed: Option<u64> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<LogRecord>(line) else {
            continue;
        };

        summary.total_requests += 1;
        elapsed_sum += record.response_time_ms;
        prompt_len_sum += record.prompt_length as u64;

        if (now - record.timestamp).num_seconds() < DAY_SECS {
            summary.last_24h_requests += 1;
        }
        if record.stream {
            summary.streaming_requests += 1;
        } else {
            summary.regular_requests += 1;
        }
        *summary.model_usage.entry(record.model).or_insert(0) += 1;

        min_elapsed = Some(min_elapsed.map_or(record.response_time_ms, |m| {
            m.min(record.response_time_ms)
        }));
        max_elapsed = Some(max_elapsed.map_or(record.response_time_ms, |m| {
            m.max(record.response_time_ms)
        }));
        if let Some(mb) = record.memory_usage_mb {
            memory_sum += mb;
            memory_count += 1;
        }
        if let Some(tokens) = record.tokens_generated {
            summary.performance_metrics.total_tokens_generated += tokens as u64;
        }
    }

    if summary.total_requests > 0 {
        let total = summary.total_requests as f64;
        summary.avg_response_time_ms = round2(elapsed_sum as f64 / total);
        summary.avg_prompt_length = round2(prompt_len_sum as f64 / total);
    }
    summary.performance_metrics.min_response_time_ms = min_elapsed.unwrap_or(0);
    summary.performance_metrics.max_response_time_ms = max_elapsed.unwrap_or(0);
    if memory_count > 0 {
        summary.performance_metrics.avg_memory_usage_mb = round2(memory_sum / memory_count as f64);
    }

    Ok(summary)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
