use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::system;

/// One completed interaction, appended as a single JSON line. Records are
/// never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
    pub response_time_ms: u64,
    pub model: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_generated: Option<usize>,
    pub prompt_length: usize,
    pub response_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<usize>,
}

impl LogRecord {
    pub fn new(
        prompt: &str,
        response: &str,
        response_time_ms: u64,
        model: &str,
        stream: bool,
        tokens_generated: Option<usize>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            response_time_ms,
            model: model.to_string(),
            stream,
            tokens_generated,
            prompt_length: prompt.chars().count(),
            response_length: response.chars().count(),
            memory_usage_mb: system::process_memory_mb(),
            cpu_count: Some(system::cpu_count()),
        }
    }
}

/// Append-only JSONL writer shared by all request handlers. The mutex is the
/// process-wide serialization point that keeps concurrent completions from
/// interleaving partial lines. Write failures are reported on the tracing
/// channel and swallowed; logging must never fail a request.
pub struct InteractionLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl InteractionLogger {
    pub fn new(path: PathBuf) -> Self {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(err) = fs::create_dir_all(parent)
        {
            tracing::warn!(error = %err, dir = %parent.display(), "could not create log directory");
        }
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_dir_exists(&self) -> bool {
        self.path
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.exists())
            .unwrap_or(false)
    }

    pub fn log(&self, record: &LogRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "could not serialize log record");
                return;
            }
        };

        let _guard = self.write_lock.lock();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = result {
            tracing::warn!(error = %err, path = %self.path.display(), "failed to write interaction log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(prompt: &str) -> LogRecord {
        LogRecord::new(prompt, "a response", 12, "minivault-stubbed", false, Some(2))
    }

    #[test]
    fn creates_log_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/logs/log.jsonl");
        let logger = InteractionLogger::new(path.clone());
        assert!(path.parent().unwrap().exists());
        assert!(logger.log_dir_exists());
    }

    #[test]
    fn appends_one_parsable_line_per_record() {
        let dir = tempdir().unwrap();
        let logger = InteractionLogger::new(dir.path().join("log.jsonl"));

        for i in 0..5 {
            logger.log(&record(&format!("prompt {i}")));
        }

        let raw = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let parsed: LogRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.model, "minivault-stubbed");
            assert_eq!(parsed.response_length, "a response".chars().count());
        }
    }

    #[test]
    fn records_prompt_length_in_chars() {
        let dir = tempdir().unwrap();
        let logger = InteractionLogger::new(dir.path().join("log.jsonl"));
        logger.log(&record("What is AI?"));

        let raw = fs::read_to_string(logger.path()).unwrap();
        let parsed: LogRecord = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.prompt_length, 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_do_not_tear_lines() {
        let dir = tempdir().unwrap();
        let logger = Arc::new(InteractionLogger::new(dir.path().join("log.jsonl")));

        let mut handles = Vec::new();
        for i in 0..10 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                logger.log(&record(&format!("concurrent {i} {}", "x".repeat(500))));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let raw = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 10);
        for line in lines {
            serde_json::from_str::<LogRecord>(line).unwrap();
        }
    }

    #[test]
    fn write_failure_is_swallowed() {
        // Path whose parent is a file, so the append must fail.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let logger = InteractionLogger::new(blocker.join("log.jsonl"));
        logger.log(&record("still fine"));
    }
}
