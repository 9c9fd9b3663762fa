use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Which generator variant the process runs with, fixed at startup
/// (changeable only through `POST /models/reload`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Stubbed,
    Ollama,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Stubbed => "stubbed",
            GeneratorKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub generator: GeneratorKind,
    pub ollama_host: String,
    pub ollama_model: String,
    pub log_path: PathBuf,
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub backend_timeout: Duration,
    pub stream_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8000".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

        let generator = match env::var("MODEL_TYPE").as_deref() {
            Ok("ollama") => GeneratorKind::Ollama,
            _ => GeneratorKind::Stubbed,
        };

        let ollama_host =
            env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://ollama:11434".to_string());
        let ollama_model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:1b".to_string());

        let log_path =
            PathBuf::from(env::var("LOG_PATH").unwrap_or_else(|_| "logs/log.jsonl".to_string()));

        let max_new_tokens = env::var("MAX_NEW_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let temperature = env::var("TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7);

        let backend_timeout = env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));
        let stream_delay = env::var("STREAM_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(50));

        Ok(Self {
            listen_addr,
            generator,
            ollama_host,
            ollama_model,
            log_path,
            max_new_tokens,
            temperature,
            backend_timeout,
            stream_delay,
        })
    }
}

#[cfg(test)]
impl AppConfig {
    /// Config suitable for tests: stub generator, no pacing, log path under `dir`.
    pub fn for_tests(dir: &std::path::Path) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            generator: GeneratorKind::Stubbed,
            ollama_host: "http://127.0.0.1:1".to_string(),
            ollama_model: "llama3.2:1b".to_string(),
            log_path: dir.join("log.jsonl"),
            max_new_tokens: 100,
            temperature: 0.7,
            backend_timeout: Duration::from_millis(250),
            stream_delay: Duration::ZERO,
        }
    }
}
