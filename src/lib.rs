pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod server;
pub mod stats;
pub mod system;
pub mod validate;

pub use config::{AppConfig, GeneratorKind};
pub use generator::{GenerateRequest, GenerateResponse, GeneratorRegistry, StreamChunk};
pub use logging::{InteractionLogger, LogRecord};
pub use server::build_router;
pub use stats::StatsSummary;
