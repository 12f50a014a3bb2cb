pub mod settings;

pub use settings::{ConfigError, EngineConfig, GitConfig, HistoryConfig, LoggingConfig, WatcherConfig};
