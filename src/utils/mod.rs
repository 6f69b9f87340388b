/// TOML-based configuration (quarry.toml).
pub mod toml_config;

pub use toml_config::{ConfigError, OutputFormat, QuarryConfig};
