//! Bridge configuration: schema, loading, validation and environment overrides.

mod defaults;
mod duration_format;
mod error;
mod loader;
mod schema;

pub use defaults::{
    ACTIVITY_LOG_FILE, DEFAULT_MAX_LINE_BYTES, ENV_CONFIG_PATH, ENV_DEBUG, ENV_TRANSLATE_PATHS,
    EnvOverrides, parse_flag,
};
pub use duration_format::parse_duration;
pub use error::{ConfigError, ValidationWarning};
pub use loader::{
    ConfigSource, ValidationResult, default_config_paths, find_config_file, load, load_config,
    validate,
};
pub use schema::{BridgeSettings, Config, ServerEntry, ServerTable};
