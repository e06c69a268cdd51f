//! Configuration loading and validation.
//!
//! Loading never fails because a file is absent: the bridge must come up
//! with built-in defaults when nothing is configured. It does fail on a file
//! that exists but cannot be parsed, since silently ignoring a broken file
//! would launch the wrong backend.

use std::path::{Path, PathBuf};

use super::defaults::{DEFAULT_MAX_LINE_BYTES, ENV_CONFIG_PATH, EnvOverrides};
use super::error::{ConfigError, ValidationWarning};
use super::schema::{Config, ServerEntry};

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Outcome of validation: the warnings found, if any.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Configuration file search paths below the explicit flag, in priority order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.is_empty() {
            paths.push(PathBuf::from(path));
        }
    }

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("isobridge").join("bridge.json"));
    }

    paths
}

/// Find the config file to load.
///
/// An explicit path must exist. Otherwise the first existing search path is
/// returned, or `None` when none exists.
pub fn find_config_file(
    explicit_path: Option<&Path>,
    search_paths: &[PathBuf],
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(search_paths.iter().find(|p| p.is_file()).cloned())
}

/// Read and parse one config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, path)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Resolve, load and apply environment overrides.
pub fn load(
    explicit_path: Option<&Path>,
    env: &EnvOverrides,
) -> Result<(Config, ConfigSource), ConfigError> {
    let found = find_config_file(explicit_path, &default_config_paths())?;

    let (mut config, source) = match found {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration file");
            (load_config(&path)?, ConfigSource::File(path))
        }
        None => {
            tracing::debug!("no configuration file found, using built-in defaults");
            (Config::default(), ConfigSource::Defaults)
        }
    };

    config.apply_env(env);
    Ok((config, source))
}

impl Config {
    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(debug) = env.debug {
            self.bridge.debug = debug;
        }
        if let Some(translate) = env.translate_paths {
            self.bridge.translate_paths = translate;
        }
    }

    /// The backend to launch: the first defined server, or the built-in default.
    pub fn selected_server(&self) -> ServerEntry {
        self.servers
            .first()
            .cloned()
            .unwrap_or_else(ServerEntry::builtin_default)
    }

    /// Line limit with a zero setting mapped back to the default.
    pub fn max_line_bytes(&self) -> usize {
        match self.bridge.max_line_bytes {
            0 => DEFAULT_MAX_LINE_BYTES,
            n => n,
        }
    }
}

/// Check a loaded configuration for suspicious but non-fatal settings.
pub fn validate(config: &Config) -> ValidationResult {
    let mut warnings = Vec::new();

    if config.servers.is_empty() {
        warnings.push(ValidationWarning::NoServersDefined);
    } else if config.servers.len() > 1 {
        let mut names = config.servers.names().map(str::to_string);
        if let Some(used) = names.next() {
            warnings.push(ValidationWarning::ExtraServersIgnored {
                used,
                ignored: names.collect(),
            });
        }
    }

    let server = config.selected_server();
    if server.command.trim().is_empty() {
        warnings.push(ValidationWarning::EmptyCommand {
            server: server.name.clone(),
        });
    } else if looks_like_path(&server.command) && !Path::new(&server.command).exists() {
        warnings.push(ValidationWarning::CommandPathMissing {
            server: server.name.clone(),
            command: server.command.clone(),
        });
    }

    if config.bridge.terminate_grace.is_zero() {
        warnings.push(ValidationWarning::ZeroTerminateGrace);
    }
    if config.bridge.max_line_bytes == 0 {
        warnings.push(ValidationWarning::ZeroMaxLineBytes);
    }

    ValidationResult { warnings }
}

fn looks_like_path(command: &str) -> bool {
    command.contains('/') || command.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = find_config_file(Some(&missing), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_search_paths_skip_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("bridge.json");
        std::fs::write(&present, "{}").unwrap();
        let paths = vec![dir.path().join("absent.json"), present.clone()];
        assert_eq!(find_config_file(None, &paths).unwrap(), Some(present));
    }

    #[test]
    fn test_no_file_found() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("absent.json")];
        assert_eq!(find_config_file(None, &paths).unwrap(), None);
    }

    #[test]
    fn test_load_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"cat": {"command": "cat"}}, "bridge": {"terminate_grace": "2s"}}"#,
        )
        .unwrap();

        let (config, source) = load(Some(&path), &EnvOverrides::default()).unwrap();
        assert_eq!(source, ConfigSource::File(path));
        assert_eq!(config.selected_server().command, "cat");
        assert_eq!(config.bridge.terminate_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config: Config =
            serde_json::from_str(r#"{"bridge": {"debug": false, "translate_paths": true}}"#)
                .unwrap();
        config.apply_env(&EnvOverrides {
            debug: Some(true),
            translate_paths: Some(false),
        });
        assert!(config.bridge.debug);
        assert!(!config.bridge.translate_paths);
    }

    #[test]
    fn test_selected_server_falls_back_to_builtin() {
        let config = Config::default();
        assert_eq!(config.selected_server(), ServerEntry::builtin_default());
    }

    #[test]
    fn test_validate_empty_servers_warns() {
        let result = validate(&Config::default());
        assert!(result.warnings.contains(&ValidationWarning::NoServersDefined));
    }

    #[test]
    fn test_validate_extra_servers_warns() {
        let config: Config = serde_json::from_str(
            r#"{"mcpServers": {"a": {"command": "cat"}, "b": {"command": "cat"}, "c": {"command": "cat"}}}"#,
        )
        .unwrap();
        let result = validate(&config);
        assert!(result.warnings.contains(&ValidationWarning::ExtraServersIgnored {
            used: "a".to_string(),
            ignored: vec!["b".to_string(), "c".to_string()],
        }));
    }

    #[test]
    fn test_validate_missing_command_path_and_zero_grace() {
        let config: Config = serde_json::from_str(
            r#"{
                "mcpServers": {"x": {"command": "/definitely/not/here/server"}},
                "bridge": {"terminate_grace": "0s", "max_line_bytes": 0}
            }"#,
        )
        .unwrap();
        let result = validate(&config);
        assert!(!result.is_clean());
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            ValidationWarning::CommandPathMissing { server, .. } if server == "x"
        )));
        assert!(result.warnings.contains(&ValidationWarning::ZeroTerminateGrace));
        assert!(result.warnings.contains(&ValidationWarning::ZeroMaxLineBytes));
        assert_eq!(config.max_line_bytes(), DEFAULT_MAX_LINE_BYTES);
    }

    #[test]
    fn test_validate_clean_config() {
        let config: Config =
            serde_json::from_str(r#"{"mcpServers": {"cat": {"command": "cat"}}}"#).unwrap();
        assert!(validate(&config).is_clean());
    }
}
