//! Configuration Loader
//!
//! Layered loading with the `config` crate, lowest precedence first:
//!
//! 1. Built-in defaults ([`TaskerExecutorConfig::default`])
//! 2. A TOML file: `TASKER_CONFIG_PATH`, else `config/tasker-executor.toml` if present
//! 3. `TASKER__SECTION__KEY` environment variables (e.g. `TASKER__EXECUTOR__POLL_INTERVAL_MS`)
//! 4. Container-style variables: `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`,
//!    `POSTGRES_USER`, `POSTGRES_PASSWORD`, and `{NAMESPACE}_POSTGRES_HOST` per
//!    dashboard namespace
//!
//! The environment is captured once into a map so loading is deterministic
//! and testable without mutating the process environment.

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{ConfigResult, ConfigurationError};
use super::TaskerExecutorConfig;

const ENV_PREFIX: &str = "TASKER";
const ENV_SEPARATOR: &str = "__";
const CONFIG_PATH_VAR: &str = "TASKER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/tasker-executor.toml";

/// Container-style variables and the configuration keys they override
const LEGACY_DATABASE_VARS: &[(&str, &str)] = &[
    ("POSTGRES_HOST", "database.host"),
    ("POSTGRES_PORT", "database.port"),
    ("POSTGRES_DB", "database.database"),
    ("POSTGRES_USER", "database.username"),
    ("POSTGRES_PASSWORD", "database.password"),
];

/// Loaded configuration plus the context it was loaded in
#[derive(Debug)]
pub struct ConfigManager {
    config: TaskerExecutorConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the process environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(env)
    }

    /// Load configuration from an explicit environment map
    pub fn load_with_env(env: HashMap<String, String>) -> ConfigResult<Arc<ConfigManager>> {
        let explicit = env.get(CONFIG_PATH_VAR).map(PathBuf::from);
        let (config_path, required) = match explicit {
            Some(path) => (Some(path), true),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    (Some(default_path), false)
                } else {
                    (None, false)
                }
            }
        };

        let config = Self::build(config_path.as_deref(), required, &env)?;
        let environment = Self::detect_environment(&env);

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path,
        }))
    }

    /// Load configuration from a specific file with an explicit environment map
    pub fn load_from_file(
        path: &Path,
        env: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config = Self::build(Some(path), true, &env)?;
        let environment = Self::detect_environment(&env);

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path: Some(path.to_path_buf()),
        }))
    }

    pub fn config(&self) -> &TaskerExecutorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Sanitized configuration for log output
    pub fn debug_config(&self) -> serde_json::Value {
        self.config.sanitized()
    }

    fn build(
        path: Option<&Path>,
        required: bool,
        env: &HashMap<String, String>,
    ) -> ConfigResult<TaskerExecutorConfig> {
        let defaults = Config::try_from(&TaskerExecutorConfig::default())
            .map_err(|e| ConfigurationError::source_error("defaults", e))?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        for (var, key) in LEGACY_DATABASE_VARS {
            builder = builder.set_override_option(*key, env.get(*var).cloned())?;
        }

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults and environment".to_string());

        let mut config: TaskerExecutorConfig = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| ConfigurationError::source_error(source_name, e))?;

        Self::apply_namespace_host_overrides(&mut config, env);
        config.validate()?;

        Ok(config)
    }

    /// `MASTER_POSTGRES_HOST` overrides the host of namespace `master`, and so on.
    fn apply_namespace_host_overrides(
        config: &mut TaskerExecutorConfig,
        env: &HashMap<String, String>,
    ) {
        for namespace in &mut config.dashboard.namespaces {
            let var = format!("{}_POSTGRES_HOST", namespace.name.to_uppercase());
            if let Some(host) = env.get(&var) {
                namespace.host = host.clone();
            }
        }
    }

    fn detect_environment(env: &HashMap<String, String>) -> String {
        env.get("TASKER_ENV")
            .or_else(|| env.get("APP_ENV"))
            .cloned()
            .unwrap_or_else(|| "development".to_string())
    }
}
