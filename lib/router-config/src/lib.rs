mod env_overrides;
pub mod log;
pub mod query_planner;
pub mod traffic_shaping;

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;

use config::{Config, ConfigBuilder, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::env_overrides::{EnvVarOverrides, EnvVarOverridesError};
use crate::{
    log::LoggingConfig, query_planner::QueryPlannerConfig, traffic_shaping::TrafficShapingConfig,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FusionRouterConfig {
    /// The logger configuration.
    ///
    /// By default only important messages, warnings and errors are printed (`info`).
    #[serde(default)]
    pub log: LoggingConfig,

    /// Query planning configuration.
    #[serde(default)]
    pub query_planner: QueryPlannerConfig,

    /// Configuration for the traffic-shaping of the executor. Use these configurations to control
    /// how requests are being executed to subgraphs.
    #[serde(default)]
    pub traffic_shaping: TrafficShapingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "fusion.config.yaml",
    "fusion.config.yml",
    "fusion.config.json",
];

/// Loads the configuration from `override_config_path`, or from the first
/// `fusion.config.{yaml,yml,json}` found in the working directory, then applies
/// environment variable overrides. Without any file, defaults are used.
pub fn load_config(
    override_config_path: Option<String>,
) -> Result<FusionRouterConfig, RouterConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(RouterConfigError::ConfigPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    build(config, env_overrides)
}

/// Parses a YAML document, applying overrides from `env` (e.g. `LOG_LEVEL`).
pub fn parse_yaml_config(
    config_raw: &str,
    env: &HashMap<String, String>,
) -> Result<FusionRouterConfig, RouterConfigError> {
    let env_overrides = EnvVarOverrides::init_from_hashmap(env)?;
    let config = Config::builder().add_source(File::from_str(config_raw, FileFormat::Yaml));

    build(config, env_overrides)
}

fn build(
    config: ConfigBuilder<config::builder::DefaultState>,
    env_overrides: EnvVarOverrides,
) -> Result<FusionRouterConfig, RouterConfigError> {
    let config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<FusionRouterConfig>()?)
}
