use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

#[derive(Envconfig)]
pub struct EnvVarOverrides {
    // Logger overrides
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    // Traffic shaping overrides
    #[envconfig(from = "FUSION_MAX_CONCURRENCY")]
    pub max_concurrency: Option<u64>,
    #[envconfig(from = "FUSION_SUBGRAPH_TIMEOUT")]
    pub subgraph_timeout: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
    #[error("Invalid duration in {0}: {1}")]
    InvalidDuration(&'static str, humantime::DurationError),
    #[error("{0} must be greater than zero")]
    ZeroConcurrency(&'static str),
}

impl EnvVarOverrides {
    pub fn apply_overrides<T: BuilderState>(
        mut self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        if let Some(log_level) = self.log_level.take() {
            debug!("[config-override] 'log.level' = {:?}", log_level);
            config = config.set_override("log.level", log_level.as_str())?;
        }
        if let Some(log_format) = self.log_format.take() {
            debug!("[config-override] 'log.format' = {:?}", log_format);
            config = config.set_override("log.format", log_format.as_str())?;
        }
        if let Some(log_filter) = self.log_filter.take() {
            debug!("[config-override] 'log.filter' = {:?}", log_filter);
            config = config.set_override("log.filter", log_filter)?;
        }

        if let Some(max_concurrency) = self.max_concurrency.take() {
            if max_concurrency == 0 {
                return Err(EnvVarOverridesError::ZeroConcurrency(
                    "FUSION_MAX_CONCURRENCY",
                ));
            }
            debug!(
                "[config-override] 'traffic_shaping.max_concurrency' = {}",
                max_concurrency
            );
            config = config.set_override("traffic_shaping.max_concurrency", max_concurrency)?;
        }
        if let Some(subgraph_timeout) = self.subgraph_timeout.take() {
            humantime::parse_duration(&subgraph_timeout).map_err(|err| {
                EnvVarOverridesError::InvalidDuration("FUSION_SUBGRAPH_TIMEOUT", err)
            })?;
            debug!(
                "[config-override] 'traffic_shaping.subgraph_timeout' = {}",
                subgraph_timeout
            );
            config = config.set_override("traffic_shaping.subgraph_timeout", subgraph_timeout)?;
        }

        Ok(config)
    }
}
