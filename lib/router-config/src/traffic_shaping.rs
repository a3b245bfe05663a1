use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrafficShapingConfig {
    /// Upper bound on subgraph requests in flight for one operation.
    ///
    /// Can also be set via the `FUSION_MAX_CONCURRENCY` environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout applied to every single subgraph request.
    ///
    /// Can also be set via the `FUSION_SUBGRAPH_TIMEOUT` environment variable.
    #[serde(
        default = "default_subgraph_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "String")]
    pub subgraph_timeout: Duration,

    /// Deadline for executing a whole operation. When it fires, fetches that did not start
    /// are skipped and in-flight ones are cancelled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    #[schemars(with = "Option<String>")]
    pub request_timeout: Option<Duration>,
}

impl Default for TrafficShapingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            subgraph_timeout: default_subgraph_timeout(),
            request_timeout: None,
        }
    }
}

fn default_max_concurrency() -> usize {
    16
}

fn default_subgraph_timeout() -> Duration {
    Duration::from_secs(30)
}
