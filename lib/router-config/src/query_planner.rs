use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueryPlannerConfig {
    /// The maximum time for the query planner to create an execution plan.
    /// When the timeout is reached, planning is cancelled and the operation fails.
    ///
    /// Default: 10s.
    #[serde(
        default = "default_query_planning_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "String")]
    pub timeout: Duration,
}

impl Default for QueryPlannerConfig {
    fn default() -> Self {
        Self {
            timeout: default_query_planning_timeout(),
        }
    }
}

fn default_query_planning_timeout() -> Duration {
    Duration::from_secs(10)
}
