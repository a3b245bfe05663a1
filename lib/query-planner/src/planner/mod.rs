use std::sync::Arc;

use fusion_composition::FusionGraph;
use graphql_parser::query;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use crate::ast::normalize::normalize_operation;
use crate::ast::operation::NormalizedOperation;
use crate::utils::cancellation::CancellationToken;

mod builder;
pub mod error;
pub mod plan_nodes;
pub mod projection;

use builder::PlanBuilder;
use error::PlanningError;
use plan_nodes::QueryPlan;

/// Plans client operations against a composed fusion graph.
///
/// Planning is deterministic: the same graph, document and variables always
/// produce the same plan.
#[derive(Debug, Clone)]
pub struct Planner {
    graph: Arc<FusionGraph>,
}

impl Planner {
    pub fn new(graph: Arc<FusionGraph>) -> Self {
        Planner { graph }
    }

    pub fn graph(&self) -> &FusionGraph {
        &self.graph
    }

    #[instrument(level = "debug", skip_all, fields(operation_name = ?operation_name))]
    pub fn plan(
        &self,
        document: &query::Document<'_, String>,
        operation_name: Option<&str>,
        variables: &Map<String, JsonValue>,
        cancellation_token: &CancellationToken,
    ) -> Result<QueryPlan, PlanningError> {
        let operation = normalize_operation(
            &self.graph,
            document,
            operation_name,
            variables,
            cancellation_token,
        )?;

        self.plan_normalized_operation(&operation, cancellation_token)
    }

    pub fn plan_normalized_operation(
        &self,
        operation: &NormalizedOperation,
        cancellation_token: &CancellationToken,
    ) -> Result<QueryPlan, PlanningError> {
        let plan = PlanBuilder::new(&self.graph, operation, cancellation_token).build()?;
        debug!(
            kind = %plan.operation_kind,
            nodes = plan.nodes.len(),
            "query plan built"
        );

        Ok(plan)
    }
}
