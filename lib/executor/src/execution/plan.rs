use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use fusion_query_planner::planner::plan_nodes::{
    PlanNode, PlanNodeKind, QueryPlan, REPRESENTATIONS_VARIABLE,
};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, instrument, warn, Instrument};

use crate::context::{ExecutionContext, MergeTarget};
use crate::execution::representations::collect_entity_targets;
use crate::executors::common::{SubgraphRequest, SubgraphResponse, SubgraphTransportBoxedArc};
use crate::executors::error::TransportError;
use crate::executors::map::SubgraphTransportMap;
use crate::projection::response::project_by_operation;
use crate::response::graphql_response::GraphQLResponse;

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Upper bound on subgraph requests in flight for one operation.
    pub max_concurrency: usize,
    /// Deadline for the whole operation; firing it cancels the operation.
    pub request_timeout: Option<Duration>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: None,
        }
    }
}

/// Executes a query plan and shapes the client response.
///
/// Transport failures never abort the operation: they become errors on the
/// fields the failed fetch owned, and independent fetches still complete.
pub async fn execute_query_plan(
    query_plan: &QueryPlan,
    variable_values: &Map<String, JsonValue>,
    transports: &SubgraphTransportMap,
    options: &ExecutionOptions,
    cancellation_token: &CancellationToken,
) -> GraphQLResponse {
    let variable_values = coerce_variable_values(query_plan, variable_values);
    let mut ctx = ExecutionContext::new();
    let executor = Executor::new(
        query_plan,
        &variable_values,
        transports,
        options,
        cancellation_token.clone(),
    );
    executor.execute(&mut ctx).await;

    let mut errors = ctx.errors;
    let data = project_by_operation(query_plan, &ctx.data, &mut errors);
    GraphQLResponse { data, errors }
}

/// Applies variable defaults declared by the operation.
fn coerce_variable_values(
    query_plan: &QueryPlan,
    variable_values: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut coerced = Map::new();
    for definition in &query_plan.variables {
        let value = variable_values
            .get(&definition.name)
            .or(definition.default_value.as_ref());
        if let Some(value) = value {
            coerced.insert(definition.name.clone(), value.clone());
        }
    }
    coerced
}

pub struct Executor<'a> {
    query_plan: &'a QueryPlan,
    variable_values: &'a Map<String, JsonValue>,
    transports: &'a SubgraphTransportMap,
    request_timeout: Option<Duration>,
    semaphore: Arc<Semaphore>,
    cancellation_token: CancellationToken,
}

struct FetchJob<'a> {
    node: &'a PlanNode,
    target: MergeTarget,
    result: Result<SubgraphResponse, TransportError>,
}

impl<'a> Executor<'a> {
    pub fn new(
        query_plan: &'a QueryPlan,
        variable_values: &'a Map<String, JsonValue>,
        transports: &'a SubgraphTransportMap,
        options: &ExecutionOptions,
        cancellation_token: CancellationToken,
    ) -> Self {
        Executor {
            query_plan,
            variable_values,
            transports,
            request_timeout: options.request_timeout,
            semaphore: Arc::new(Semaphore::new(options.max_concurrency.max(1))),
            cancellation_token,
        }
    }

    /// Runs the plan nodes in dependency order, dispatching every node as soon
    /// as all of its dependencies finished.
    #[instrument(level = "debug", skip_all, fields(nodes = self.query_plan.nodes.len()))]
    pub async fn execute(&self, ctx: &mut ExecutionContext) {
        let nodes = &self.query_plan.nodes;
        let mut remaining_dependencies: Vec<usize> =
            nodes.iter().map(|node| node.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![vec![]; nodes.len()];
        for node in nodes {
            for dependency in &node.depends_on {
                if let Some(entry) = dependents.get_mut(*dependency) {
                    entry.push(node.id);
                }
            }
        }

        let mut ready: VecDeque<usize> = self.query_plan.entry_nodes().collect();
        let mut jobs: FuturesUnordered<BoxFuture<'a, FetchJob<'a>>> = FuturesUnordered::new();
        let deadline = self
            .request_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        loop {
            while let Some(node_id) = ready.pop_front() {
                let Some(node) = self.query_plan.node(node_id) else {
                    continue;
                };
                match self.prepare_job(ctx, node) {
                    Some(job) => jobs.push(job),
                    None => release_dependents(
                        node_id,
                        &dependents,
                        &mut remaining_dependencies,
                        &mut ready,
                    ),
                }
            }

            let job = match deadline {
                Some(deadline) if !self.cancellation_token.is_cancelled() => {
                    tokio::select! {
                        job = jobs.next() => job,
                        _ = tokio::time::sleep_until(deadline) => {
                            warn!("request timeout reached, cancelling the operation");
                            self.cancellation_token.cancel();
                            continue;
                        }
                    }
                }
                _ => jobs.next().await,
            };
            let Some(job) = job else {
                break;
            };

            let node_id = job.node.id;
            self.process_job_result(ctx, job);
            release_dependents(
                node_id,
                &dependents,
                &mut remaining_dependencies,
                &mut ready,
            );
        }
    }

    /// Builds the request of a node from the data merged so far. Returns
    /// `None` when there is nothing to fetch.
    fn prepare_job(
        &self,
        ctx: &mut ExecutionContext,
        node: &'a PlanNode,
    ) -> Option<BoxFuture<'a, FetchJob<'a>>> {
        let mut variables = Map::new();
        for name in &node.variable_usages {
            if let Some(value) = self.variable_values.get(name) {
                variables.insert(name.clone(), value.clone());
            }
        }

        let target = match &node.kind {
            PlanNodeKind::Root => MergeTarget::Root,
            PlanNodeKind::Entity(entity) => {
                let targets = collect_entity_targets(&ctx.data, entity);
                if targets.is_empty() {
                    debug!(node = node.id, subgraph = %node.subgraph, "no entities to fetch");
                    return None;
                }
                let (paths, representations): (Vec<_>, Vec<_>) = targets
                    .into_iter()
                    .map(|target| (target.path, target.representation))
                    .unzip();
                variables.insert(
                    REPRESENTATIONS_VARIABLE.to_string(),
                    JsonValue::Array(representations),
                );
                MergeTarget::Entities(paths)
            }
        };

        if self.cancellation_token.is_cancelled() {
            ctx.record_failure(node, &target, &TransportError::Cancelled);
            return None;
        }

        let transport = self.transports.get(&node.subgraph).cloned();
        let semaphore = self.semaphore.clone();
        let cancellation_token = self.cancellation_token.clone();
        let span = debug_span!("fetch", node = node.id, subgraph = %node.subgraph);

        Some(
            async move {
                let result =
                    send_request(node, variables, transport, &semaphore, &cancellation_token)
                        .await;
                FetchJob {
                    node,
                    target,
                    result,
                }
            }
            .instrument(span)
            .boxed(),
        )
    }

    fn process_job_result(&self, ctx: &mut ExecutionContext, job: FetchJob<'a>) {
        match job.result {
            Ok(response) => ctx.merge_response(job.node, &job.target, response),
            Err(error) => {
                warn!(
                    node = job.node.id,
                    subgraph = %job.node.subgraph,
                    error = %error,
                    "subgraph fetch failed"
                );
                ctx.record_failure(job.node, &job.target, &error);
            }
        }
    }
}

fn release_dependents(
    node_id: usize,
    dependents: &[Vec<usize>],
    remaining_dependencies: &mut [usize],
    ready: &mut VecDeque<usize>,
) {
    let Some(node_dependents) = dependents.get(node_id) else {
        return;
    };
    for dependent in node_dependents {
        if let Some(remaining) = remaining_dependencies.get_mut(*dependent) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                ready.push_back(*dependent);
            }
        }
    }
}

async fn send_request(
    node: &PlanNode,
    variables: Map<String, JsonValue>,
    transport: Option<SubgraphTransportBoxedArc>,
    semaphore: &Semaphore,
    cancellation_token: &CancellationToken,
) -> Result<SubgraphResponse, TransportError> {
    let transport =
        transport.ok_or_else(|| TransportError::MissingTransport(node.subgraph.clone()))?;

    let _permit = tokio::select! {
        permit = semaphore.acquire() => permit.map_err(|_| TransportError::Cancelled)?,
        _ = cancellation_token.cancelled() => return Err(TransportError::Cancelled),
    };
    if cancellation_token.is_cancelled() {
        return Err(TransportError::Cancelled);
    }

    let request = SubgraphRequest {
        subgraph: &node.subgraph,
        operation_kind: node.operation_kind,
        query: &node.operation,
        variables,
    };
    debug!("dispatching subgraph request");

    tokio::select! {
        response = transport.send(request) => response,
        _ = cancellation_token.cancelled() => Err(TransportError::Cancelled),
    }
}
