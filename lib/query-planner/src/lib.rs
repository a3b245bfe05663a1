pub mod ast;
pub mod planner;
pub mod utils;

#[cfg(test)]
mod tests;

pub use planner::error::PlanningError;
pub use planner::plan_nodes::{EntityFetch, PathSegment, PlanNode, PlanNodeKind, QueryPlan};
pub use planner::projection::ProjectionField;
pub use planner::Planner;
pub use utils::cancellation::{CancellationError, CancellationToken};
pub use utils::pretty_display::PrettyDisplay;

use graphql_parser::query::Document;

/// Parses a client operation document.
pub fn parse_operation(source: &str) -> Result<Document<'static, String>, PlanningError> {
    Ok(graphql_parser::parse_query::<String>(source)?.into_static())
}
