use std::sync::Arc;

use fusion_composition::FusionGraph;
use serde_json::Map;

use crate::planner::error::PlanningError;
use crate::planner::Planner;
use crate::tests::testkit::{
    accounts_and_reviews, compose_graph, init_logger, plan, subgraph, REVIEWS_SCHEMA,
};
use crate::utils::cancellation::{CancellationError, CancellationToken};

fn reviews_and_ratings() -> Arc<FusionGraph> {
    compose_graph(&[
        subgraph("Reviews", REVIEWS_SCHEMA),
        subgraph(
            "Ratings",
            r#"
            type Query { topScore: Int }
            type Review { score: Int }
            "#,
        ),
    ])
}

#[test]
fn fields_without_a_reachable_subgraph_are_unresolvable() {
    init_logger();
    let graph = reviews_and_ratings();
    let result = plan(&graph, "{ reviews { id score } }");

    let error = result.unwrap_err();
    insta::assert_snapshot!(error, @r###"field "Review.score" cannot be resolved: no subgraph resolving it accepts an entity key that "Reviews" provides"###);
}

#[test]
fn internal_key_aliases_must_stay_free() {
    init_logger();
    let graph = accounts_and_reviews();
    let result = plan(
        &graph,
        r#"{ user(id: "1") { id: name __key_id: username reviews { id } } }"#,
    );

    assert_eq!(
        result,
        Err(PlanningError::KeyFieldConflict {
            type_name: "User".to_string(),
            field_name: "id".to_string(),
        })
    );
}

#[test]
fn unknown_fields_are_rejected() {
    init_logger();
    let graph = accounts_and_reviews();
    let result = plan(&graph, r#"{ user(id: "1") { email } }"#);

    assert_eq!(
        result,
        Err(PlanningError::UnknownField {
            type_name: "User".to_string(),
            field_name: "email".to_string(),
        })
    );
}

#[test]
fn selections_must_match_field_types() {
    init_logger();
    let graph = accounts_and_reviews();

    let result = plan(&graph, r#"{ user(id: "1") }"#);
    assert!(matches!(result, Err(PlanningError::InvalidSelection { .. })));

    let result = plan(&graph, r#"{ user(id: "1") { name { first } } }"#);
    assert!(matches!(result, Err(PlanningError::InvalidSelection { .. })));
}

#[test]
fn undefined_variables_are_rejected() {
    init_logger();
    let graph = accounts_and_reviews();
    let result = plan(&graph, "{ user(id: $id) { name } }");

    assert_eq!(
        result,
        Err(PlanningError::UndefinedVariable("id".to_string()))
    );
}

#[test]
fn subscriptions_are_not_supported() {
    init_logger();
    let graph = accounts_and_reviews();
    let result = plan(&graph, "subscription { reviews { id } }");

    assert_eq!(
        result,
        Err(PlanningError::UnsupportedOperation("subscription".to_string()))
    );
}

#[test]
fn operation_selection() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let graph = accounts_and_reviews();
    let planner = Planner::new(graph);
    let document = crate::parse_operation(
        r#"
        query Users { users { name } }
        query Reviews { reviews { id } }
        "#,
    )?;
    let token = CancellationToken::new();

    assert_eq!(
        planner.plan(&document, None, &Map::new(), &token),
        Err(PlanningError::AmbiguousOperation)
    );
    assert_eq!(
        planner.plan(&document, Some("Other"), &Map::new(), &token),
        Err(PlanningError::UnknownOperation("Other".to_string()))
    );

    let query_plan = planner.plan(&document, Some("Reviews"), &Map::new(), &token)?;
    assert_eq!(query_plan.nodes[0].subgraph, "Reviews");

    Ok(())
}

#[test]
fn cancelled_planning_stops() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let planner = Planner::new(accounts_and_reviews());
    let document = crate::parse_operation(r#"{ user(id: "1") { name } }"#)?;

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(
        planner.plan(&document, None, &Map::new(), &token),
        Err(PlanningError::Cancelled(CancellationError::Cancelled))
    );

    let token = CancellationToken::with_timeout(std::time::Duration::ZERO);
    assert_eq!(
        planner.plan(&document, None, &Map::new(), &token),
        Err(PlanningError::Cancelled(CancellationError::TimedOut))
    );

    Ok(())
}

#[test]
fn invalid_documents_are_reported() {
    assert!(matches!(
        crate::parse_operation("{ user("),
        Err(PlanningError::InvalidDocument(_))
    ));
}
