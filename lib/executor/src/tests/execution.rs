use std::time::{Duration, Instant};

use serde_json::{json, Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::execution::plan::{execute_query_plan, ExecutionOptions};
use crate::executors::common::SubgraphResponse;
use crate::executors::error::TransportError;
use crate::executors::map::SubgraphTransportMap;
use crate::response::graphql_error::GraphQLError;
use crate::response::graphql_response::GraphQLResponse;
use crate::tests::testkit::{
    accounts, accounts_and_reviews, data, entities, init_logger, plan, plan_with_variables,
    reviews, variables, FakeSubgraph,
};

async fn execute(
    query_plan: &fusion_query_planner::QueryPlan,
    transports: &SubgraphTransportMap,
    options: &ExecutionOptions,
) -> GraphQLResponse {
    execute_query_plan(
        query_plan,
        &Map::new(),
        transports,
        options,
        &CancellationToken::new(),
    )
    .await
}

fn transports(accounts: &FakeSubgraph, reviews: &FakeSubgraph) -> SubgraphTransportMap {
    let mut map = SubgraphTransportMap::new();
    map.insert("Accounts", accounts.clone());
    map.insert("Reviews", reviews.clone());
    map
}

#[tokio::test]
async fn merges_entity_fields_from_another_subgraph() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let (accounts, reviews) = (accounts(), reviews());

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).expect("response serializes"),
        @r#"{"data":{"user":{"name":"Ada","reviews":[{"id":"10"}]}}}"#
    );
    assert_eq!(
        reviews.received()[0].variables["representations"],
        json!([{ "__typename": "User", "id": "1" }])
    );
}

#[tokio::test]
async fn client_alias_on_a_key_name_keeps_both_values() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { id: name reviews { id } } }"#);
    let accounts = FakeSubgraph::new(|_| data(json!({ "user": { "id": "Ada", "__key_id": "1" } })));
    let reviews = reviews();

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).expect("response serializes"),
        @r#"{"data":{"user":{"id":"Ada","reviews":[{"id":"10"}]}}}"#
    );
    assert_eq!(
        reviews.received()[0].variables["representations"],
        json!([{ "__typename": "User", "id": "1" }])
    );
}

#[tokio::test]
async fn failed_entity_fetch_nulls_only_its_fields() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let accounts = accounts();
    let reviews = FakeSubgraph::new(|_| {
        Err(TransportError::RequestTimeout(
            "Reviews".to_string(),
            Duration::from_millis(50),
        ))
    });

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    insta::assert_snapshot!(
        serde_json::to_string_pretty(&response).expect("response serializes"),
        @r#"
    {
      "data": {
        "user": {
          "name": "Ada",
          "reviews": null
        }
      },
      "errors": [
        {
          "message": "Request to subgraph \"Reviews\" timed out after 50ms",
          "path": [
            "user",
            "reviews"
          ],
          "extensions": {
            "code": "SUBGRAPH_REQUEST_FAILURE",
            "serviceName": "Reviews"
          }
        }
      ]
    }
    "#
    );
}

#[tokio::test]
async fn independent_fetches_survive_a_sibling_failure() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { username } reviews { id } }"#);
    let accounts = FakeSubgraph::new(|_| {
        Err(TransportError::RequestFailure(
            "Accounts".to_string(),
            "connection refused".to_string(),
        ))
    });
    let reviews = FakeSubgraph::new(|_| data(json!({ "reviews": [{ "id": "10" }] })));

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    assert_eq!(
        response.data,
        json!({ "user": null, "reviews": [{ "id": "10" }] })
    );
    assert_eq!(response.errors.len(), 1);
    let error = response
        .errors_at(&["user"])
        .next()
        .expect("error is located at user");
    assert_eq!(error.code(), Some("SUBGRAPH_REQUEST_FAILURE"));
    assert_eq!(
        error.message,
        "Failed to send request to subgraph \"Accounts\": connection refused"
    );
}

#[tokio::test]
async fn missing_transport_is_a_field_error() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let mut transports = SubgraphTransportMap::new();
    transports.insert("Accounts", accounts());

    let response = execute(&query_plan, &transports, &ExecutionOptions::default()).await;

    assert_eq!(
        response.data,
        json!({ "user": { "name": "Ada", "reviews": null } })
    );
    assert_eq!(
        response.errors[0].message,
        "No transport is registered for subgraph \"Reviews\""
    );
}

#[tokio::test]
async fn non_null_violation_bubbles_to_nullable_parent() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name } }"#);
    let accounts = FakeSubgraph::new(|_| data(json!({ "user": { "name": null } })));
    let reviews = reviews();

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).expect("response serializes"),
        @r#"{"data":{"user":null},"errors":[{"message":"Cannot return null for non-nullable field User.name.","path":["user","name"]}]}"#
    );
}

#[tokio::test]
async fn non_null_violation_without_nullable_ancestor_nulls_data() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, "{ users { name } }");
    let accounts =
        FakeSubgraph::new(|_| data(json!({ "users": [{ "name": "Ada" }, { "name": null }] })));
    let reviews = reviews();

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    assert_eq!(response.data, JsonValue::Null);
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors_at(&["users", "1", "name"]).next().is_some());
}

#[tokio::test]
async fn subgraph_errors_are_rerooted_and_tagged() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let accounts = accounts();
    let reviews = FakeSubgraph::new(|_| {
        let error: GraphQLError = serde_json::from_value(json!({
            "message": "reviews are unavailable",
            "path": ["_entities", 0, "reviews"]
        }))
        .expect("error deserializes");
        Ok(SubgraphResponse {
            data: Some(json!({ "_entities": [{ "reviews": null }] })),
            errors: Some(vec![error]),
        })
    });

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).expect("response serializes"),
        @r#"{"data":{"user":{"name":"Ada","reviews":null}},"errors":[{"message":"reviews are unavailable","path":["user","reviews"],"extensions":{"serviceName":"Reviews","code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );
}

#[tokio::test]
async fn entity_fetch_under_lists_merges_by_position() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, "{ reviews { body author { name } } }");
    let accounts = accounts();
    let reviews = FakeSubgraph::new(|_| {
        data(json!({
            "reviews": [
                { "body": "great", "author": { "id": "2" } },
                { "body": "anonymous", "author": null },
                { "body": "fine", "author": { "id": "1" } }
            ]
        }))
    });

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    assert_eq!(
        response.data,
        json!({
            "reviews": [
                { "body": "great", "author": { "name": "Grace" } },
                { "body": "anonymous", "author": null },
                { "body": "fine", "author": { "name": "Ada" } }
            ]
        })
    );
    assert!(response.errors.is_empty());
    assert_eq!(
        accounts.received()[0].variables["representations"],
        json!([
            { "__typename": "User", "id": "2" },
            { "__typename": "User", "id": "1" }
        ])
    );
}

#[tokio::test]
async fn entity_fetch_is_skipped_without_entities() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "404") { name reviews { id } } }"#);
    let accounts = FakeSubgraph::new(|_| data(json!({ "user": null })));
    let reviews = reviews();

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    assert_eq!(response.data, json!({ "user": null }));
    assert!(response.errors.is_empty());
    assert!(reviews.received().is_empty());
}

#[tokio::test]
async fn forwards_used_variables_with_defaults() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan_with_variables(
        &graph,
        r#"query ($id: ID = "1", $unused: String) { user(id: $id) { name } }"#,
        &Map::new(),
    );
    let accounts = accounts();
    let reviews = reviews();

    let response = execute_query_plan(
        &query_plan,
        &variables(json!({ "unused": "x" })),
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(response.data, json!({ "user": { "name": "Ada" } }));
    let received = accounts.received();
    assert_eq!(received[0].query, "query($id: ID) { user(id: $id) { name } }");
    assert_eq!(received[0].variables, variables(json!({ "id": "1" })));
}

#[tokio::test]
async fn mutations_run_one_after_another() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(
        &graph,
        r#"
        mutation {
          updateName(id: "1", name: "Grace") { name }
          addReview(authorId: "1", body: "x") { id }
        }
        "#,
    );
    let accounts = FakeSubgraph::new(|_| data(json!({ "updateName": { "name": "Grace" } })))
        .with_delay(Duration::from_millis(30));
    let reviews = FakeSubgraph::new(|_| data(json!({ "addReview": { "id": "11" } })));

    let started = Instant::now();
    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(
        response.data,
        json!({ "updateName": { "name": "Grace" }, "addReview": { "id": "11" } })
    );
    assert_eq!(query_plan.nodes[1].depends_on, vec![0]);
    assert_eq!(accounts.received().len(), 1);
    assert_eq!(reviews.received().len(), 1);
}

#[tokio::test]
async fn fan_out_is_bounded() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { username } reviews { id } }"#);
    let shared = FakeSubgraph::new(|request| {
        if request.query.contains("reviews") {
            data(json!({ "reviews": [] }))
        } else {
            data(json!({ "user": { "username": "ada" } }))
        }
    })
    .with_delay(Duration::from_millis(20));

    let response = execute(
        &query_plan,
        &transports(&shared, &shared),
        &ExecutionOptions {
            max_concurrency: 1,
            request_timeout: None,
        },
    )
    .await;

    assert_eq!(
        response.data,
        json!({ "user": { "username": "ada" }, "reviews": [] })
    );
    assert_eq!(shared.max_in_flight(), 1);
}

#[tokio::test]
async fn request_timeout_cancels_in_flight_fetches() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let accounts = accounts();
    let reviews = reviews().with_delay(Duration::from_secs(30));

    let started = Instant::now();
    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions {
            max_concurrency: 16,
            request_timeout: Some(Duration::from_millis(100)),
        },
    )
    .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        response.data,
        json!({ "user": { "name": "Ada", "reviews": null } })
    );
    let error = response
        .errors_at(&["user", "reviews"])
        .next()
        .expect("error is located at user.reviews");
    assert_eq!(error.code(), Some("OPERATION_CANCELLED"));
}

#[tokio::test]
async fn cancelled_operation_dispatches_nothing() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name } reviews { id } }"#);
    let accounts = accounts();
    let reviews = reviews();
    let token = CancellationToken::new();
    token.cancel();

    let response = execute_query_plan(
        &query_plan,
        &Map::new(),
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
        &token,
    )
    .await;

    // `reviews` is non-null, so the cancellation error nulls the whole response.
    assert_eq!(response.data, JsonValue::Null);
    assert!(accounts.received().is_empty());
    assert!(reviews.received().is_empty());
    assert_eq!(response.errors.len(), 2);
    assert!(response
        .errors
        .iter()
        .all(|error| error.code() == Some("OPERATION_CANCELLED")));
}

#[tokio::test]
async fn entities_resolver_ignores_unknown_ids() {
    init_logger();
    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, "{ reviews { author { name } } }");
    let accounts = FakeSubgraph::new(entities(|_| JsonValue::Null));
    let reviews = FakeSubgraph::new(|_| data(json!({ "reviews": [{ "author": { "id": "9" } }] })));

    let response = execute(
        &query_plan,
        &transports(&accounts, &reviews),
        &ExecutionOptions::default(),
    )
    .await;

    // `name` is non-null: the missing entity nulls its author.
    assert_eq!(response.data, json!({ "reviews": [{ "author": null }] }));
    assert!(response
        .errors_at(&["reviews", "0", "author", "name"])
        .next()
        .is_some());
}
