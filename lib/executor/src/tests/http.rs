use std::time::Duration;

use fusion_query_planner::ast::operation::OperationKind;
use mockito::Matcher;
use serde_json::{json, Map};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::execution::plan::{execute_query_plan, ExecutionOptions};
use crate::executors::common::{SubgraphRequest, SubgraphTransport};
use crate::executors::error::TransportError;
use crate::executors::map::SubgraphTransportMap;
use crate::tests::testkit::{
    accounts_and_reviews, init_logger, plan, subgraph, variables, ACCOUNTS_SCHEMA, REVIEWS_SCHEMA,
};

fn request<'a>(query: &'a str) -> SubgraphRequest<'a> {
    SubgraphRequest {
        subgraph: "Accounts",
        operation_kind: OperationKind::Query,
        query,
        variables: variables(json!({ "id": "1" })),
    }
}

fn accounts_map(base_address: &str, timeout: Option<Duration>) -> SubgraphTransportMap {
    SubgraphTransportMap::from_subgraph_configurations(
        &[subgraph("Accounts", ACCOUNTS_SCHEMA, base_address)],
        timeout,
    )
    .expect("transport builds")
}

#[tokio::test]
async fn posts_query_and_variables_as_json() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_header("content-type", "application/json; charset=utf-8")
        .match_body(Matcher::Json(json!({
            "query": "query($id: ID!) { user(id: $id) { name } }",
            "variables": { "id": "1" }
        })))
        .with_status(200)
        .with_body(r#"{"data":{"user":{"name":"Ada"}}}"#)
        .create_async()
        .await;

    let transports = accounts_map(&format!("{}/graphql", server.url()), None);
    let transport = transports.get("Accounts").expect("transport is registered");
    let response = transport
        .send(request("query($id: ID!) { user(id: $id) { name } }"))
        .await
        .expect("request succeeds");

    mock.assert_async().await;
    assert_eq!(response.data, Some(json!({ "user": { "name": "Ada" } })));
    assert_eq!(response.errors, None);
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let transports = accounts_map(&format!("{}/graphql", server.url()), None);
    let transport = transports.get("Accounts").expect("transport is registered");
    let result = transport.send(request("{ users { id } }")).await;

    assert_eq!(
        result,
        Err(TransportError::UnexpectedStatus("Accounts".to_string(), 502))
    );
}

#[tokio::test]
async fn non_graphql_body_is_a_transport_error() {
    init_logger();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;
    server
        .mock("POST", "/empty")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let transports = accounts_map(&format!("{}/graphql", server.url()), None);
    let transport = transports.get("Accounts").expect("transport is registered");
    let result = transport.send(request("{ users { id } }")).await;
    assert!(matches!(result, Err(TransportError::InvalidResponse(name, _)) if name == "Accounts"));

    let transports = accounts_map(&format!("{}/empty", server.url()), None);
    let transport = transports.get("Accounts").expect("transport is registered");
    let result = transport.send(request("{ users { id } }")).await;
    assert_eq!(
        result,
        Err(TransportError::InvalidResponse(
            "Accounts".to_string(),
            "response has neither data nor errors".to_string()
        ))
    );
}

#[tokio::test]
async fn subgraph_timeout_bounds_each_call() {
    init_logger();
    // Accepts connections and never answers.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener binds");
    let address = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        let mut connections = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            connections.push(socket);
        }
    });

    let transports = accounts_map(
        &format!("http://{}/graphql", address),
        Some(Duration::from_millis(100)),
    );
    let transport = transports.get("Accounts").expect("transport is registered");
    let result = transport.send(request("{ users { id } }")).await;

    assert_eq!(
        result,
        Err(TransportError::RequestTimeout(
            "Accounts".to_string(),
            Duration::from_millis(100)
        ))
    );
}

#[tokio::test]
async fn invalid_endpoint_is_rejected() {
    let result = SubgraphTransportMap::from_subgraph_configurations(
        &[subgraph("Accounts", ACCOUNTS_SCHEMA, "not a uri")],
        None,
    );

    assert!(matches!(
        result,
        Err(TransportError::EndpointParseFailure(endpoint, _)) if endpoint == "not a uri"
    ));
}

#[tokio::test]
async fn executes_a_plan_over_http() {
    init_logger();
    let mut accounts_server = mockito::Server::new_async().await;
    let mut reviews_server = mockito::Server::new_async().await;
    accounts_server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"data":{"user":{"name":"Ada","id":"1"}}}"#)
        .create_async()
        .await;
    reviews_server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJson(json!({
            "variables": { "representations": [{ "__typename": "User", "id": "1" }] }
        })))
        .with_status(200)
        .with_body(r#"{"data":{"_entities":[{"reviews":[{"id":"10"}]}]}}"#)
        .create_async()
        .await;

    let graph = accounts_and_reviews();
    let query_plan = plan(&graph, r#"{ user(id: "1") { name reviews { id } } }"#);
    let transports = SubgraphTransportMap::from_subgraph_configurations(
        &[
            subgraph(
                "Accounts",
                ACCOUNTS_SCHEMA,
                &format!("{}/graphql", accounts_server.url()),
            ),
            subgraph(
                "Reviews",
                REVIEWS_SCHEMA,
                &format!("{}/graphql", reviews_server.url()),
            ),
        ],
        Some(Duration::from_secs(5)),
    )
    .expect("transports build");

    let response = execute_query_plan(
        &query_plan,
        &Map::new(),
        &transports,
        &ExecutionOptions::default(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(
        response.data,
        json!({ "user": { "name": "Ada", "reviews": [{ "id": "10" }] } })
    );
    assert!(response.errors.is_empty());
}
