use crate::compose;
use crate::error::CompositionError;
use crate::tests::testkit::{accounts, init_logger, subgraph};

#[test]
fn reports_every_conflict_at_once() {
    init_logger();
    let a = subgraph("A", "type Query { count: Int } type Thing { id: ID }");
    let b = subgraph("B", "type Query { count: String } enum Thing { ONE }");

    let errors = compose(&[b, a]).unwrap_err();
    assert_eq!(errors.len(), 2);

    insta::assert_snapshot!(errors.to_string(), @r###"
    composition failed with 2 error(s):
      - field "Query.count" has incompatible types across subgraphs: Int in A, String in B
      - type "Thing" is declared with incompatible kinds: object in A, enum in B
    "###);
}

#[test]
fn rejects_mismatching_argument_types() {
    init_logger();
    let a = subgraph("A", "type Query { user(id: ID!): String }");
    let b = subgraph("B", "type Query { user(id: Int): String }");

    let errors = compose(&[a, b]).unwrap_err().into_vec();
    assert_eq!(
        errors,
        vec![CompositionError::ArgumentTypeMismatch {
            type_name: "Query".to_string(),
            field_name: "user".to_string(),
            argument_name: "id".to_string(),
            declarations: vec![
                ("A".to_string(), "ID!".to_string()),
                ("B".to_string(), "Int".to_string()),
            ],
        }]
    );
}

#[test]
fn rejects_keys_on_undeclared_fields() {
    init_logger();
    let users = subgraph(
        "Users",
        r#"
        type Query { me: User }
        type User @key(fields: "uuid") @key(fields: "id") { id: ID! }
        "#,
    );

    let errors = compose(&[users]).unwrap_err().into_vec();
    assert_eq!(
        errors,
        vec![CompositionError::InvalidKey {
            subgraph: "Users".to_string(),
            type_name: "User".to_string(),
            fields: "uuid".to_string(),
            reason: "field \"User.uuid\" is not declared".to_string(),
        }]
    );
}

#[test]
fn validates_nested_keys() {
    init_logger();
    let valid = subgraph(
        "Valid",
        r#"
        type Query { me: User }
        type Org { id: ID! }
        type User @key(fields: "id org { id }") { id: ID! org: Org! }
        "#,
    );
    assert!(compose(&[valid]).is_ok());

    let missing_selection = subgraph(
        "MissingSelection",
        r#"
        type Query { me: User }
        type Org { id: ID! }
        type User @key(fields: "org") { id: ID! org: Org! }
        "#,
    );
    let errors = compose(&[missing_selection]).unwrap_err();
    assert!(matches!(
        errors.iter().next(),
        Some(CompositionError::InvalidKey { reason, .. }) if reason.contains("needs a selection")
    ));
}

#[test]
fn rejects_unparsable_documents_and_duplicates() {
    init_logger();
    let broken = subgraph("Broken", "type Query {");

    let errors = compose(&[accounts(), broken, accounts()])
        .unwrap_err()
        .into_vec();

    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0],
        CompositionError::DuplicateSubgraph("Accounts".to_string())
    );
    assert!(matches!(
        &errors[1],
        CompositionError::InvalidDocument { subgraph, document, .. }
            if subgraph == "Broken" && document == "schema"
    ));
}

#[test]
fn requires_a_query_type() {
    init_logger();
    let types_only = subgraph("TypesOnly", "type User { id: ID }");

    let errors = compose(&[types_only]).unwrap_err().into_vec();
    assert_eq!(errors, vec![CompositionError::MissingQueryType]);
}

#[test]
fn extension_errors_do_not_hide_conflicts() {
    init_logger();
    let mut a = subgraph("A", "type Query { thing: Thing } type Thing { id: ID }");
    a.extensions = vec!["extend type Missing { x: Int }".to_string()];
    let b = subgraph("B", "type Query { other: Int } enum Thing { X }");

    let errors = compose(&[a, b]).unwrap_err().into_vec();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|error| matches!(
        error,
        CompositionError::UnresolvedExtension { subgraph, type_name, .. }
            if subgraph == "A" && type_name == "Missing"
    )));
    assert!(errors.iter().any(|error| matches!(
        error,
        CompositionError::TypeKindConflict { type_name, .. } if type_name == "Thing"
    )));
}
