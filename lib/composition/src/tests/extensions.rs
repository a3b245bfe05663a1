use crate::compose;
use crate::error::CompositionError;
use crate::fusion_graph::BindingKind;
use crate::tests::testkit::{accounts, init_logger, reviews, subgraph};

#[test]
fn applies_extension_documents_before_merging() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let mut accounts = accounts();
    accounts.extensions = vec![
        "extend type User { email: String }".to_string(),
        "extend type Query { me: User }".to_string(),
    ];

    let graph = compose(&[accounts, reviews()])?;
    let user = graph.type_definition("User").unwrap();
    let email = user.field("email").unwrap();
    assert_eq!(email.bindings.len(), 1);
    assert_eq!(email.bindings[0].subgraph, "Accounts");
    assert_eq!(email.bindings[0].kind, BindingKind::Keyed);

    let query = graph.type_definition("Query").unwrap();
    assert_eq!(
        query.fields().unwrap().keys().collect::<Vec<_>>(),
        vec!["user", "users", "me", "reviews"]
    );

    Ok(())
}

#[test]
fn extension_keys_may_use_extension_fields() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let mut catalog = subgraph(
        "Catalog",
        "type Query { products: [Product] } type Product { name: String }",
    );
    catalog.extensions = vec![r#"extend type Product @key(fields: "sku") { sku: ID! }"#.to_string()];

    let graph = compose(&[catalog])?;
    let product = graph.type_definition("Product").unwrap();
    assert_eq!(product.keys().len(), 1);
    assert_eq!(product.keys()[0].fields.to_string(), "sku");

    Ok(())
}

#[test]
fn schema_level_extensions_declare_foreign_types() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let reviews = subgraph(
        "Reviews",
        r#"
        type Query { latest: Review }
        type Review { id: ID! author: User }
        extend type User @key(fields: "id") { id: ID! reviews: [Review] }
        "#,
    );

    let graph = compose(&[accounts(), reviews])?;
    let user = graph.type_definition("User").unwrap();
    assert_eq!(user.sources, vec!["Accounts", "Reviews"]);
    assert!(user.field("reviews").unwrap().is_resolvable_by("Reviews"));

    Ok(())
}

#[test]
fn reports_unresolved_extensions() {
    init_logger();
    let mut accounts = accounts();
    accounts.extensions = vec![
        "extend type Missing { x: Int }".to_string(),
        "extend enum User { ADMIN }".to_string(),
        "extend type User { name: String }".to_string(),
    ];

    let errors = compose(&[accounts]).unwrap_err();

    insta::assert_snapshot!(errors.to_string(), @r###"
    composition failed with 3 error(s):
      - [Accounts] cannot extend type "Missing": the type is not declared by the subgraph
      - [Accounts] cannot extend type "User": enum extension does not match the object base type
      - [Accounts] cannot extend type "User": field "name" is already declared
    "###);
}

#[test]
fn collects_errors_across_subgraphs() {
    init_logger();
    let mut first = subgraph("First", "type Query { a: Int }");
    first.extensions = vec!["extend type Nope { a: Int }".to_string()];
    let mut second = subgraph("Second", "type Query { b: Int }");
    second.extensions = vec!["extend type Other { b: Int }".to_string()];

    let errors = compose(&[second, first]).unwrap_err().into_vec();
    assert_eq!(
        errors,
        vec![
            CompositionError::UnresolvedExtension {
                subgraph: "First".to_string(),
                type_name: "Nope".to_string(),
                reason: "the type is not declared by the subgraph".to_string(),
            },
            CompositionError::UnresolvedExtension {
                subgraph: "Second".to_string(),
                type_name: "Other".to_string(),
                reason: "the type is not declared by the subgraph".to_string(),
            },
        ]
    );
}
