use fusion_composition::compose;

use crate::archive::ArchiveWriter;
use crate::error::PackageError;
use crate::fusion_package::{FusionGraphPackage, PackageAccess};
use crate::subgraph_package::add_subgraph_entries;
use crate::tests::{accounts, http_subgraph, reviews};

#[tokio::test]
async fn compose_flush_and_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gateway.fgp");

    let mut package = FusionGraphPackage::open(&path, PackageAccess::ReadWrite).await?;
    assert!(package.fusion_graph().is_none());
    package.compose([reviews(), accounts()])?;
    assert!(package.is_modified());
    package.flush().await?;

    let package = FusionGraphPackage::open(&path, PackageAccess::Read).await?;
    let names = package
        .subgraph_configurations()
        .iter()
        .map(|subgraph| subgraph.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Accounts", "Reviews"]);
    assert_eq!(package.subgraph_configurations()[1], reviews());

    let expected = compose(&[accounts(), reviews()])?;
    assert_eq!(package.fusion_graph(), Some(&expected));

    insta::assert_snapshot!(package.schema().unwrap_or_default(), @r###"
    type Query {
      user(id: ID!): User
      review(id: ID!): Review
    }

    type Review {
      id: ID!
      authorId: ID!
    }

    type User {
      id: ID!
      name: String!
      reviews: [Review]
    }
    "###);

    Ok(())
}

#[tokio::test]
async fn append_is_equivalent_to_composing_the_full_set() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let at_once = dir.path().join("at-once.fgp");
    let appended = dir.path().join("appended.fgp");

    let mut package = FusionGraphPackage::open(&at_once, PackageAccess::ReadWrite).await?;
    package.compose([accounts(), reviews()])?;
    package.flush().await?;

    let mut package = FusionGraphPackage::open(&appended, PackageAccess::ReadWrite).await?;
    package.compose([accounts()])?;
    package.flush().await?;
    let mut package = FusionGraphPackage::open(&appended, PackageAccess::ReadWrite).await?;
    package.compose([reviews()])?;
    package.flush().await?;

    let left = FusionGraphPackage::open(&at_once, PackageAccess::Read).await?;
    let right = FusionGraphPackage::open(&appended, PackageAccess::Read).await?;
    assert_eq!(left.fusion_graph(), right.fusion_graph());
    assert_eq!(left.schema(), right.schema());
    assert_eq!(
        tokio::fs::read(&at_once).await?,
        tokio::fs::read(&appended).await?
    );

    Ok(())
}

#[tokio::test]
async fn same_named_subgraph_replaces_the_previous_one() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gateway.fgp");

    let mut package = FusionGraphPackage::open(&path, PackageAccess::ReadWrite).await?;
    package.compose([accounts(), reviews()])?;

    let updated = http_subgraph(
        "Accounts",
        r#"
        type Query { user(id: ID!): User }
        type User @key(fields: "id") { id: ID! name: String! email: String }
        "#,
    );
    let graph = package.compose([updated.clone()])?;
    assert!(graph
        .type_definition("User")
        .and_then(|user| user.field("email"))
        .is_some());

    assert_eq!(package.subgraph_configurations().len(), 2);
    assert_eq!(package.subgraph_configurations()[0], updated);

    Ok(())
}

#[tokio::test]
async fn failed_composition_leaves_the_package_unchanged() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gateway.fgp");

    let mut package = FusionGraphPackage::open(&path, PackageAccess::ReadWrite).await?;
    package.compose([accounts()])?;
    let before = package.fusion_graph().cloned();

    let conflicting = http_subgraph("Conflicting", "type Query { user(id: ID!): String }");
    let result = package.compose([conflicting]);
    assert!(matches!(result, Err(PackageError::Composition(_))));
    assert_eq!(package.fusion_graph().cloned(), before);
    assert_eq!(package.subgraph_configurations().len(), 1);

    Ok(())
}

#[tokio::test]
async fn removing_subgraphs_recomposes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gateway.fgp");

    let mut package = FusionGraphPackage::open(&path, PackageAccess::ReadWrite).await?;
    package.compose([accounts(), reviews()])?;

    assert!(package.remove_subgraph("Reviews")?);
    assert!(!package.remove_subgraph("Reviews")?);
    assert_eq!(package.fusion_graph(), Some(&compose(&[accounts()])?));

    assert!(package.remove_subgraph("Accounts")?);
    assert!(package.fusion_graph().is_none());
    package.flush().await?;

    let package = FusionGraphPackage::open(&path, PackageAccess::Read).await?;
    assert!(package.subgraph_configurations().is_empty());
    assert!(package.schema().is_none());

    Ok(())
}

#[tokio::test]
async fn read_access_requires_an_existing_package() {
    let dir = tempfile::tempdir().unwrap();
    let result = FusionGraphPackage::open(dir.path().join("missing.fgp"), PackageAccess::Read).await;

    assert!(matches!(result, Err(PackageError::NotFound(_))));
}

#[tokio::test]
async fn read_access_cannot_modify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gateway.fgp");

    let mut package = FusionGraphPackage::open(&path, PackageAccess::ReadWrite).await?;
    package.compose([accounts()])?;
    package.flush().await?;

    let mut package = FusionGraphPackage::open(&path, PackageAccess::Read).await?;
    assert!(matches!(
        package.compose([reviews()]),
        Err(PackageError::ReadOnly(_))
    ));
    assert!(matches!(package.flush().await, Err(PackageError::ReadOnly(_))));

    Ok(())
}

#[tokio::test]
async fn bindings_must_resolve_to_packaged_subgraphs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("inconsistent.fgp");
    let graph = compose(&[accounts(), reviews()])?;

    let mut writer = ArchiveWriter::default();
    writer.add(
        "manifest.json",
        r#"{ "formatVersion": 1, "subgraphs": ["Accounts"] }"#,
    );
    writer.add("fusion.graphql", graph.to_fusion_document());
    writer.add("schema.graphql", graph.to_schema_document());
    add_subgraph_entries(&mut writer, "subgraphs/Accounts/", &accounts());
    tokio::fs::write(&path, writer.encode()?).await?;

    match FusionGraphPackage::open(&path, PackageAccess::Read).await {
        Err(PackageError::Corrupt { entry, reason, .. }) => {
            assert_eq!(entry, "fusion.graphql");
            assert_eq!(
                reason,
                "binds to subgraph \"Reviews\" which has no configuration"
            );
        }
        other => panic!("expected a corrupt package, got {:?}", other.map(|_| ())),
    }

    Ok(())
}

#[tokio::test]
async fn declared_subgraphs_need_their_transport_config() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing-config.fgp");
    let graph = compose(&[accounts()])?;

    let mut writer = ArchiveWriter::default();
    writer.add(
        "manifest.json",
        r#"{ "formatVersion": 1, "subgraphs": ["Accounts"] }"#,
    );
    writer.add("fusion.graphql", graph.to_fusion_document());
    writer.add("schema.graphql", graph.to_schema_document());
    writer.add("subgraphs/Accounts/schema.graphql", accounts().schema);
    tokio::fs::write(&path, writer.encode()?).await?;

    match FusionGraphPackage::open(&path, PackageAccess::Read).await {
        Err(PackageError::Corrupt { entry, .. }) => {
            assert_eq!(entry, "subgraphs/Accounts/subgraph-config.json");
        }
        other => panic!("expected a corrupt package, got {:?}", other.map(|_| ())),
    }

    Ok(())
}
