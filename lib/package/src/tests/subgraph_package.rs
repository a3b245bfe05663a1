use fusion_composition::{
    ClientConfiguration, HttpClientConfiguration, SubgraphConfiguration,
    WebSocketClientConfiguration,
};

use crate::archive::ArchiveWriter;
use crate::error::PackageError;
use crate::subgraph_package::{read_subgraph_package, write_subgraph_package, SubgraphFiles};
use crate::tests::ACCOUNTS_SCHEMA;

#[tokio::test]
async fn subgraph_package_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let schema_file = dir.path().join("schema.graphql");
    let config_file = dir.path().join("subgraph-config.json");
    let extension_files = vec![dir.path().join("a.graphql"), dir.path().join("b.graphql")];

    tokio::fs::write(&schema_file, ACCOUNTS_SCHEMA).await?;
    tokio::fs::write(
        &config_file,
        r#"{
          "subgraph": "Accounts",
          "http": { "baseAddress": "http://localhost:5051/graphql", "clientName": "accounts" },
          "websocket": { "baseAddress": "ws://localhost:5051/graphql" }
        }"#,
    )
    .await?;
    tokio::fs::write(&extension_files[0], "extend type User { email: String }").await?;
    tokio::fs::write(&extension_files[1], "extend type Query { me: User }").await?;

    let package = dir.path().join("accounts.tgz");
    write_subgraph_package(
        &package,
        &SubgraphFiles {
            schema_file,
            transport_config_file: config_file,
            extension_files,
        },
    )
    .await?;

    let config = read_subgraph_package(&package).await?;
    assert_eq!(
        config,
        SubgraphConfiguration::new(
            "Accounts",
            ACCOUNTS_SCHEMA,
            vec![
                ClientConfiguration::Http(HttpClientConfiguration {
                    base_address: "http://localhost:5051/graphql".to_string(),
                    client_name: Some("accounts".to_string()),
                }),
                ClientConfiguration::WebSocket(WebSocketClientConfiguration {
                    base_address: "ws://localhost:5051/graphql".to_string(),
                    client_name: None,
                }),
            ],
            vec![
                "extend type User { email: String }".to_string(),
                "extend type Query { me: User }".to_string(),
            ],
        )
    );

    Ok(())
}

#[tokio::test]
async fn extensions_are_ordered_numerically() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let package = dir.path().join("ordered.tgz");

    let mut writer = ArchiveWriter::default();
    writer.add("schema.graphql", "type Query { a: Int }");
    writer.add("subgraph-config.json", r#"{ "subgraph": "Ordered" }"#);
    for index in [10, 2, 1] {
        writer.add(format!("extensions/{}.graphql", index), format!("# {}", index));
    }
    writer.add("README.md", "ignored");
    tokio::fs::write(&package, writer.encode()?).await?;

    let config = read_subgraph_package(&package).await?;
    assert_eq!(config.name, "Ordered");
    assert!(config.clients.is_empty());
    assert_eq!(config.extensions, vec!["# 1", "# 2", "# 10"]);

    Ok(())
}

#[tokio::test]
async fn missing_package_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_subgraph_package(dir.path().join("nope.tgz")).await;

    assert!(matches!(result, Err(PackageError::NotFound(_))));
}

#[tokio::test]
async fn missing_entry_is_corrupt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let package = dir.path().join("broken.tgz");

    let mut writer = ArchiveWriter::default();
    writer.add("subgraph-config.json", r#"{ "subgraph": "Broken" }"#);
    tokio::fs::write(&package, writer.encode()?).await?;

    match read_subgraph_package(&package).await {
        Err(PackageError::Corrupt { entry, reason, .. }) => {
            assert_eq!(entry, "schema.graphql");
            assert_eq!(reason, "is missing");
        }
        other => panic!("expected a corrupt package, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn invalid_transport_config_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let schema_file = dir.path().join("schema.graphql");
    let config_file = dir.path().join("subgraph-config.json");
    tokio::fs::write(&schema_file, ACCOUNTS_SCHEMA).await.unwrap();
    tokio::fs::write(&config_file, r#"{ "http": {} }"#).await.unwrap();

    let package = dir.path().join("invalid.tgz");
    let result = write_subgraph_package(
        &package,
        &SubgraphFiles {
            schema_file,
            transport_config_file: config_file,
            extension_files: vec![],
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(PackageError::InvalidTransportConfig { .. })
    ));
    assert!(!package.exists());
}
