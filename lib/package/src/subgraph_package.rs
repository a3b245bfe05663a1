use std::path::{Path, PathBuf};

use fusion_composition::SubgraphConfiguration;
use tracing::{debug, instrument};

use crate::archive::{persist_atomically, read_package_bytes, ArchiveReader, ArchiveWriter};
use crate::error::PackageError;
use crate::transport_config::TransportConfig;

pub(crate) const SCHEMA_ENTRY: &str = "schema.graphql";
pub(crate) const TRANSPORT_CONFIG_ENTRY: &str = "subgraph-config.json";
pub(crate) const EXTENSIONS_DIR: &str = "extensions/";

/// The files a subgraph package is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphFiles {
    pub schema_file: PathBuf,
    pub transport_config_file: PathBuf,
    pub extension_files: Vec<PathBuf>,
}

/// Creates a subgraph package at `path` from the given files.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn write_subgraph_package(
    path: impl AsRef<Path>,
    files: &SubgraphFiles,
) -> Result<(), PackageError> {
    let schema = read_text(&files.schema_file).await?;
    let transport_config = read_text(&files.transport_config_file).await?;
    let transport_config = TransportConfig::parse(&transport_config).map_err(|err| {
        PackageError::InvalidTransportConfig {
            path: files.transport_config_file.clone(),
            reason: err.to_string(),
        }
    })?;

    let mut extensions = Vec::with_capacity(files.extension_files.len());
    for extension_file in &files.extension_files {
        extensions.push(read_text(extension_file).await?);
    }

    let config = SubgraphConfiguration::new(
        transport_config.subgraph.clone(),
        schema,
        transport_config.clients(),
        extensions,
    );

    write_subgraph_configuration(path, &config).await
}

/// Creates a subgraph package at `path` holding `config`.
#[instrument(
    level = "debug",
    skip_all,
    fields(path = %path.as_ref().display(), subgraph = %config.name)
)]
pub async fn write_subgraph_configuration(
    path: impl AsRef<Path>,
    config: &SubgraphConfiguration,
) -> Result<(), PackageError> {
    let path = path.as_ref().to_path_buf();
    let mut writer = ArchiveWriter::default();
    add_subgraph_entries(&mut writer, "", config);

    tokio::task::spawn_blocking(move || {
        let bytes = writer
            .encode()
            .map_err(|err| PackageError::io(&path, err))?;
        persist_atomically(&path, &bytes)
    })
    .await??;

    debug!("subgraph package written");

    Ok(())
}

/// Reads the subgraph package at `path`.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn read_subgraph_package(
    path: impl AsRef<Path>,
) -> Result<SubgraphConfiguration, PackageError> {
    let path = path.as_ref().to_path_buf();
    let bytes = read_package_bytes(&path)
        .await?
        .ok_or_else(|| PackageError::NotFound(path.clone()))?;

    let config = tokio::task::spawn_blocking(move || {
        let archive = ArchiveReader::decode(&path, &bytes)?;
        read_subgraph_entries(&archive, "")
    })
    .await??;

    debug!(subgraph = %config.name, "subgraph package read");

    Ok(config)
}

pub(crate) fn add_subgraph_entries(
    writer: &mut ArchiveWriter,
    prefix: &str,
    config: &SubgraphConfiguration,
) {
    writer.add(format!("{}{}", prefix, SCHEMA_ENTRY), config.schema.clone());
    writer.add(
        format!("{}{}", prefix, TRANSPORT_CONFIG_ENTRY),
        TransportConfig::from_clients(&config.name, &config.clients).to_json(),
    );
    for (index, extension) in config.extensions.iter().enumerate() {
        writer.add(
            format!("{}{}{}.graphql", prefix, EXTENSIONS_DIR, index),
            extension.clone(),
        );
    }
}

pub(crate) fn read_subgraph_entries(
    archive: &ArchiveReader,
    prefix: &str,
) -> Result<SubgraphConfiguration, PackageError> {
    let schema = archive.required(&format!("{}{}", prefix, SCHEMA_ENTRY))?;

    let transport_entry = format!("{}{}", prefix, TRANSPORT_CONFIG_ENTRY);
    let transport_config = TransportConfig::parse(&archive.required(&transport_entry)?)
        .map_err(|err| {
            PackageError::corrupt(
                archive.path(),
                &transport_entry,
                format!("is not a valid transport configuration: {}", err),
            )
        })?;

    let extensions_prefix = format!("{}{}", prefix, EXTENSIONS_DIR);
    let mut numbered = archive
        .names_with_prefix(&extensions_prefix)
        .filter_map(|name| {
            name.strip_prefix(&extensions_prefix)
                .and_then(|file| file.strip_suffix(".graphql"))
                .and_then(|index| index.parse::<usize>().ok())
                .map(|index| (index, name.to_string()))
        })
        .collect::<Vec<_>>();
    numbered.sort();

    let mut extensions = Vec::with_capacity(numbered.len());
    for (_, name) in numbered {
        extensions.push(archive.required(&name)?);
    }

    Ok(SubgraphConfiguration::new(
        transport_config.subgraph.clone(),
        schema,
        transport_config.clients(),
        extensions,
    ))
}

async fn read_text(path: &Path) -> Result<String, PackageError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| PackageError::io(path, err))
}
