use std::path::{Path, PathBuf};

use fusion_composition::{compose, FusionGraph, SubgraphConfiguration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::archive::{persist_atomically, read_package_bytes, ArchiveReader, ArchiveWriter};
use crate::error::PackageError;
use crate::subgraph_package::{
    add_subgraph_entries, read_subgraph_entries, TRANSPORT_CONFIG_ENTRY,
};

pub const PACKAGE_FORMAT_VERSION: u32 = 1;

const MANIFEST_ENTRY: &str = "manifest.json";
const FUSION_GRAPH_ENTRY: &str = "fusion.graphql";
const SCHEMA_ENTRY: &str = "schema.graphql";
const SUBGRAPHS_DIR: &str = "subgraphs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAccess {
    /// The package must exist and cannot be changed.
    Read,
    /// A missing package is treated as empty; changes are written by `flush`.
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format_version: u32,
    subgraphs: Vec<String>,
}

/// A composed fusion graph together with the subgraph configurations it was
/// composed from.
///
/// The fusion graph is always a function of the subgraph set: adding a
/// subgraph recomposes the whole set. Writers to the same path must be
/// serialized by the caller.
#[derive(Debug)]
pub struct FusionGraphPackage {
    path: PathBuf,
    access: PackageAccess,
    fusion_graph: Option<FusionGraph>,
    schema: Option<String>,
    subgraphs: Vec<SubgraphConfiguration>,
    modified: bool,
}

impl FusionGraphPackage {
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display(), ?access))]
    pub async fn open(path: impl AsRef<Path>, access: PackageAccess) -> Result<Self, PackageError> {
        let path = path.as_ref().to_path_buf();

        let Some(bytes) = read_package_bytes(&path).await? else {
            return match access {
                PackageAccess::Read => Err(PackageError::NotFound(path)),
                PackageAccess::ReadWrite => {
                    debug!("package does not exist yet, starting empty");
                    Ok(Self {
                        path,
                        access,
                        fusion_graph: None,
                        schema: None,
                        subgraphs: vec![],
                        modified: false,
                    })
                }
            };
        };

        let archive_path = path.clone();
        let (fusion_graph, schema, subgraphs) = tokio::task::spawn_blocking(move || {
            let archive = ArchiveReader::decode(&archive_path, &bytes)?;
            read_contents(&archive)
        })
        .await??;

        debug!(subgraphs = subgraphs.len(), "fusion package read");

        Ok(Self {
            path,
            access,
            fusion_graph,
            schema,
            subgraphs,
            modified: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The composed fusion graph; `None` for a package without subgraphs.
    pub fn fusion_graph(&self) -> Option<&FusionGraph> {
        self.fusion_graph.as_ref()
    }

    /// The client-facing schema document.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Subgraph configurations, sorted by name.
    pub fn subgraph_configurations(&self) -> &[SubgraphConfiguration] {
        &self.subgraphs
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Adds subgraphs to the package and recomposes the fusion graph from the
    /// full set. A subgraph with the name of an existing one replaces it.
    ///
    /// On error the package is left unchanged.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn compose(
        &mut self,
        subgraphs: impl IntoIterator<Item = SubgraphConfiguration>,
    ) -> Result<&FusionGraph, PackageError> {
        self.ensure_writable()?;

        let mut next = self.subgraphs.clone();
        let mut added: Vec<SubgraphConfiguration> = Vec::new();
        for subgraph in subgraphs {
            let existing = next.iter().position(|current| current.name == subgraph.name);
            if let Some(index) = existing {
                debug!(subgraph = %subgraph.name, "replacing subgraph");
                next.remove(index);
            }
            added.push(subgraph);
        }
        next.extend(added);
        next.sort_by(|left, right| left.name.cmp(&right.name));

        self.recompose(next)
    }

    /// Removes a subgraph and recomposes the remaining set.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_subgraph(&mut self, name: &str) -> Result<bool, PackageError> {
        self.ensure_writable()?;

        let Some(index) = self.subgraphs.iter().position(|subgraph| subgraph.name == name) else {
            return Ok(false);
        };

        let mut next = self.subgraphs.clone();
        next.remove(index);
        if next.is_empty() {
            self.subgraphs = next;
            self.fusion_graph = None;
            self.schema = None;
            self.modified = true;
        } else {
            self.recompose(next)?;
        }

        Ok(true)
    }

    fn recompose(
        &mut self,
        subgraphs: Vec<SubgraphConfiguration>,
    ) -> Result<&FusionGraph, PackageError> {
        let graph = compose(&subgraphs)?;
        info!(
            subgraphs = subgraphs.len(),
            types = graph.types.len(),
            "fusion graph composed"
        );

        self.schema = Some(graph.to_schema_document());
        self.subgraphs = subgraphs;
        self.modified = true;

        let graph = self.fusion_graph.insert(graph);
        Ok(&*graph)
    }

    /// Writes the package to its path, replacing the previous archive only
    /// once the new one is complete.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn flush(&mut self) -> Result<(), PackageError> {
        self.ensure_writable()?;

        let writer = self.to_archive();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = writer
                .encode()
                .map_err(|err| PackageError::io(&path, err))?;
            persist_atomically(&path, &bytes)
        })
        .await??;

        self.modified = false;
        info!(subgraphs = self.subgraphs.len(), "fusion package written");

        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), PackageError> {
        match self.access {
            PackageAccess::Read => Err(PackageError::ReadOnly(self.path.clone())),
            PackageAccess::ReadWrite => Ok(()),
        }
    }

    fn to_archive(&self) -> ArchiveWriter {
        let mut writer = ArchiveWriter::default();
        let manifest = Manifest {
            format_version: PACKAGE_FORMAT_VERSION,
            subgraphs: self
                .subgraphs
                .iter()
                .map(|subgraph| subgraph.name.clone())
                .collect(),
        };
        writer.add(
            MANIFEST_ENTRY,
            serde_json::to_string_pretty(&manifest).unwrap_or_default(),
        );

        if let Some(graph) = &self.fusion_graph {
            writer.add(FUSION_GRAPH_ENTRY, graph.to_fusion_document());
        }
        if let Some(schema) = &self.schema {
            writer.add(SCHEMA_ENTRY, schema.clone());
        }
        for subgraph in &self.subgraphs {
            add_subgraph_entries(&mut writer, &subgraph_prefix(&subgraph.name), subgraph);
        }

        writer
    }
}

fn subgraph_prefix(name: &str) -> String {
    format!("{}{}/", SUBGRAPHS_DIR, name)
}

type PackageContents = (Option<FusionGraph>, Option<String>, Vec<SubgraphConfiguration>);

fn read_contents(archive: &ArchiveReader) -> Result<PackageContents, PackageError> {
    let manifest: Manifest = serde_json::from_str(&archive.required(MANIFEST_ENTRY)?)
        .map_err(|err| {
            PackageError::corrupt(
                archive.path(),
                MANIFEST_ENTRY,
                format!("is not a valid manifest: {}", err),
            )
        })?;
    if manifest.format_version != PACKAGE_FORMAT_VERSION {
        return Err(PackageError::corrupt(
            archive.path(),
            MANIFEST_ENTRY,
            format!("has unsupported format version {}", manifest.format_version),
        ));
    }

    let mut subgraphs = Vec::with_capacity(manifest.subgraphs.len());
    for name in &manifest.subgraphs {
        let config = read_subgraph_entries(archive, &subgraph_prefix(name))?;
        if &config.name != name {
            return Err(PackageError::corrupt(
                archive.path(),
                format!("{}{}", subgraph_prefix(name), TRANSPORT_CONFIG_ENTRY),
                format!("declares subgraph \"{}\"", config.name),
            ));
        }
        subgraphs.push(config);
    }
    subgraphs.sort_by(|left, right| left.name.cmp(&right.name));

    if subgraphs.is_empty() {
        return Ok((None, None, subgraphs));
    }

    let document = archive.required(FUSION_GRAPH_ENTRY)?;
    let schema = archive.required(SCHEMA_ENTRY)?;
    let graph = FusionGraph::parse(&document).map_err(|err| {
        PackageError::corrupt(archive.path(), FUSION_GRAPH_ENTRY, err.to_string())
    })?;

    for referenced in graph.referenced_subgraphs() {
        if !subgraphs.iter().any(|subgraph| subgraph.name == referenced) {
            return Err(PackageError::corrupt(
                archive.path(),
                FUSION_GRAPH_ENTRY,
                format!("binds to subgraph \"{}\" which has no configuration", referenced),
            ));
        }
    }

    Ok((Some(graph), Some(schema), subgraphs))
}
