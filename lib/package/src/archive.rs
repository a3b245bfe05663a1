use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use tar::{Archive, Builder, EntryType, Header};

use crate::error::PackageError;

/// The entries of a gzip-compressed tar archive, read fully into memory.
#[derive(Debug)]
pub(crate) struct ArchiveReader {
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveReader {
    pub(crate) fn decode(path: &Path, bytes: &[u8]) -> Result<Self, PackageError> {
        let mut archive = Archive::new(GzDecoder::new(bytes));
        let mut entries = BTreeMap::new();

        let corrupt = |reason: std::io::Error| {
            PackageError::corrupt(path, "<archive>", format!("cannot be read: {}", reason))
        };

        for entry in archive.entries().map_err(corrupt)? {
            let mut entry = entry.map_err(corrupt)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = entry
                .path()
                .map_err(corrupt)?
                .to_string_lossy()
                .trim_start_matches("./")
                .to_string();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(corrupt)?;
            entries.insert(name, contents);
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn optional(&self, entry: &str) -> Result<Option<String>, PackageError> {
        self.entries
            .get(entry)
            .map(|contents| {
                String::from_utf8(contents.clone())
                    .map_err(|_| PackageError::corrupt(&self.path, entry, "is not valid UTF-8"))
            })
            .transpose()
    }

    pub(crate) fn required(&self, entry: &str) -> Result<String, PackageError> {
        self.optional(entry)?
            .ok_or_else(|| PackageError::corrupt(&self.path, entry, "is missing"))
    }

    /// Names of the entries below `prefix`, in name order.
    pub(crate) fn names_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .keys()
            .filter(move |name| name.starts_with(prefix))
            .map(String::as_str)
    }
}

/// Collects entries and encodes them with fixed metadata, so that equal
/// entries always produce byte-identical archives.
#[derive(Debug, Default)]
pub(crate) struct ArchiveWriter {
    entries: Vec<(String, String)>,
}

impl ArchiveWriter {
    pub(crate) fn add(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.entries.push((name.into(), contents.into()));
    }

    pub(crate) fn encode(&self) -> std::io::Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        for (name, contents) in &self.entries {
            let bytes = contents.as_bytes();
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            builder.append_data(&mut header, name, bytes)?;
        }

        builder.into_inner()?.finish()
    }
}

/// Replaces `path` with `bytes` through a temporary file in the same
/// directory; on failure the previous file is left untouched.
pub(crate) fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<(), PackageError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file =
        tempfile::NamedTempFile::new_in(directory).map_err(|err| PackageError::io(path, err))?;
    file.write_all(bytes)
        .map_err(|err| PackageError::io(path, err))?;
    file.as_file()
        .sync_all()
        .map_err(|err| PackageError::io(path, err))?;
    file.persist(path)
        .map_err(|err| PackageError::io(path, err.error))?;

    Ok(())
}

/// Reads the raw bytes of a package, mapping a missing file to `NotFound`.
pub(crate) async fn read_package_bytes(path: &Path) -> Result<Option<Vec<u8>>, PackageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(PackageError::io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchiveReader, ArchiveWriter};
    use std::path::Path;

    #[test]
    fn encodes_deterministically() {
        let mut writer = ArchiveWriter::default();
        writer.add("schema.graphql", "type Query { a: Int }");
        writer.add("extensions/0.graphql", "extend type Query { b: Int }");

        let first = writer.encode().unwrap();
        let second = writer.encode().unwrap();
        assert_eq!(first, second);

        let reader = ArchiveReader::decode(Path::new("test.tgz"), &first).unwrap();
        assert_eq!(
            reader.required("schema.graphql").unwrap(),
            "type Query { a: Int }"
        );
        assert_eq!(
            reader.names_with_prefix("extensions/").collect::<Vec<_>>(),
            vec!["extensions/0.graphql"]
        );
        assert!(reader.optional("missing.graphql").unwrap().is_none());
    }

    #[test]
    fn rejects_garbage() {
        let result = ArchiveReader::decode(Path::new("garbage.tgz"), b"not an archive");
        assert!(result.is_err());
    }
}
