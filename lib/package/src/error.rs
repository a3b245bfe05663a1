use std::path::PathBuf;

use fusion_composition::CompositionErrors;

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("package \"{0}\" does not exist")]
    NotFound(PathBuf),
    #[error("package \"{path}\" is corrupt: entry \"{entry}\" {reason}")]
    Corrupt {
        path: PathBuf,
        entry: String,
        reason: String,
    },
    #[error("invalid transport configuration \"{path}\": {reason}")]
    InvalidTransportConfig { path: PathBuf, reason: String },
    #[error("package \"{0}\" was opened read-only")]
    ReadOnly(PathBuf),
    #[error("i/o error on \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Composition(#[from] CompositionErrors),
    #[error("package task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PackageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(
        path: impl Into<PathBuf>,
        entry: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PackageError::Corrupt {
            path: path.into(),
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}
