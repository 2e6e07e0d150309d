use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error type carried by [`WalkError::Visitor`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum WalkError {
    // Traversal
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("symlink loop: {}", .0.display())]
    SymlinkLoop(PathBuf),

    #[error("IO error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("traversal error: {0}")]
    Traversal(String),

    // Archive
    #[error("fail to read the archive")]
    Archive(#[source] std::io::Error),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    // Content
    #[error("unable to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    // Caller logic
    #[error("visitor error")]
    Visitor(#[source] BoxError),
}

impl WalkError {
    /// Wrap a caller error raised inside a visitor.
    ///
    /// Accepts anything convertible into a boxed error, including `&str`
    /// and `String`.
    pub fn visitor(err: impl Into<BoxError>) -> Self {
        Self::Visitor(err.into())
    }

    /// The path this error occurred at, if applicable.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::PermissionDenied(p)
            | Self::NotFound(p)
            | Self::SymlinkLoop(p)
            | Self::Io { path: p, .. }
            | Self::Read { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether this error is, or wraps, an OS permission failure.
    pub fn is_permission_denied(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            Self::PermissionDenied(_) => true,
            Self::Io { source, .. } | Self::Archive(source) => {
                source.kind() == ErrorKind::PermissionDenied
            }
            Self::Read { source, .. } => source.kind() == ErrorKind::PermissionDenied,
            Self::Visitor(inner) => inner
                .downcast_ref::<std::io::Error>()
                .is_some_and(|e| e.kind() == ErrorKind::PermissionDenied),
            _ => false,
        }
    }
}
