//! Error types for loading and building projects.

use std::path::PathBuf;

/// Result type for vde-builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or building a project
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No project found at {path}")]
    ProjectNotFound { path: PathBuf },

    #[error("Failed to parse project config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid project config at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Unsupported encoding `{label}`")]
    UnsupportedEncoding { label: String },

    #[error("File {path} is not valid {encoding}")]
    Decode {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse definition file {path} (line {line}): {message}")]
    Definition {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Could not create build directory {path}: {source}")]
    Build {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("File {path} is outside of the base directory {base}")]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("Failed to copy {source_path} to {destination}: {source}")]
    Mirror {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contract violations in document builder usage.
///
/// Either of these means the caller opened and closed groups out of step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("close_group called with no open group")]
    UnbalancedGroup,

    #[error("document output requested with unclosed groups: {}", open.join(" > "))]
    UnclosedGroup { open: Vec<String> },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unclosed_group_message_lists_open_tags() {
        let err = DocumentError::UnclosedGroup {
            open: vec!["product".to_string(), "codes".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "document output requested with unclosed groups: product > codes"
        );
    }

    #[test]
    fn test_document_error_converts_into_error() {
        let err: Error = DocumentError::UnbalancedGroup.into();

        assert!(matches!(err, Error::Document(DocumentError::UnbalancedGroup)));
    }
}
