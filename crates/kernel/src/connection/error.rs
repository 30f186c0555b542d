//! Publishing pipeline errors.

use thiserror::Error;

/// Errors raised by deployer backends.
#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload is not valid base64")]
    Payload(#[from] base64::DecodeError),

    #[error("path escapes the deployer root: {0}")]
    OutsideRoot(String),

    #[error("I/O error at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl DeployerError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Io {
                path: path.into(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors raised by connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("This Connection has no processor defined")]
    MissingProcessor,

    #[error("This Connection has no deployer defined")]
    MissingDeployer,

    #[error("unknown {kind} \"{alias}\"")]
    UnknownAlias { kind: &'static str, alias: String },

    #[error("invalid {kind} settings for \"{alias}\"")]
    InvalidSettings {
        kind: &'static str,
        alias: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("The value of \"{name}\" {reason}")]
    IllegalPathComponent { name: String, reason: String },

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("failed to look up project languages")]
    LanguageLookup(#[source] anyhow::Error),

    #[error("processor \"{alias}\" failed")]
    Processor {
        alias: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deployer operation failed")]
    Deployer(#[from] DeployerError),

    /// A multi-language operation stopped part way. Languages listed in
    /// `completed` were already written or removed and are left as they are.
    #[error("{operation} stopped at language \"{language}\" (completed: {completed:?})")]
    Aborted {
        operation: &'static str,
        language: String,
        completed: Vec<String>,
        #[source]
        source: Box<ConnectionError>,
    },
}

impl ConnectionError {
    /// Whether the error was caused by caller input rather than the system.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::IllegalPathComponent { .. }
            | Self::UnknownAlias { .. }
            | Self::InvalidSettings { .. } => true,
            Self::Aborted { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// Whether the deployer reported a missing file or folder.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Deployer(e) => e.is_not_found(),
            Self::Aborted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
