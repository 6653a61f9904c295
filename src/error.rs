use std::path::PathBuf;

/// Errors raised while assembling or synthesizing a stack.
///
/// Declaring a static site never validates its own inputs, so most of these
/// come from the surrounding layers: ambient configuration, stack
/// bookkeeping and writing the cloud assembly to disk.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("missing environment value {0}. Set it in the process environment or the .env file")]
    MissingEnvironment(String),

    #[error("invalid stack name {0}\nMust only consist of alphanumeric characters and hyphens, must start with an alphabetical character, and cannot be longer than 128 characters.")]
    InvalidStackName(String),

    #[error("validation failed on resource '{logical_id}'\n{reason}")]
    InvalidResource { logical_id: String, reason: String },

    #[error("duplicate logical id '{0}' in stack")]
    DuplicateLogicalId(String),

    #[error("parameter '{0}' was declared twice with different settings")]
    ConflictingParameter(String),

    #[error("duplicate asset id '{0}' in stack")]
    DuplicateAsset(String),

    #[error("failed to access {path:?}\n{source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize template\n{0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse site configuration\n{0}")]
    Toml(#[from] toml::de::Error),
}

impl SiteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SiteError::Io { path: path.into(), source }
    }

    pub(crate) fn invalid_resource(logical_id: &str, reason: impl Into<String>) -> Self {
        SiteError::InvalidResource {
            logical_id: logical_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = SiteError> = std::result::Result<T, E>;
