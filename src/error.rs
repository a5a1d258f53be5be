use thiserror::Error;

use crate::kube::KubeError;
use crate::notify::NotifyError;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("job store error: {0}")]
    Kube(#[from] KubeError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
