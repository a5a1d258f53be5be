//! Configuration loaded from `trainwatch.toml` at startup.
//!
//! Every component receives the settings it needs explicitly; nothing
//! reads the environment after startup. Environment variables take
//! precedence over the file for the credentials and the namespace
//! (`GITHUB_TOKEN`, `GITHUB_REPO`, `NAMESPACE`, `MLFLOW_TRACKING_URI`).

use serde::Deserialize;
use std::path::Path;

use crate::error::WatchError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainwatchConfig {
    /// Explicit cluster access. Absent means in-cluster service-account
    /// credentials.
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub mlflow: MlflowConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// Explicit API server access, for running outside the cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// API server base URL, e.g. `https://10.0.0.1:6443`.
    pub server: String,
    /// Bearer token. Optional for unauthenticated test servers.
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a PEM CA bundle for the API server certificate.
    #[serde(default)]
    pub ca_bundle: Option<String>,
    /// Skip TLS verification. For local development only.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,
    /// `owner/repo` of the repository whose PRs are commented.
    #[serde(default)]
    pub repo: String,
    /// Also fire a `repository_dispatch` event on terminal transitions.
    #[serde(default = "default_true")]
    pub dispatch: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MlflowConfig {
    #[serde(default = "default_tracking_url")]
    pub tracking_url: String,
    /// Experiment used when a job carries no `experiment-name` label.
    #[serde(default = "default_experiment")]
    pub default_experiment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_tracking_url() -> String {
    "http://mlflow-service:5000".to_string()
}

fn default_experiment() -> String {
    "unet-lung-segmentation".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repo: String::new(),
            dispatch: true,
        }
    }
}

impl Default for MlflowConfig {
    fn default() -> Self {
        Self {
            tracking_url: default_tracking_url(),
            default_experiment: default_experiment(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl TrainwatchConfig {
    /// Load `trainwatch.toml` from the current directory, falling back
    /// to defaults when the file does not exist.
    pub fn load() -> Result<Self, WatchError> {
        Self::load_from(Path::new("trainwatch.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, WatchError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TrainwatchConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file.
        if let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            config.github.token = token;
        }
        if let Ok(repo) = std::env::var("GITHUB_REPO")
            && !repo.is_empty()
        {
            config.github.repo = repo;
        }
        if let Ok(namespace) = std::env::var("NAMESPACE")
            && !namespace.is_empty()
        {
            config.watch.namespace = namespace;
        }
        if let Ok(url) = std::env::var("MLFLOW_TRACKING_URI")
            && !url.is_empty()
        {
            config.mlflow.tracking_url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = TrainwatchConfig::default();
        assert!(config.cluster.is_none());
        assert_eq!(config.watch.namespace, "default");
        assert_eq!(config.watch.timeout_secs, 3600);
        assert_eq!(config.watch.poll_interval_secs, 30);
        assert_eq!(config.mlflow.tracking_url, "http://mlflow-service:5000");
        assert_eq!(config.mlflow.default_experiment, "unet-lung-segmentation");
        assert!(config.github.dispatch);
        assert!(config.github.token.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [github]
            token = "ghp-test"
            repo = "acme/lung-seg"
            dispatch = false

            [watch]
            namespace = "training"
        "#;
        let config: TrainwatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.token, "ghp-test");
        assert_eq!(config.github.repo, "acme/lung-seg");
        assert!(!config.github.dispatch);
        assert_eq!(config.watch.namespace, "training");
        // Untouched sections keep their defaults.
        assert_eq!(config.watch.timeout_secs, 3600);
        assert_eq!(config.mlflow.tracking_url, "http://mlflow-service:5000");
    }

    #[test]
    fn cluster_section_is_optional_but_parsed() {
        let toml_str = r#"
            [cluster]
            server = "https://10.0.0.1:6443"
            token = "sa-token"
            insecure_skip_verify = true
        "#;
        let config: TrainwatchConfig = toml::from_str(toml_str).unwrap();
        let cluster = config.cluster.unwrap();
        assert_eq!(cluster.server, "https://10.0.0.1:6443");
        assert_eq!(cluster.token.as_deref(), Some("sa-token"));
        assert!(cluster.insecure_skip_verify);
        assert!(cluster.ca_bundle.is_none());
    }

    #[test]
    fn load_from_reads_file_and_missing_file_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[watch]\nnamespace = \"ml\"\n").unwrap();
        let config = TrainwatchConfig::load_from(file.path()).unwrap();
        assert_eq!(config.watch.namespace, "ml");

        let config = TrainwatchConfig::load_from(Path::new("/nonexistent/trainwatch.toml"));
        assert_eq!(config.unwrap().watch.timeout_secs, 3600);
    }
}
