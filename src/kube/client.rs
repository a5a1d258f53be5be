use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Certificate, Client, RequestBuilder, StatusCode};
use tracing::debug;

use super::error::KubeError;
use super::types::{JobList, JobObject, PodList, WatchEvent};
use super::{EventFeed, JobStore};
use crate::config::ClusterConfig;
use crate::lifecycle::TransitionKind;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-side watch window. The API server closes the stream after this
/// many seconds and the watcher resubscribes with the last resource
/// version.
const WATCH_TIMEOUT_SECS: u64 = 300;

/// Thin client for the Jobs API of one namespace, plus the pod log
/// endpoints the `--show-logs` flag needs.
#[derive(Clone)]
pub struct JobsApi {
    client: Client,
    base_url: String,
    token: Option<String>,
    namespace: String,
}

impl JobsApi {
    /// Connect using an explicit `[cluster]` config section.
    pub fn from_cluster_config(config: &ClusterConfig, namespace: &str) -> Result<Self, KubeError> {
        let ca_pem = match &config.ca_bundle {
            Some(path) => Some(std::fs::read(path).map_err(|e| {
                KubeError::Config(format!("failed to read CA bundle {path}: {e}"))
            })?),
            None => None,
        };
        let client = build_http_client(ca_pem.as_deref(), config.insecure_skip_verify)?;
        Ok(Self {
            client,
            base_url: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            namespace: namespace.to_string(),
        })
    }

    /// Connect using the in-cluster service account (token, CA bundle and
    /// API server address injected by the kubelet).
    pub fn in_cluster(namespace: &str) -> Result<Self, KubeError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            KubeError::Config("KUBERNETES_SERVICE_HOST not set; not running in a cluster".into())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());

        let token = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/token"))
            .map_err(|e| KubeError::Config(format!("failed to read service account token: {e}")))?
            .trim()
            .to_string();
        let ca_pem = std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/ca.crt")).ok();

        let client = build_http_client(ca_pem.as_deref(), false)?;
        Ok(Self {
            client,
            base_url: format!("https://{host}:{port}"),
            token: Some(token),
            namespace: namespace.to_string(),
        })
    }

    /// Client pointing at a custom base URL without auth (useful for
    /// testing).
    pub fn with_base_url(base_url: String, namespace: String) -> Self {
        let client = build_http_client(None, false).expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            namespace,
        }
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/apis/batch/v1/namespaces/{}/jobs",
            self.base_url, self.namespace
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, KubeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(KubeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Concatenated logs of every pod the job spawned, one section per
    /// pod. Per-pod fetch failures are reported inline rather than
    /// failing the whole dump.
    pub async fn job_logs(&self, job: &str) -> Result<String, KubeError> {
        let pods_url = format!(
            "{}/api/v1/namespaces/{}/pods",
            self.base_url, self.namespace
        );
        let response = self
            .authorized(self.client.get(&pods_url))
            .query(&[("labelSelector", format!("job-name={job}"))])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let pods: PodList = Self::check(response).await?.json().await?;

        let mut sections = Vec::new();
        for pod in &pods.items {
            let name = &pod.metadata.name;
            let log_url = format!("{pods_url}/{name}/log");
            let section = match self.fetch_text(&log_url).await {
                Ok(text) => format!("=== Pod: {name} ===\n{text}"),
                Err(e) => format!("=== Pod: {name} ===\nError getting logs: {e}"),
            };
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, KubeError> {
        let response = self
            .authorized(self.client.get(url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.text().await?)
    }
}

impl JobStore for JobsApi {
    type Feed = JobWatchStream;

    async fn fetch(&self, name: &str) -> Result<Option<JobObject>, KubeError> {
        let url = format!("{}/{name}", self.jobs_url());
        let response = self
            .authorized(self.client.get(&url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let job = Self::check(response).await?.json::<JobObject>().await?;
        Ok(Some(job))
    }

    async fn list(&self) -> Result<Vec<JobObject>, KubeError> {
        let response = self
            .authorized(self.client.get(self.jobs_url()))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let list = Self::check(response).await?.json::<JobList>().await?;
        Ok(list.items)
    }

    async fn set_marker(&self, name: &str, kind: TransitionKind) -> Result<(), KubeError> {
        let url = format!("{}/{name}", self.jobs_url());
        let body = serde_json::json!({
            "metadata": {
                "annotations": { kind.annotation(): "true" }
            }
        });
        let response = self
            .authorized(self.client.patch(&url))
            .header("Content-Type", "application/merge-patch+json")
            .body(body.to_string())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        job: Option<&str>,
        resume: Option<&str>,
    ) -> Result<JobWatchStream, KubeError> {
        let mut params = vec![
            ("watch", "true".to_string()),
            ("timeoutSeconds", WATCH_TIMEOUT_SECS.to_string()),
        ];
        if let Some(job) = job {
            params.push(("fieldSelector", format!("metadata.name={job}")));
        }
        if let Some(rv) = resume {
            params.push(("resourceVersion", rv.to_string()));
        }
        debug!(namespace = %self.namespace, ?job, ?resume, "opening watch");

        // No request timeout here: the watch stays open until the server
        // closes it after `timeoutSeconds`.
        let response = self
            .authorized(self.client.get(self.jobs_url()))
            .query(&params)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(JobWatchStream {
            stream: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            buffer: Vec::new(),
        })
    }
}

/// A live watch subscription: frames the chunked response body into
/// newline-delimited JSON events.
pub struct JobWatchStream {
    stream: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: Vec<u8>,
}

impl JobWatchStream {
    fn parse_line(line: &[u8]) -> Result<Option<WatchEvent>, KubeError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let event = serde_json::from_slice::<WatchEvent>(line)?;
        Ok(Some(event))
    }
}

impl EventFeed for JobWatchStream {
    async fn next_event(&mut self) -> Result<Option<WatchEvent>, KubeError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if let Some(event) = Self::parse_line(&line[..line.len() - 1])? {
                    return Ok(Some(event));
                }
                continue;
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(KubeError::Network(e)),
                None => {
                    // Stream ended; a trailing line may lack its newline.
                    let rest = std::mem::take(&mut self.buffer);
                    return Self::parse_line(&rest);
                }
            }
        }
    }
}

fn build_http_client(ca_pem: Option<&[u8]>, insecure: bool) -> Result<Client, KubeError> {
    let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if let Some(pem) = ca_pem {
        let cert = Certificate::from_pem(pem)
            .map_err(|e| KubeError::Config(format!("invalid CA bundle: {e}")))?;
        builder = builder.add_root_certificate(cert);
    }
    if insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }
    Ok(builder.build()?)
}
