use std::time::Duration;

use dashboard_core::{
    EtlConfig, ExecuteRequest, FailureKind, JobId, JobSnapshot, JobStatus, Launch, RequestFailure,
};
use engine_logging::{engine_debug, targets};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ApiError;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base of every endpoint, e.g. `http://localhost:4001/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4001/api".to_string(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Generic `{status, message?}` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecuteResponse {
    /// Anything but `status == "started"` is a domain rejection.
    pub fn into_launch(self) -> Result<Launch, RequestFailure> {
        if self.status == "started" {
            return Ok(Launch {
                job_id: self.job_id,
                message: self.message,
            });
        }
        let reason = self
            .error
            .or(self.message)
            .unwrap_or_else(|| format!("backend answered status {:?}", self.status));
        Err(RequestFailure::new(FailureKind::Rejected, reason))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: String,
    #[serde(default)]
    pub logs: Option<String>,
}

impl JobRecord {
    pub fn into_snapshot(self, received_at: impl Into<String>) -> JobSnapshot {
        JobSnapshot {
            status: JobStatus::parse(&self.status),
            logs: self.logs,
            received_at: received_at.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Backend REST surface.
#[async_trait::async_trait]
pub trait DashboardApi: Send + Sync {
    async fn load_config(&self) -> Result<EtlConfig, ApiError>;
    async fn save_config(&self, config: &EtlConfig) -> Result<ApiAck, ApiError>;
    async fn toggle_system(&self, system_id: &str, active: bool) -> Result<ApiAck, ApiError>;
    async fn update_option(
        &self,
        system_id: &str,
        option: &str,
        value: bool,
    ) -> Result<ApiAck, ApiError>;
    async fn execute(&self, body: &ExecuteRequest) -> Result<ExecuteResponse, ApiError>;
    async fn cancel(&self, job_id: JobId) -> Result<ApiAck, ApiError>;
    async fn job(&self, job_id: JobId) -> Result<JobRecord, ApiError>;
    async fn health(&self) -> Result<HealthStatus, ApiError>;
    async fn credentials(&self) -> Result<serde_json::Value, ApiError>;
    async fn save_credentials(
        &self,
        credentials: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    settings: ApiSettings,
    base: reqwest::Url,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = reqwest::Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!(
                "{} cannot carry a path",
                settings.base_url
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|err| self.map_error(err))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| self.map_error(err))?;

        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message: error_detail(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn map_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            return ApiError::Timeout(self.settings.request_timeout);
        }
        ApiError::Network(err.to_string())
    }
}

/// FastAPI reports failures as `{"detail": ...}`.
fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }
    let parsed: Detail = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[async_trait::async_trait]
impl DashboardApi for HttpApi {
    async fn load_config(&self) -> Result<EtlConfig, ApiError> {
        self.send(self.client.get(self.endpoint(&["config"]))).await
    }

    async fn save_config(&self, config: &EtlConfig) -> Result<ApiAck, ApiError> {
        self.send(self.client.post(self.endpoint(&["config"])).json(config))
            .await
    }

    async fn toggle_system(&self, system_id: &str, active: bool) -> Result<ApiAck, ApiError> {
        let mut url = self.endpoint(&["sistemas", system_id, "toggle"]);
        url.query_pairs_mut().append_pair("ativo", flag(active));
        engine_debug!(target: targets::API, "PATCH {}", url);
        self.send(self.client.patch(url)).await
    }

    async fn update_option(
        &self,
        system_id: &str,
        option: &str,
        value: bool,
    ) -> Result<ApiAck, ApiError> {
        let mut url = self.endpoint(&["sistemas", system_id, "opcao"]);
        url.query_pairs_mut()
            .append_pair("opcao", option)
            .append_pair("valor", flag(value));
        engine_debug!(target: targets::API, "PATCH {}", url);
        self.send(self.client.patch(url)).await
    }

    async fn execute(&self, body: &ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        self.send(self.client.post(self.endpoint(&["execute"])).json(body))
            .await
    }

    async fn cancel(&self, job_id: JobId) -> Result<ApiAck, ApiError> {
        let id = job_id.to_string();
        self.send(self.client.post(self.endpoint(&["cancel", &id])))
            .await
    }

    async fn job(&self, job_id: JobId) -> Result<JobRecord, ApiError> {
        let id = job_id.to_string();
        self.send(self.client.get(self.endpoint(&["jobs", &id])))
            .await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.send(self.client.get(self.endpoint(&["health"]))).await
    }

    async fn credentials(&self) -> Result<serde_json::Value, ApiError> {
        self.send(self.client.get(self.endpoint(&["credentials"])))
            .await
    }

    async fn save_credentials(
        &self,
        credentials: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.send(self.client.post(self.endpoint(&["credentials"])).json(credentials))
            .await
    }
}
