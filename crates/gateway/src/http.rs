//! reqwest-backed gateway.

use std::error::Error as _;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use sprinklr_protocol::{
    Endpoint, ErrorBody, LastScheduleRun, LastSprinklerRun, RemoteStatus, StartRequest,
    StartResponse, StatusResponse, StopResponse, SystemState, Zone, ZoneId,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{GatewayError, SessionGateway, StartAck, StopAck, DEFAULT_TIMEOUT};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base, e.g. `http://192.168.88.160:8000/api`. A missing scheme
    /// defaults to `http://`.
    pub base_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Errors constructing an [`HttpGateway`]
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpGateway {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, BuildError> {
        let base_url = normalize_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Last zone run recorded by the backend, if any.
    pub async fn last_sprinkler_run(&self) -> Result<Option<LastSprinklerRun>, GatewayError> {
        self.call(Method::GET, Endpoint::LastSprinklerRun, None).await
    }

    /// Last schedule run recorded by the backend, if any.
    pub async fn last_schedule_run(&self) -> Result<Option<LastScheduleRun>, GatewayError> {
        self.call(Method::GET, Endpoint::LastScheduleRun, None).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<&StartRequest>,
    ) -> Result<T, GatewayError> {
        let url = self
            .base_url
            .join(endpoint.path())
            .map_err(|e| GatewayError::network(format!("Invalid request URL: {e}")))?;

        debug!(
            component = "gateway",
            event = "gateway.request",
            method = %method,
            url = %url,
        );

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = self.execute(request).await;

        if let Err(err) = &result {
            warn!(
                component = "gateway",
                event = "gateway.request_failed",
                endpoint = endpoint.path(),
                kind = ?err.kind,
                error = %err.message,
            );
        }

        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(classify_status(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            GatewayError::server(format!(
                "Malformed response from controller ({e}), see logs for details"
            ))
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            return GatewayError::timeout(self.timeout);
        }
        if err.is_decode() {
            return GatewayError::server(format!(
                "Malformed response from controller ({err}), see logs for details"
            ));
        }
        GatewayError::network(error_chain(&err))
    }
}

impl SessionGateway for HttpGateway {
    async fn query_status(&self) -> Result<RemoteStatus, GatewayError> {
        let resp: StatusResponse = self.call(Method::GET, Endpoint::Status, None).await?;
        Ok(resp.into())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, GatewayError> {
        self.call(Method::GET, Endpoint::Zones, None).await
    }

    async fn start(&self, zone: ZoneId, minutes: u32) -> Result<StartAck, GatewayError> {
        let req = StartRequest::from_minutes(zone, minutes);
        let resp: StartResponse = self.call(Method::POST, Endpoint::Start, Some(&req)).await?;

        if resp.system_status.as_ref().map(|s| s.state()) == Some(SystemState::Error) {
            return Err(GatewayError::server(
                resp.message
                    .unwrap_or_else(|| "Controller reported an error starting the zone".into()),
            ));
        }

        Ok(StartAck {
            zone: resp.zone.unwrap_or(zone),
            duration_secs: resp.duration.unwrap_or(req.duration),
            message: resp.message,
        })
    }

    async fn stop(&self) -> Result<StopAck, GatewayError> {
        let resp: StopResponse = self.call(Method::POST, Endpoint::Stop, None).await?;

        if resp.system_status.as_ref().map(|s| s.state()) == Some(SystemState::Error) {
            return Err(GatewayError::server(
                resp.message
                    .unwrap_or_else(|| "Controller reported an error stopping the system".into()),
            ));
        }

        Ok(StopAck {
            message: resp.message,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, BuildError> {
    let trimmed = raw.trim();
    let mut candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    // `Url::join` drops the last segment unless the base ends in '/'
    if !candidate.ends_with('/') {
        candidate.push('/');
    }

    Url::parse(&candidate).map_err(|e| BuildError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Map a non-2xx response onto the failure taxonomy.
fn classify_status(status: StatusCode, body: &[u8]) -> GatewayError {
    let detail = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.first_message().map(str::to_string));

    match detail {
        Some(detail) if status == StatusCode::SERVICE_UNAVAILABLE => GatewayError::hardware(detail),
        Some(detail) if status.is_server_error() => GatewayError::server(detail),
        Some(detail) => GatewayError::validation(detail),
        None => GatewayError::server(format!(
            "Unexpected response from controller ({status}), see logs for details"
        )),
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
