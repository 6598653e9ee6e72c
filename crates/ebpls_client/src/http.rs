//! HTTP client for the eBPLS mobile API.
//!
//! One `reqwest::Client` with a cookie store (the backend keeps the login
//! session in a cookie) and a per-request timeout chosen by call type.

use std::time::Duration;

use async_trait::async_trait;
use ebpls_types::{
    AddressDefaults, ApiErrorBody, ApplicationEdit, Barangay, BarangayList, BarangayRecord,
    LoginRequest, Municipality, MunicipalityRecord, Province, ProvinceRecord, Region, RegionRecord, User,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{AddressDirectory, ApplicationSource, ClientError, ClientTimeouts, Result, SessionApi};

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    timeouts: ClientTimeouts,
}

impl HttpClient {
    /// Create a client for the given API base, e.g.
    /// `http://192.168.0.180:8080/ebpls/api/mobile`
    pub fn new(base_url: &str, timeouts: ClientTimeouts) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> ClientTimeouts {
        self.timeouts
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> Result<T> {
        let request = self.http.get(self.url(path));
        let response = self.send(request, path, timeout).await?;
        decode(path, response).await
    }

    /// GET where 404 or an empty/`null` body means "no such record"
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let request = self.http.get(self.url(path));
        match self.send(request, path, timeout).await {
            Ok(response) => decode_optional(path, response).await,
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str, timeout: Duration) -> Result<Response> {
        tracing::debug!(path, timeout_ms = timeout.as_millis() as u64, "eBPLS request");

        let response = request
            .timeout(timeout)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::text)
            .unwrap_or_else(|| default_status_message(status));
        tracing::warn!(path, status = status.as_u16(), %message, "eBPLS request failed");

        Err(ClientError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

fn transport_error(path: &str, source: reqwest::Error) -> ClientError {
    if source.is_timeout() {
        ClientError::Timeout {
            path: path.to_string(),
        }
    } else {
        ClientError::Transport {
            path: path.to_string(),
            source,
        }
    }
}

fn default_status_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_default()
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
        path: path.to_string(),
        source,
    })
}

async fn decode_optional<T: DeserializeOwned>(path: &str, response: Response) -> Result<Option<T>> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(path, e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl AddressDirectory for HttpClient {
    async fn list_regions(&self) -> Result<Vec<Region>> {
        self.get("/regions", self.timeouts.directory).await
    }

    async fn list_provinces(&self, region_id: i64) -> Result<Vec<Province>> {
        self.get(&format!("/provinces/{region_id}"), self.timeouts.directory)
            .await
    }

    async fn list_municipalities(&self, province_id: i64) -> Result<Vec<Municipality>> {
        self.get(
            &format!("/municipalities/{province_id}"),
            self.timeouts.directory,
        )
        .await
    }

    async fn list_barangays(&self, municipality_id: i64) -> Result<Vec<Barangay>> {
        let list: BarangayList = self
            .get(
                &format!("/barangays/{municipality_id}"),
                self.timeouts.directory,
            )
            .await?;
        Ok(list.barangays)
    }

    async fn get_barangay(&self, barangay_id: i64) -> Result<Option<BarangayRecord>> {
        self.get_optional(&format!("/barangay/{barangay_id}"), self.timeouts.directory)
            .await
    }

    async fn get_municipality(&self, municipality_id: i64) -> Result<Option<MunicipalityRecord>> {
        self.get_optional(
            &format!("/municipality/{municipality_id}"),
            self.timeouts.directory,
        )
        .await
    }

    async fn get_province(&self, province_id: i64) -> Result<Option<ProvinceRecord>> {
        self.get_optional(&format!("/province/{province_id}"), self.timeouts.directory)
            .await
    }

    async fn get_region(&self, region_id: i64) -> Result<Option<RegionRecord>> {
        self.get_optional(&format!("/region/{region_id}"), self.timeouts.directory)
            .await
    }

    async fn address_defaults(&self) -> Result<AddressDefaults> {
        self.get("/addresses/defaults", self.timeouts.directory).await
    }
}

#[async_trait]
impl ApplicationSource for HttpClient {
    async fn fetch_application_for_edit(&self, application_id: &str) -> Result<ApplicationEdit> {
        self.get(
            &format!("/applications/{application_id}/edit"),
            self.timeouts.application,
        )
        .await
    }
}

#[async_trait]
impl SessionApi for HttpClient {
    /// A 401 means "not logged in", not an error.
    async fn current_user(&self) -> Result<Option<User>> {
        let path = "/me";
        let request = self.http.get(self.url(path));
        match self.send(request, path, self.timeouts.session).await {
            Ok(response) => decode_optional(path, response).await,
            Err(ClientError::Status { status: 401, .. }) => {
                tracing::debug!("Not authenticated (401)");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let path = "/login";
        let request = self
            .http
            .post(self.url(path))
            .json(&LoginRequest { username, password });
        self.send(request, path, self.timeouts.login).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let path = "/logout";
        let request = self.http.post(self.url(path)).json(&serde_json::json!({}));
        self.send(request, path, self.timeouts.logout).await?;
        Ok(())
    }
}
