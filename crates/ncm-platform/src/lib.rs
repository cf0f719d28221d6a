//! ---
//! ncm_section: "04-platform-integration"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Service-platform REST client with cached bearer token."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! REST client for the external licensing service platform. Carries one
//! cached bearer token per process; a 401 from the platform invalidates the
//! cache and surfaces as [`NcmError::ServicePlatformUnauthorized`] so the
//! operator knows to re-login.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ncm_baseline::{BaselineRegistration, PlatformRegistrar};
use ncm_common::config::PlatformConfig;
use ncm_common::{NcmError, NcmResult};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBaselineBody<'a> {
    baseline_name: &'a str,
    sku_quantities: &'a BTreeMap<String, u32>,
}

/// HTTP client for the service platform. A missing endpoint leaves the
/// client constructible but rejects every registration.
#[derive(Debug)]
pub struct ServicePlatformClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    token: Mutex<Option<String>>,
}

impl ServicePlatformClient {
    /// Build a client from the platform section of the app configuration.
    pub fn new(config: &PlatformConfig) -> NcmResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &config.http_proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| NcmError::BadRequest(format!("invalid http proxy: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|err| NcmError::Internal(format!("http client: {err}")))?;
        Ok(Self {
            http,
            endpoint: config
                .endpoint
                .as_deref()
                .map(|endpoint| endpoint.trim_end_matches('/').to_owned()),
            token: Mutex::new(None),
        })
    }

    /// Cache the bearer token obtained by an operator login.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock() = Some(token.into());
    }

    /// Drop the cached token; the next call demands a re-login.
    pub fn invalidate_token(&self) {
        *self.token.lock() = None;
    }

    /// Whether a token is currently cached.
    pub fn has_token(&self) -> bool {
        self.token.lock().is_some()
    }

    fn bearer(&self) -> NcmResult<String> {
        self.token
            .lock()
            .clone()
            .ok_or(NcmError::ServicePlatformUnauthorized)
    }
}

#[async_trait]
impl PlatformRegistrar for ServicePlatformClient {
    async fn register_baseline(&self, registration: &BaselineRegistration) -> NcmResult<()> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            NcmError::BadRequest("service platform endpoint is not configured".to_owned())
        })?;
        let token = self.bearer()?;
        let url = format!(
            "{endpoint}/projects/{}/baselines",
            registration.platform_project_id
        );
        let body = RegisterBaselineBody {
            baseline_name: &registration.baseline_name,
            sku_quantities: &registration.sku_quantities,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| NcmError::Internal(format!("service platform request: {err}")))?;

        let status = response.status();
        if status.is_success() {
            info!(
                platform_project_id = registration.platform_project_id,
                baseline = %registration.baseline_name,
                "baseline registered with the service platform"
            );
            return Ok(());
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("service platform token expired; cached token dropped");
            self.invalidate_token();
            return Err(NcmError::ServicePlatformUnauthorized);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(NcmError::Internal(format!(
            "service platform returned {status}: {detail}"
        )))
    }
}
