//! HTTP client implementation using reqwest

use crate::config::ConnectionConfig;
use crate::debug::RequestLogger;
use crate::http::error::{map_http_error, map_transport_error};
use crate::http::{Method, RequestOptions};
use crate::protocol::Options;
use crate::providers::error::{AdapterError, AdapterResult};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("provider-gateway/", env!("CARGO_PKG_VERSION"));

/// Per-provider HTTP client.
///
/// Every call is reported to the shared [`RequestLogger`]: the request
/// before it is sent, then either the response or the failure.
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client (pooled, cheap to clone)
    client: Client,

    /// Provider id used in log entries
    provider: String,

    /// Base URL without trailing slash
    base_url: String,

    /// Headers sent on every request (auth, versioning)
    default_headers: HashMap<String, String>,

    /// Timeout when the caller sets none
    default_timeout: Duration,

    /// Maximum response size to prevent OOM
    max_response_size: usize,

    logger: Arc<RequestLogger>,
}

impl HttpClient {
    /// Create a client with default connection settings
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        logger: Arc<RequestLogger>,
    ) -> AdapterResult<Self> {
        Self::with_config(provider, base_url, logger, &ConnectionConfig::default())
    }

    /// Create a client with custom connection settings
    pub fn with_config(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        logger: Arc<RequestLogger>,
        config: &ConnectionConfig,
    ) -> AdapterResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| AdapterError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_headers: HashMap::new(),
            default_timeout: crate::protocol::DEFAULT_TIMEOUT,
            max_response_size: MAX_RESPONSE_SIZE,
            logger,
        })
    }

    /// Add a header sent on every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Set the timeout used when the caller passes none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn logger(&self) -> &Arc<RequestLogger> {
        &self.logger
    }

    /// POST a JSON payload and decode a JSON response
    pub async fn post_json(
        &self,
        endpoint: &str,
        payload: &Value,
        options: &Options,
    ) -> AdapterResult<Value> {
        self.execute(Method::Post, endpoint, Some(payload), options)
            .await
    }

    /// GET a JSON response
    pub async fn get_json(&self, endpoint: &str, options: &Options) -> AdapterResult<Value> {
        self.execute(Method::Get, endpoint, None, options).await
    }

    fn build_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&Value>,
        options: &Options,
    ) -> AdapterResult<Value> {
        let request_options = RequestOptions::from_options(options, self.default_timeout);
        let url = self.build_url(endpoint);

        let mut headers = self.default_headers.clone();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(key) = &request_options.idempotency_key {
            headers.insert("Idempotency-Key".to_string(), key.clone());
        }

        let request_id = self.logger.log_request(
            &self.provider,
            &format!("{} {}", method.as_str(), url),
            &headers,
            payload.unwrap_or(&Value::Null),
            options,
        );
        headers.insert("X-Request-ID".to_string(), request_id.to_string());

        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(request_options.timeout);

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = map_transport_error(&e);
                warn!(
                    provider = %self.provider,
                    %request_id,
                    error = %error,
                    "transport failure"
                );
                self.logger.log_response(
                    &self.provider,
                    Some(request_id),
                    0,
                    &HashMap::new(),
                    &Value::Null,
                    started.elapsed(),
                    Some(&error.to_string()),
                );
                return Err(error);
            }
        };

        let status = response.status().as_u16();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let oversized = response
            .content_length()
            .is_some_and(|len| len as usize > self.max_response_size);

        let body = if oversized {
            Err(AdapterError::decode(format!(
                "Response size exceeds maximum {}",
                self.max_response_size
            )))
        } else {
            response.text().await.map_err(|e| map_transport_error(&e))
        };
        let duration = started.elapsed();

        let body = match body {
            Ok(text) if text.len() > self.max_response_size => Err(AdapterError::decode(format!(
                "Response size {} exceeds maximum {}",
                text.len(),
                self.max_response_size
            ))),
            other => other,
        };

        let outcome = body.and_then(|text| {
            if !(200..300).contains(&status) {
                return Err(map_http_error(status, &text));
            }
            serde_json::from_str::<Value>(&text)
                .map_err(|e| AdapterError::decode(format!("Invalid JSON in response: {}", e)))
        });

        match outcome {
            Ok(value) => {
                debug!(provider = %self.provider, %request_id, status, "request completed");
                self.logger.log_response(
                    &self.provider,
                    Some(request_id),
                    status,
                    &response_headers,
                    &value,
                    duration,
                    None,
                );
                Ok(value)
            }
            Err(error) => {
                warn!(
                    provider = %self.provider,
                    %request_id,
                    status,
                    error = %error,
                    "request failed"
                );
                self.logger.log_response(
                    &self.provider,
                    Some(request_id),
                    status,
                    &response_headers,
                    &Value::Null,
                    duration,
                    Some(&error.to_string()),
                );
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
