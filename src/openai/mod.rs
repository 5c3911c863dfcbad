//! Blocking client for OpenAI-compatible HTTP APIs.
//!
//! The embedding, chat and speech providers all share this client for
//! authentication, timeouts and error classification.


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use ureq::unversioned::multipart::Form;
use url::Url;

use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .api_url()
            .context("Failed to generate API URL from config")?;
        let api_key = config.api_key().context("Failed to resolve API key")?;

        Ok(Self::from_parts(base_url, api_key)
            .with_timeout(config.openai.timeout())
            .with_retry_attempts(config.openai.retry_attempts))
    }

    /// Build a client from an already normalised base URL (must end with `/`)
    #[inline]
    pub fn from_parts(base_url: Url, api_key: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            base_url,
            api_key: api_key.into(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the API is reachable and accepts the configured key
    #[inline]
    pub fn ping(&self) -> Result<()> {
        debug!("Pinging API at {}", self.base_url);

        let models = self.list_models().context("Failed to ping API")?;

        info!(
            "API at {} is reachable ({} models available)",
            self.base_url,
            models.len()
        );
        Ok(())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("models")?;
        let authorization = self.authorization();

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .header("Authorization", authorization.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.data.len());
        Ok(models_response.data)
    }

    /// POST a JSON body and return the response body as text
    #[inline]
    pub fn post_json<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = self.endpoint(endpoint)?;
        let authorization = self.authorization();
        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize request for {}", endpoint))?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Authorization", authorization.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .with_context(|| format!("Request to {} failed", endpoint))
    }

    /// POST a JSON body and return the raw response bytes, e.g. synthesized audio
    #[inline]
    pub fn post_json_for_bytes<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<Vec<u8>> {
        let url = self.endpoint(endpoint)?;
        let authorization = self.authorization();
        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize request for {}", endpoint))?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Authorization", authorization.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_vec())
        })
        .with_context(|| format!("Request to {} failed", endpoint))
    }

    /// POST a `multipart/form-data` body and return the response body as text.
    ///
    /// A form is consumed when sent, so `build_form` is called once per attempt.
    #[inline]
    pub fn post_multipart<'a, F>(&self, endpoint: &str, build_form: F) -> Result<String>
    where
        F: Fn() -> Result<Form<'a>, ureq::Error>,
    {
        let url = self.endpoint(endpoint)?;
        let authorization = self.authorization();

        self.make_request_with_retry(|| {
            let form = build_form()?;
            self.agent
                .post(url.as_str())
                .header("Authorization", authorization.as_str())
                .send(form)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .with_context(|| format!("Request to {} failed", endpoint))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn make_request_with_retry<T, F>(&self, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed")))
    }
}
