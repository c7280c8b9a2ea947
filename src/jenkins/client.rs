mod builds;
mod logs;
mod pipelines;
mod queue;
mod views;

use std::time::Duration;

use indexmap::IndexMap;
use log::debug;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{redirect, Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{Config, Credentials};
use crate::error::{JenkinsError, Result};

/// Authenticated client for a Jenkins server.
///
/// Every call is a single request; nothing here retries. Retry policy belongs
/// to the workflow that drives the client.
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl JenkinsClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.credentials, config.timeout())
    }

    /// Creates a client for `credentials` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `JenkinsError::Config` if a credential is missing or the base
    /// URL is not an http(s) URL.
    pub fn with_timeout(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        credentials.validate()?;

        let base_url = Url::parse(credentials.base_api.trim())
            .map_err(|e| JenkinsError::Config(format!("Invalid base URL: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(JenkinsError::Config(format!(
                "Invalid base URL: {base_url} is not an http(s) URL"
            )));
        }

        // 201 and 302 carry meaning for Jenkins POSTs, so redirects are not followed.
        let client = Client::builder()
            .user_agent(concat!("jenkins-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| JenkinsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credentials: credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(
            &self.credentials.username,
            Some(self.credentials.token.as_str()),
        )
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| JenkinsError::Config(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL under a job; `folder/job` paths become `/job/folder/job/job`.
    fn job_url(&self, job: &str, tail: &[&str]) -> Result<Url> {
        let segments: Vec<&str> = job_segments(job).chain(tail.iter().copied()).collect();
        self.url(&segments)
    }

    /// Sends an authenticated GET and rejects any non-2xx status.
    async fn get(&self, operation: &str, url: Url) -> Result<Response> {
        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JenkinsError::api(operation, status));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: Url) -> Result<T> {
        let body = self.get(operation, url).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| JenkinsError::parse(operation, e))
    }

    /// Sends an authenticated POST carrying a freshly fetched crumb.
    ///
    /// The status is returned untouched; each caller decides which codes
    /// count as success.
    async fn post_with_crumb(
        &self,
        url: Url,
        form: Option<&IndexMap<String, String>>,
    ) -> Result<Response> {
        let crumb = self.crumb().await?;
        let name = HeaderName::from_bytes(crumb.field.as_bytes())
            .map_err(|e| JenkinsError::Auth(format!("Invalid crumb header name: {e}")))?;
        let value = HeaderValue::from_str(&crumb.value)
            .map_err(|e| JenkinsError::Auth(format!("Invalid crumb value: {e}")))?;

        debug!("POST {url}");
        let mut request = self.auth_request(self.client.post(url)).header(name, value);
        if let Some(form) = form {
            request = request.form(form);
        }

        Ok(request.send().await?)
    }
}

fn job_segments(job: &str) -> impl Iterator<Item = &str> {
    job.split('/')
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| ["job", segment])
}
