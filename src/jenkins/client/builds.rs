use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::Deserialize;

use super::JenkinsClient;
use crate::error::{JenkinsError, Result};
use crate::jenkins::types::{Build, BuildNumber, ChangeSet, CrumbToken, QueueId, RunStatus};

impl JenkinsClient {
    /// Fetches a CSRF crumb.
    ///
    /// # Errors
    ///
    /// Returns `JenkinsError::Auth` if the server answers with an empty field
    /// or value.
    pub async fn crumb(&self) -> Result<CrumbToken> {
        let url = self.url(&["crumbIssuer", "api", "json"])?;
        let response: CrumbResponse = self.get_json("Fetching crumb", url).await?;

        if response.crumb_request_field.is_empty() || response.crumb.is_empty() {
            return Err(JenkinsError::Auth(
                "received empty crumb from Jenkins".to_string(),
            ));
        }

        Ok(CrumbToken {
            field: response.crumb_request_field,
            value: response.crumb,
        })
    }

    /// Queues a build of `job` and returns the queue id.
    ///
    /// A fresh crumb is fetched for every call. Only HTTP 201 counts as
    /// accepted; the queue id is the last segment of the `Location` header.
    pub async fn submit_build(
        &self,
        job: &str,
        params: &IndexMap<String, String>,
    ) -> Result<QueueId> {
        let endpoint = if params.is_empty() {
            "build"
        } else {
            "buildWithParameters"
        };
        let url = self.job_url(job, &[endpoint])?;
        let operation = format!("Submitting build for {job}");

        let form = (!params.is_empty()).then_some(params);
        let response = self.post_with_crumb(url, form).await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(JenkinsError::api(operation, status));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| JenkinsError::parse(&operation, "response has no Location header"))?;

        let queue_id = self.queue_id_from_location(location).ok_or_else(|| {
            JenkinsError::parse(&operation, format!("unexpected Location header: {location}"))
        })?;

        info!("Queued {job} as queue item {queue_id}");
        Ok(queue_id)
    }

    /// Looks up the build number assigned to a queue item.
    ///
    /// `None` means the item is still waiting for an executor.
    pub async fn resolve_build_number(&self, queue_id: &QueueId) -> Result<Option<BuildNumber>> {
        let url = self.url(&["queue", "item", queue_id.as_str(), "api", "json"])?;
        let item: QueueItemResponse = self
            .get_json(&format!("Looking up queue item {queue_id}"), url)
            .await?;

        let number = item.executable.map(|executable| BuildNumber::from(executable.number));
        debug!("Queue item {queue_id} resolved to {number:?}");
        Ok(number)
    }

    pub async fn build_status(&self, job: &str, number: &BuildNumber) -> Result<Build> {
        let url = self.job_url(job, &[number.as_str(), "api", "json"])?;
        let response: BuildResponse = self
            .get_json(&format!("Fetching build {job} #{number}"), url)
            .await?;

        Ok(response.into_build())
    }

    /// Aborts a running build. Jenkins answers 200 or redirects with 302.
    pub async fn stop_build(&self, job: &str, number: &BuildNumber) -> Result<bool> {
        let url = self.job_url(job, &[number.as_str(), "stop"])?;
        let response = self.post_with_crumb(url, None).await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::FOUND {
            info!("Stopped {job} #{number}");
            Ok(true)
        } else {
            Err(JenkinsError::api(format!("Stopping {job} #{number}"), status))
        }
    }

    fn queue_id_from_location(&self, location: &str) -> Option<QueueId> {
        let url = self.base_url.join(location).ok()?;
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(QueueId::from)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbResponse {
    #[serde(default)]
    crumb_request_field: String,
    #[serde(default)]
    crumb: String,
}

#[derive(Deserialize)]
struct QueueItemResponse {
    #[serde(default)]
    executable: Option<Executable>,
}

#[derive(Deserialize)]
struct Executable {
    number: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildResponse {
    #[serde(default)]
    queue_id: u64,
    number: u64,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    result: Option<RunStatus>,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    full_display_name: String,
    #[serde(default)]
    change_sets: Vec<ChangeSetGroup>,
}

#[derive(Deserialize)]
struct ChangeSetGroup {
    #[serde(default)]
    items: Vec<ChangeSetItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeSetItem {
    #[serde(default)]
    commit_id: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    comment: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    #[serde(default)]
    full_name: String,
}

impl BuildResponse {
    fn into_build(self) -> Build {
        let change_sets = self
            .change_sets
            .into_iter()
            .flat_map(|group| group.items)
            .map(|item| ChangeSet {
                commit_id: item.commit_id,
                timestamp: item.timestamp,
                author: item.author.map(|a| a.full_name).unwrap_or_default(),
                comment: item.comment.trim_end().to_string(),
            })
            .collect();

        Build {
            queue_id: QueueId::from(self.queue_id),
            number: BuildNumber::from(self.number),
            building: self.building,
            result: self.result,
            duration: Duration::from_millis(self.duration),
            display_name: self.full_display_name,
            change_sets,
        }
    }
}
