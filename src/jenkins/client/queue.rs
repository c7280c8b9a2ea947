use log::info;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::JenkinsClient;
use crate::error::{JenkinsError, Result};
use crate::jenkins::types::{BuildNumber, QueueId, QueueItem, RunningBuild};

impl JenkinsClient {
    pub async fn queue(&self) -> Result<Vec<QueueItem>> {
        let url = self.url(&["queue", "api", "json"])?;
        let response: QueueResponse = self.get_json("Fetching build queue", url).await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| QueueItem {
                id: QueueId::from(item.id),
                task_name: item.task.map(|task| task.name).unwrap_or_default(),
                params: item.params.trim().to_string(),
                why: item.why,
                blocked: item.blocked,
                stuck: item.stuck,
                in_queue_since: item.in_queue_since,
            })
            .collect())
    }

    /// Builds currently holding an executor, regular or flyweight.
    pub async fn running_builds(&self) -> Result<Vec<RunningBuild>> {
        let mut url = self.url(&["computer", "api", "json"])?;
        url.query_pairs_mut().append_pair("depth", "1");
        let response: ComputerResponse = self.get_json("Fetching executors", url).await?;

        Ok(response
            .computer
            .into_iter()
            .flat_map(|computer| computer.executors.into_iter().chain(computer.one_off_executors))
            .filter_map(|executor| executor.current_executable)
            .filter_map(|executable| {
                Some(RunningBuild {
                    job_name: job_from_executable_url(&executable.url)?,
                    build_number: BuildNumber::from(executable.number),
                })
            })
            .collect())
    }

    /// Removes an item from the build queue. Jenkins answers 200 or 302.
    pub async fn cancel_queue_item(&self, queue_id: &QueueId) -> Result<bool> {
        if queue_id.as_str().trim().is_empty() {
            return Err(JenkinsError::Config("queue ID cannot be empty".to_string()));
        }

        let mut url = self.url(&["queue", "cancelItem"])?;
        url.query_pairs_mut().append_pair("id", queue_id.as_str());
        let response = self.post_with_crumb(url, None).await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::FOUND {
            info!("Cancelled queue item {queue_id}");
            Ok(true)
        } else {
            Err(JenkinsError::api(
                format!("Cancelling queue item {queue_id}"),
                status,
            ))
        }
    }
}

#[derive(Deserialize)]
struct QueueResponse {
    #[serde(default)]
    items: Vec<QueueEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntry {
    id: u64,
    #[serde(default)]
    task: Option<Task>,
    #[serde(default)]
    params: String,
    #[serde(default)]
    why: Option<String>,
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    stuck: bool,
    #[serde(default)]
    in_queue_since: i64,
}

#[derive(Deserialize)]
struct Task {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ComputerResponse {
    #[serde(default)]
    computer: Vec<Computer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Computer {
    #[serde(default)]
    executors: Vec<Executor>,
    #[serde(default)]
    one_off_executors: Vec<Executor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Executor {
    #[serde(default)]
    current_executable: Option<CurrentExecutable>,
}

#[derive(Deserialize)]
struct CurrentExecutable {
    number: u64,
    #[serde(default)]
    url: String,
}

/// `http://host/job/team/job/deploy/17/` → `team/deploy`
fn job_from_executable_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();

    let names: Vec<&str> = segments
        .windows(2)
        .filter(|pair| pair[0] == "job" && !pair[1].is_empty())
        .map(|pair| pair[1])
        .collect();

    (!names.is_empty()).then(|| names.join("/"))
}
