use std::collections::HashSet;

use log::debug;

use super::JenkinsClient;
use crate::error::Result;
use crate::jenkins::types::{BuildNumber, PipelineRun, Stage};

impl JenkinsClient {
    /// Stages declared by a pipeline job, gathered from its recent runs.
    pub async fn pipeline_stages(&self, job: &str) -> Result<Vec<Stage>> {
        let url = self.job_url(job, &["wfapi", "runs"])?;
        let runs: Vec<PipelineRun> = self
            .get_json(&format!("Fetching pipeline runs of {job}"), url)
            .await?;

        let stages = dedup_stages(runs.into_iter().map(|run| run.stages));
        debug!("{job} declares {} stages", stages.len());
        Ok(stages)
    }

    pub async fn workflow_describe(&self, job: &str, number: &BuildNumber) -> Result<PipelineRun> {
        let url = self.job_url(job, &[number.as_str(), "wfapi", "describe"])?;
        self.get_json(&format!("Describing {job} #{number}"), url).await
    }
}

/// Flattens stage lists in order, keeping only the first stage seen per id.
pub fn dedup_stages<I>(runs: I) -> Vec<Stage>
where
    I: IntoIterator<Item = Vec<Stage>>,
{
    let mut seen = HashSet::new();
    runs.into_iter()
        .flatten()
        .filter(|stage| seen.insert(stage.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client_for;
    use super::*;
    use crate::jenkins::types::RunStatus;

    fn stage(id: &str, name: &str, status: RunStatus) -> Stage {
        Stage {
            id: id.to_string(),
            name: name.to_string(),
            status,
            start_time_millis: 0,
            duration_millis: 0,
            pause_duration_millis: 0,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let runs = vec![
            vec![
                stage("6", "Checkout", RunStatus::Success),
                stage("12", "Build", RunStatus::Failure),
            ],
            vec![
                stage("6", "Checkout (renamed)", RunStatus::InProgress),
                stage("20", "Deploy", RunStatus::Success),
            ],
        ];

        let stages = dedup_stages(runs);

        let ids: Vec<&str> = stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["6", "12", "20"]);
        assert_eq!(stages[0].name, "Checkout");
        assert_eq!(stages[0].status, RunStatus::Success);
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_stages(Vec::<Vec<Stage>>::new()).is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_stages_over_http() {
        let mut server = mockito::Server::new_async().await;
        let _runs = server
            .mock("GET", "/job/deploy/wfapi/runs")
            .with_status(200)
            .with_body(
                r#"[
                    {"id": "18", "status": "IN_PROGRESS", "stages": [
                        {"id": "6", "name": "Checkout", "status": "SUCCESS"},
                        {"id": "12", "name": "Build", "status": "IN_PROGRESS"}
                    ]},
                    {"id": "17", "status": "SUCCESS", "stages": [
                        {"id": "6", "name": "Checkout", "status": "SUCCESS"},
                        {"id": "12", "name": "Build", "status": "SUCCESS"},
                        {"id": "25", "name": "Deploy", "status": "SUCCESS"}
                    ]}
                ]"#,
            )
            .create_async()
            .await;

        let stages = client_for(&server).pipeline_stages("deploy").await.unwrap();

        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Checkout", "Build", "Deploy"]);
        assert_eq!(stages[1].status, RunStatus::InProgress);
    }

    #[tokio::test]
    async fn test_workflow_describe_over_http() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("GET", "/job/deploy/17/wfapi/describe")
            .with_status(200)
            .with_body(
                r#"{"id": "17", "status": "ABORTED", "startTimeMillis": 1700000000000,
                    "endTimeMillis": 1700000060000, "durationMillis": 60000, "stages": []}"#,
            )
            .create_async()
            .await;

        let run = client_for(&server)
            .workflow_describe("deploy", &BuildNumber::from("17"))
            .await
            .unwrap();

        assert_eq!(run.id, "17");
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(run.duration_millis, 60000);
        assert!(run.stages.is_empty());
    }
}
