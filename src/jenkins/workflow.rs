use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::time::{sleep, Instant};

use super::client::JenkinsClient;
use super::types::{Build, BuildNumber, QueueId, RunStatus, Stage};
use crate::config::PollSettings;
use crate::error::Result;

/// Waits and attempt budgets for one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub queue_initial_delay: Duration,
    pub queue_retry_delay: Duration,
    pub queue_attempts: u32,
    pub stage_interval: Duration,
    /// `None` watches stages until the run finishes
    pub stage_timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollSettings::default().policy()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Submitting,
    Queued,
    Building,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueResolution {
    Building(BuildNumber),
    /// The queue item never got a build number within the attempt budget
    Abandoned { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub job: String,
    pub queue_id: QueueId,
    pub build: Build,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Completed(BuildReport),
    Abandoned { queue_id: QueueId, attempts: u32 },
}

/// Progress of a stage watch, in declared stage order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageEvent<'a> {
    Waiting {
        index: usize,
        total: usize,
        stage: &'a Stage,
    },
    Passed {
        index: usize,
        total: usize,
        stage: &'a Stage,
        /// Known only when the stage itself was seen passing
        duration: Option<Duration>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Every declared stage was confirmed
    Finished(RunStatus),
    /// The run ended without succeeding
    Halted(RunStatus),
    TimedOut { stage: String },
}

/// Drives a build from submission to completion.
pub struct BuildWorkflow<'a> {
    client: &'a JenkinsClient,
    policy: PollPolicy,
    phase: BuildPhase,
}

impl<'a> BuildWorkflow<'a> {
    pub fn new(client: &'a JenkinsClient, policy: PollPolicy) -> Self {
        Self {
            client,
            policy,
            phase: BuildPhase::Submitting,
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    fn transition(&mut self, next: BuildPhase) {
        debug!("Workflow {:?} -> {next:?}", self.phase);
        self.phase = next;
    }

    /// Queues the build; every submission fetches its own crumb.
    pub async fn submit(&mut self, job: &str, params: &IndexMap<String, String>) -> Result<QueueId> {
        self.transition(BuildPhase::Submitting);
        let queue_id = self.client.submit_build(job, params).await?;
        self.transition(BuildPhase::Queued);
        Ok(queue_id)
    }

    /// Polls the queue until the item has a build number or the attempt
    /// budget runs out.
    ///
    /// Transport failures use up an attempt; any other error is returned.
    pub async fn await_build_number(&mut self, queue_id: &QueueId) -> Result<QueueResolution> {
        self.transition(BuildPhase::Queued);
        let attempts = self.policy.queue_attempts;

        sleep(self.policy.queue_initial_delay).await;
        for attempt in 1..=attempts {
            match self.client.resolve_build_number(queue_id).await {
                Ok(Some(number)) => {
                    info!("Queue item {queue_id} is build #{number} (attempt {attempt})");
                    self.transition(BuildPhase::Building);
                    return Ok(QueueResolution::Building(number));
                }
                Ok(None) => debug!("Queue item {queue_id} still waiting ({attempt}/{attempts})"),
                Err(e) if e.is_network() => {
                    warn!("Queue lookup {attempt}/{attempts} for {queue_id} failed: {e}")
                }
                Err(e) => return Err(e),
            }

            if attempt < attempts {
                sleep(self.policy.queue_retry_delay).await;
            }
        }

        warn!("Queue item {queue_id} has no build number after {attempts} lookups");
        self.transition(BuildPhase::Abandoned);
        Ok(QueueResolution::Abandoned { attempts })
    }

    pub async fn report(&mut self, job: &str, number: &BuildNumber) -> Result<Build> {
        let build = self.client.build_status(job, number).await?;
        self.transition(BuildPhase::Completed);
        Ok(build)
    }

    /// Submit, wait for a build number, then fetch the build.
    pub async fn trigger(
        &mut self,
        job: &str,
        params: &IndexMap<String, String>,
    ) -> Result<WorkflowOutcome> {
        let queue_id = self.submit(job, params).await?;

        match self.await_build_number(&queue_id).await? {
            QueueResolution::Building(number) => {
                let build = self.report(job, &number).await?;
                Ok(WorkflowOutcome::Completed(BuildReport {
                    job: job.to_string(),
                    queue_id,
                    build,
                }))
            }
            QueueResolution::Abandoned { attempts } => {
                Ok(WorkflowOutcome::Abandoned { queue_id, attempts })
            }
        }
    }

    /// Follows the stages of a pipeline build in declared order.
    ///
    /// Stages are matched to the live run by id. A successful run completes
    /// every remaining stage without further requests; a failed, aborted or
    /// unstable run stops the watch.
    pub async fn watch_stages<F>(
        &self,
        job: &str,
        number: &BuildNumber,
        mut on_event: F,
    ) -> Result<StageOutcome>
    where
        F: FnMut(StageEvent<'_>),
    {
        let started = Instant::now();

        let mut live = self.client.workflow_describe(job, number).await?;
        if live.status.halts() {
            info!("{job} #{number} already ended with {}", live.status);
            return Ok(StageOutcome::Halted(live.status));
        }

        let declared = self.client.pipeline_stages(job).await?;
        let total = declared.len();

        for (index, stage) in declared.iter().enumerate() {
            on_event(StageEvent::Waiting {
                index,
                total,
                stage,
            });

            loop {
                if live.status.is_success() {
                    on_event(StageEvent::Passed {
                        index,
                        total,
                        stage,
                        duration: None,
                    });
                    break;
                }
                if live.status.halts() {
                    info!("{job} #{number} ended with {} during {}", live.status, stage.name);
                    return Ok(StageOutcome::Halted(live.status));
                }
                if let Some(current) = live.stage(&stage.id).filter(|s| s.status.is_success()) {
                    on_event(StageEvent::Passed {
                        index,
                        total,
                        stage,
                        duration: Some(current.duration()),
                    });
                    break;
                }

                if let Some(timeout) = self.policy.stage_timeout {
                    if started.elapsed() >= timeout {
                        warn!("Gave up watching {job} #{number} at stage {}", stage.name);
                        return Ok(StageOutcome::TimedOut {
                            stage: stage.name.clone(),
                        });
                    }
                }

                sleep(self.policy.stage_interval).await;
                live = self.client.workflow_describe(job, number).await?;
            }
        }

        Ok(StageOutcome::Finished(live.status))
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::test_support::{client_for, credentials, mock_crumb};
    use super::*;
    use crate::error::JenkinsError;
    use mockito::{Matcher, Mock, Server};

    fn instant_policy(queue_attempts: u32) -> PollPolicy {
        PollPolicy {
            queue_initial_delay: Duration::ZERO,
            queue_retry_delay: Duration::ZERO,
            queue_attempts,
            stage_interval: Duration::ZERO,
            stage_timeout: None,
        }
    }

    fn params() -> IndexMap<String, String> {
        IndexMap::from([("pro".to_string(), "prod".to_string())])
    }

    async fn mock_submission(server: &mut Server, expected_calls: usize) -> Mock {
        server
            .mock("POST", "/job/deploy/buildWithParameters")
            .match_header("jenkins-crumb", "abc123")
            .match_body(Matcher::UrlEncoded("pro".into(), "prod".into()))
            .with_status(201)
            .with_header("location", "http://host/queue/item/42/")
            .expect(expected_calls)
            .create_async()
            .await
    }

    async fn mock_queue_item(server: &mut Server, body: &str, expected_calls: usize) -> Mock {
        server
            .mock("GET", "/queue/item/42/api/json")
            .with_status(200)
            .with_body(body)
            .expect(expected_calls)
            .create_async()
            .await
    }

    async fn mock_describe(server: &mut Server, body: &str) -> Mock {
        server
            .mock("GET", "/job/deploy/17/wfapi/describe")
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    async fn mock_declared_stages(server: &mut Server) -> Mock {
        server
            .mock("GET", "/job/deploy/wfapi/runs")
            .with_status(200)
            .with_body(
                r#"[{"id": "16", "status": "SUCCESS", "stages": [
                    {"id": "6", "name": "Checkout", "status": "SUCCESS"},
                    {"id": "12", "name": "Build", "status": "SUCCESS"},
                    {"id": "25", "name": "Deploy", "status": "SUCCESS"}
                ]}]"#,
            )
            .create_async()
            .await
    }

    fn describe_event(event: StageEvent<'_>) -> String {
        match event {
            StageEvent::Waiting { stage, .. } => format!("waiting {}", stage.id),
            StageEvent::Passed {
                stage, duration, ..
            } => format!("passed {} {:?}", stage.id, duration.map(|d| d.as_millis())),
        }
    }

    #[tokio::test]
    async fn test_trigger_resolves_after_retries() {
        let mut server = Server::new_async().await;
        let crumb = mock_crumb(&mut server, 1).await;
        let submit = mock_submission(&mut server, 1).await;
        let waiting = mock_queue_item(&mut server, r#"{"id": 42, "why": "busy"}"#, 2).await;
        let _ready =
            mock_queue_item(&mut server, r#"{"id": 42, "executable": {"number": 17}}"#, 1).await;
        let _build = server
            .mock("GET", "/job/deploy/17/api/json")
            .with_status(200)
            .with_body(
                r#"{"queueId": 42, "number": 17, "building": true, "fullDisplayName": "deploy #17",
                    "changeSets": [{"items": [
                        {"commitId": "a1b2c3", "timestamp": 1700000000000,
                         "author": {"fullName": "Dana"}, "comment": "Fix login\n"}
                    ]}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(5));
        let outcome = workflow.trigger("deploy", &params()).await.unwrap();

        let report = match outcome {
            WorkflowOutcome::Completed(report) => report,
            other => panic!("expected a completed build, got {other:?}"),
        };
        assert_eq!(report.job, "deploy");
        assert_eq!(report.queue_id.as_str(), "42");
        assert_eq!(report.build.number.as_str(), "17");
        assert!(report.build.building);
        assert_eq!(report.build.change_sets[0].comment, "Fix login");
        assert_eq!(workflow.phase(), BuildPhase::Completed);

        crumb.assert_async().await;
        submit.assert_async().await;
        waiting.assert_async().await;
    }

    #[tokio::test]
    async fn test_abandons_after_exactly_the_attempt_budget() {
        let mut server = Server::new_async().await;
        let _crumb = mock_crumb(&mut server, 1).await;
        let _submit = mock_submission(&mut server, 1).await;
        let lookups = mock_queue_item(&mut server, r#"{"id": 42}"#, 3).await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(3));
        let outcome = workflow.trigger("deploy", &params()).await.unwrap();

        assert_eq!(
            outcome,
            WorkflowOutcome::Abandoned {
                queue_id: QueueId::from("42"),
                attempts: 3,
            }
        );
        assert_eq!(workflow.phase(), BuildPhase::Abandoned);
        lookups.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_submission_never_polls() {
        let mut server = Server::new_async().await;
        let _crumb = mock_crumb(&mut server, 1).await;
        let _submit = server
            .mock("POST", "/job/deploy/buildWithParameters")
            .with_status(403)
            .create_async()
            .await;
        let lookups = mock_queue_item(&mut server, r#"{"id": 42}"#, 0).await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(3));
        let err = workflow.trigger("deploy", &params()).await.unwrap_err();

        assert!(matches!(err, JenkinsError::Api { status: 403, .. }));
        lookups.assert_async().await;
    }

    #[tokio::test]
    async fn test_each_submission_fetches_a_new_crumb() {
        let mut server = Server::new_async().await;
        let crumb = mock_crumb(&mut server, 2).await;
        let submit = mock_submission(&mut server, 2).await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(1));
        workflow.submit("deploy", &params()).await.unwrap();
        workflow.submit("deploy", &params()).await.unwrap();

        assert_eq!(workflow.phase(), BuildPhase::Queued);
        crumb.assert_async().await;
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_queue_api_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let lookup = server
            .mock("GET", "/queue/item/42/api/json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(4));
        let err = workflow
            .await_build_number(&QueueId::from("42"))
            .await
            .unwrap_err();

        assert!(matches!(err, JenkinsError::Api { status: 404, .. }));
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_uses_up_attempts() {
        // Nothing listens on port 1, so every lookup is a transport failure.
        let client = JenkinsClient::with_timeout(
            &credentials("http://127.0.0.1:1"),
            Duration::from_secs(2),
        )
        .unwrap();
        let mut workflow = BuildWorkflow::new(&client, instant_policy(3));

        let resolution = workflow
            .await_build_number(&QueueId::from("42"))
            .await
            .unwrap();

        assert_eq!(resolution, QueueResolution::Abandoned { attempts: 3 });
        assert_eq!(workflow.phase(), BuildPhase::Abandoned);
    }

    #[tokio::test]
    async fn test_zero_attempts_abandons_without_lookup() {
        let mut server = Server::new_async().await;
        let lookups = mock_queue_item(&mut server, r#"{"id": 42}"#, 0).await;

        let client = client_for(&server);
        let mut workflow = BuildWorkflow::new(&client, instant_policy(0));
        let resolution = workflow
            .await_build_number(&QueueId::from("42"))
            .await
            .unwrap();

        assert_eq!(resolution, QueueResolution::Abandoned { attempts: 0 });
        lookups.assert_async().await;
    }

    #[tokio::test]
    async fn test_watch_stages_correlates_by_id_and_short_circuits() {
        let mut server = Server::new_async().await;
        let first = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        // Build listed first and already passing must not confirm Checkout.
        let second = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "12", "name": "Build", "status": "SUCCESS"},
                {"id": "6", "name": "Checkout", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        let third = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "SUCCESS", "durationMillis": 1500},
                {"id": "12", "name": "Build", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        let last = mock_describe(&mut server, r#"{"id": "17", "status": "SUCCESS", "stages": []}"#)
            .await;
        let _declared = mock_declared_stages(&mut server).await;

        let client = client_for(&server);
        let workflow = BuildWorkflow::new(&client, instant_policy(1));
        let mut events = Vec::new();
        let outcome = workflow
            .watch_stages("deploy", &BuildNumber::from("17"), |event| {
                events.push(describe_event(event))
            })
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::Finished(RunStatus::Success));
        assert_eq!(
            events,
            vec![
                "waiting 6",
                "passed 6 Some(1500)",
                "waiting 12",
                "passed 12 None",
                "waiting 25",
                "passed 25 None",
            ]
        );
        for mock in [first, second, third, last] {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_confirmed_stage_is_never_revisited() {
        let mut server = Server::new_async().await;
        let _first = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "SUCCESS"},
                {"id": "12", "name": "Build", "status": "SUCCESS"},
                {"id": "25", "name": "Deploy", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        let _second = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "IN_PROGRESS"},
                {"id": "25", "name": "Deploy", "status": "SUCCESS"}
            ]}"#,
        )
        .await;
        let _declared = mock_declared_stages(&mut server).await;

        let client = client_for(&server);
        let workflow = BuildWorkflow::new(&client, instant_policy(1));
        let mut passed = Vec::new();
        let outcome = workflow
            .watch_stages("deploy", &BuildNumber::from("17"), |event| {
                if let StageEvent::Passed { stage, .. } = event {
                    passed.push(stage.id.clone());
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::Finished(RunStatus::InProgress));
        assert_eq!(passed, vec!["6", "12", "25"]);
    }

    #[tokio::test]
    async fn test_finished_failure_halts_before_listing_stages() {
        let mut server = Server::new_async().await;
        let _describe =
            mock_describe(&mut server, r#"{"id": "17", "status": "FAILURE", "stages": []}"#).await;
        let declared = server
            .mock("GET", "/job/deploy/wfapi/runs")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let workflow = BuildWorkflow::new(&client, instant_policy(1));
        let mut events = 0;
        let outcome = workflow
            .watch_stages("deploy", &BuildNumber::from("17"), |_| events += 1)
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::Halted(RunStatus::Failure));
        assert_eq!(events, 0);
        declared.assert_async().await;
    }

    #[tokio::test]
    async fn test_abort_mid_watch_halts() {
        let mut server = Server::new_async().await;
        let _first = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        let _second =
            mock_describe(&mut server, r#"{"id": "17", "status": "ABORTED", "stages": []}"#).await;
        let _declared = mock_declared_stages(&mut server).await;

        let client = client_for(&server);
        let workflow = BuildWorkflow::new(&client, instant_policy(1));
        let mut events = Vec::new();
        let outcome = workflow
            .watch_stages("deploy", &BuildNumber::from("17"), |event| {
                events.push(describe_event(event))
            })
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::Halted(RunStatus::Aborted));
        assert_eq!(events, vec!["waiting 6"]);
    }

    #[tokio::test]
    async fn test_stage_deadline_gives_up() {
        let mut server = Server::new_async().await;
        let describe = mock_describe(
            &mut server,
            r#"{"id": "17", "status": "IN_PROGRESS", "stages": [
                {"id": "6", "name": "Checkout", "status": "IN_PROGRESS"}
            ]}"#,
        )
        .await;
        let _declared = mock_declared_stages(&mut server).await;

        let client = client_for(&server);
        let policy = PollPolicy {
            stage_timeout: Some(Duration::ZERO),
            ..instant_policy(1)
        };
        let workflow = BuildWorkflow::new(&client, policy);
        let outcome = workflow
            .watch_stages("deploy", &BuildNumber::from("17"), |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StageOutcome::TimedOut {
                stage: "Checkout".to_string()
            }
        );
        describe.assert_async().await;
    }

    #[test]
    fn test_default_policy_matches_settings() {
        let policy = PollPolicy::default();
        assert_eq!(policy.queue_attempts, 8);
        assert_eq!(policy.queue_initial_delay, Duration::from_secs(4));
        assert_eq!(policy.stage_timeout, Some(Duration::from_secs(1800)));
    }
}
