mod client;
mod log_stream;
pub mod types;
mod workflow;

pub use client::JenkinsClient;
pub use log_stream::{collect_log, log_stream};
pub use workflow::{
    BuildReport, BuildWorkflow, PollPolicy, StageEvent, StageOutcome, WorkflowOutcome,
};
