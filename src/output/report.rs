use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use super::styling::{bright, bright_yellow, cyan, dim, run_status};
use crate::jenkins::types::{PipelineRun, QueueId};
use crate::jenkins::{BuildReport, StageOutcome};

/// `1m 05s`, `42s` or `850ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}s")
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Local time, or `-` when the server sent nothing usable.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(
        || "-".to_string(),
        |time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn format_timestamp(millis: i64) -> String {
    format_time(DateTime::from_timestamp_millis(millis))
}

/// Build number, status and change sets of a freshly started build.
pub fn render_build_report(report: &BuildReport) -> String {
    let build = &report.build;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "🍻 {} {} {}",
        cyan(&report.job),
        bright(format!("#{}", build.number)),
        dim(format!("(queue item {})", report.queue_id))
    );

    let status = match build.result {
        Some(result) => run_status(result).to_string(),
        None if build.building => bright_yellow("BUILDING").to_string(),
        None => bright_yellow("PENDING").to_string(),
    };
    if !build.display_name.is_empty() {
        let _ = writeln!(output, "  {} {}", dim("Name:"), build.display_name);
    }
    let _ = writeln!(output, "  {} {status}", dim("Status:"));
    if build.duration > Duration::ZERO {
        let _ = writeln!(
            output,
            "  {} {}",
            dim("Duration:"),
            format_duration(build.duration)
        );
    }

    if build.change_sets.is_empty() {
        let _ = writeln!(output, "  {}", bright_yellow("⚠️ No change sets"));
        return output;
    }

    let _ = writeln!(output, "  {}", bright("Changes").underlined());
    for (index, change) in build.change_sets.iter().enumerate() {
        let commit: String = change.commit_id.chars().take(8).collect();
        let _ = writeln!(
            output,
            "  {}. {} by {} {}",
            index + 1,
            change.comment,
            cyan(&change.author),
            dim(format!("({commit}, {})", format_timestamp(change.timestamp)))
        );
    }

    output
}

pub fn render_abandoned(job: &str, queue_id: &QueueId, attempts: u32) -> String {
    format!(
        "♻️  {} is still waiting in queue item {} after {attempts} lookups, check it later with {}",
        cyan(job),
        bright(queue_id),
        bright("jenkins-cli queue")
    )
}

/// Header printed before watching the stages of a run.
pub fn render_run_header(job: &str, run: &PipelineRun) -> String {
    format!(
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Job:"),
        cyan(job),
        dim("Build:"),
        bright(&run.id),
        dim("Started:"),
        format_time(run.started_at()),
        dim("Status:"),
        run_status(run.status)
    )
}

pub fn render_stage_outcome(outcome: &StageOutcome) -> String {
    match outcome {
        StageOutcome::Finished(status) => format!("🏁 All stages passed, run is {}", run_status(*status)),
        StageOutcome::Halted(status) => format!("🛑 Run ended with {}", run_status(*status)),
        StageOutcome::TimedOut { stage } => format!(
            "⏳ Stopped watching at stage {}, the build keeps running",
            bright_yellow(stage)
        ),
    }
}
