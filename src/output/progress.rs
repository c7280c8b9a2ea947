use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::report::format_duration;
use super::styling::{bright, bright_green, bright_red, bright_yellow, dim};
use crate::jenkins::StageEvent;

/// A single stderr spinner for one step of the build workflow.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl std::fmt::Display) -> Self {
        Self {
            pb: create_spinner(bright_yellow(message).to_string()),
        }
    }

    pub fn succeed(self, message: impl std::fmt::Display) {
        self.pb
            .finish_with_message(bright_green(format!("{message} ✓")).to_string());
    }

    pub fn fail(self, message: impl std::fmt::Display) {
        self.pb
            .finish_with_message(bright_red(format!("{message} ✗")).to_string());
    }
}

/// Renders stage-watch events, one spinner per stage.
#[derive(Default)]
pub struct StageProgress {
    current: Option<Spinner>,
}

impl StageProgress {
    pub fn new() -> Self {
        eprintln!("{}  {}", bright("🚦"), bright("Stages").underlined());
        Self::default()
    }

    pub fn on_event(&mut self, event: StageEvent<'_>) {
        match event {
            StageEvent::Waiting {
                index,
                total,
                stage,
            } => {
                self.current = Some(Spinner::start(stage_label(index, total, &stage.name)));
            }
            StageEvent::Passed {
                index,
                total,
                stage,
                duration,
            } => {
                let label = stage_label(index, total, &stage.name);
                let message = match duration {
                    Some(duration) => format!("{label} {}", dim(format_duration(duration))),
                    None => label,
                };
                match self.current.take() {
                    Some(spinner) => spinner.succeed(message),
                    None => eprintln!("  {}", bright_green(format!("{message} ✓"))),
                }
            }
        }
    }

    /// Marks the stage still being waited on, if any, as not passed.
    pub fn abandon(&mut self, message: impl std::fmt::Display) {
        if let Some(spinner) = self.current.take() {
            spinner.fail(message);
        }
    }
}

fn stage_label(index: usize, total: usize, name: &str) -> String {
    format!("Stage {}/{total}: {name}", index + 1)
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
