mod log_view;
mod progress;
mod report;
mod styling;
mod tables;

pub use log_view::{flush as flush_log, print_chunk as print_log_chunk};
pub use progress::{Spinner, StageProgress};
pub use report::{render_abandoned, render_build_report, render_run_header, render_stage_outcome};
pub use styling::{bright_green, bright_yellow, cyan, dim, magenta_bold};
pub use tables::{queue_table, running_table};

/// Prints the `jenkins-cli` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🛠  jenkins-cli"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Trigger and watch Jenkins builds")
    );
}
