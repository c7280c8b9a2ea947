use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::report::format_time;
use crate::jenkins::types::{QueueItem, RunningBuild};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Stuck items are red, blocked ones yellow.
fn flag_cell(set: bool, color: TableColor) -> Cell {
    if set {
        Cell::new("yes").fg(color)
    } else {
        Cell::new("no").fg(TableColor::DarkGrey)
    }
}

pub fn queue_table(items: &[QueueItem]) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Queue ID", "Job", "Params", "Why", "Blocked", "Stuck", "Queued Since",
    ]));

    for item in items {
        table.add_row(vec![
            Cell::new(&item.id),
            Cell::new(&item.task_name),
            Cell::new(&item.params),
            Cell::new(item.why.as_deref().unwrap_or("-")),
            flag_cell(item.blocked, TableColor::Yellow),
            flag_cell(item.stuck, TableColor::Red),
            Cell::new(format_time(item.enqueued_at())),
        ]);
    }

    table
}

pub fn running_table(builds: &[RunningBuild]) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Job", "Build"]));

    for build in builds {
        table.add_row(vec![
            Cell::new(&build.job_name),
            Cell::new(format!("#{}", build.build_number)).fg(TableColor::Green),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jenkins::types::{BuildNumber, QueueId};

    #[test]
    fn test_queue_table_rows() {
        let items = vec![QueueItem {
            id: QueueId::from(42),
            task_name: "deploy".to_string(),
            params: "pro=prod".to_string(),
            why: Some("Waiting for next available executor".to_string()),
            blocked: false,
            stuck: true,
            in_queue_since: 1_700_000_000_000,
        }];

        let rendered = queue_table(&items).to_string();

        assert!(rendered.contains("Queue ID"));
        assert!(rendered.contains("42"));
        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("pro=prod"));
        assert!(rendered.contains("yes"));
    }

    #[test]
    fn test_running_table_rows() {
        let builds = vec![RunningBuild {
            job_name: "team/deploy".to_string(),
            build_number: BuildNumber::from(17),
        }];

        let rendered = running_table(&builds).to_string();

        assert!(rendered.contains("team/deploy"));
        assert!(rendered.contains("#17"));
    }
}
