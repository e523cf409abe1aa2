use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::feeding::history::FeedingRecord;
use crate::feeding::pipeline::FeedingReport;
use crate::herd::ration::RationBook;
use crate::herd::summary::HerdSummary;
use crate::herd::{Animal, FeedStatus, Group};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn status_cell(status: FeedStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        FeedStatus::Ok => cell.fg(Color::Green),
        FeedStatus::Underfed => cell.fg(Color::Red),
        FeedStatus::Missed => cell.fg(Color::Magenta),
        FeedStatus::Pending => cell.fg(Color::DarkGrey),
    }
}

pub fn render_animal_table(animals: &[Animal]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Tag", "Name", "Group", "Sex", "Weight (kg)", "Last Intake (kg)", "Status",
    ]);
    for animal in animals {
        let sex = if animal.is_pregnant() {
            format!("{} (pregnant)", animal.sex)
        } else {
            animal.sex.to_string()
        };
        table.add_row(Row::from(vec![
            Cell::new(&animal.tag_id),
            Cell::new(&animal.name),
            Cell::new(animal.group.to_string()),
            Cell::new(sex),
            Cell::new(format!("{:.1}", animal.weight())),
            Cell::new(format!("{:.2}", animal.last_intake_kg())),
            status_cell(animal.status()),
        ]));
    }
    table.to_string()
}

/// Outcomes of one feeding; `herd` is only used to resolve tags and names.
pub fn render_outcome_table(report: &FeedingReport, herd: &[Animal]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Tag", "Name", "Estimated Intake (kg)", "Status", "Override"]);
    for outcome in &report.outcomes {
        let animal = herd.iter().find(|a| a.id == outcome.animal_id);
        let manual = report
            .event
            .overrides
            .get(&outcome.animal_id)
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(Row::from(vec![
            Cell::new(animal.map(|a| a.tag_id.as_str()).unwrap_or(&outcome.animal_id)),
            Cell::new(animal.map(|a| a.name.as_str()).unwrap_or("-")),
            Cell::new(format!("{:.3}", outcome.estimated_intake_kg)),
            status_cell(outcome.status),
            Cell::new(manual),
        ]));
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "\nEvent {} | {} | {:.2} kg {} via {} | recorded by {}",
        report.event.id,
        report.event.group,
        report.event.total_kg,
        report.event.feed_type,
        report.event.method,
        report.event.recorded_by
    ));
    if !report.ignored_overrides.is_empty() {
        out.push_str(&format!(
            "\nIgnored overrides (not in group): {}",
            report.ignored_overrides.join(", ")
        ));
    }
    out
}

pub fn render_history_table(records: &[FeedingRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Recorded At",
        "Group",
        "Feed",
        "Total (kg)",
        "Method",
        "Recorded By",
        "Overrides",
        "Issues",
    ]);
    for rec in records {
        let issues = rec
            .outcomes
            .iter()
            .filter(|o| o.status.needs_attention())
            .count();
        let issues_cell = if issues > 0 {
            Cell::new(issues).fg(Color::Red)
        } else {
            Cell::new(issues)
        };
        table.add_row(Row::from(vec![
            Cell::new(rec.event.recorded_at.to_rfc3339()),
            Cell::new(rec.event.group.to_string()),
            Cell::new(&rec.event.feed_type),
            Cell::new(format!("{:.2}", rec.event.total_kg)),
            Cell::new(&rec.event.method),
            Cell::new(&rec.event.recorded_by),
            Cell::new(rec.event.overrides.len()),
            issues_cell,
        ]));
    }
    table.to_string()
}

pub fn render_summary_table(summary: &HerdSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Group", "Population", "Total Weight (kg)"]);
    for group in Group::ALL {
        let Some(stats) = summary.groups.get(&group) else {
            continue;
        };
        table.add_row(vec![
            group.to_string(),
            stats.population.to_string(),
            format!("{:.1}", stats.total_weight_kg),
        ]);
    }

    let mut out = format!(
        "Population: {} | Avg weight: {:.1} kg | OK: {} | Underfed: {} ({:.1}%) | Missed: {} | Pending: {}\n",
        summary.population,
        summary.average_weight_kg,
        summary.ok,
        summary.underfed,
        summary.underfed_rate_pct(),
        summary.missed,
        summary.pending
    );
    out.push_str(&table.to_string());
    out
}

pub fn render_rations_table(book: &RationBook) -> String {
    let mut table = new_table();
    table.set_header(vec!["Group", "Ration (kg feed / kg body weight)"]);
    for group in Group::ALL {
        let ration = book
            .coefficient(group)
            .map(|c| format!("{c:.3}"))
            .unwrap_or_else(|| "unclassifiable".to_string());
        table.add_row(vec![group.to_string(), ration]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{render_animal_table, render_rations_table};
    use crate::herd::ration::{GroupRationProfile, RationBook};
    use crate::herd::{Animal, Group, Sex};

    #[test]
    fn animal_table_lists_tags() {
        let animal = Animal::new("p-1", "LS-900", "Daisy", Group::Adult, Sex::Female, 170.0, Utc::now())
            .unwrap()
            .with_pregnant(true);
        let rendered = render_animal_table(&[animal]);
        assert!(rendered.contains("LS-900"));
        assert!(rendered.contains("Female (pregnant)"));
        assert!(rendered.contains("Pending"));
    }

    #[test]
    fn rations_table_marks_missing_groups() {
        let mut book = RationBook::default();
        book.insert(GroupRationProfile::new(Group::Grower, 0.04).unwrap());
        let rendered = render_rations_table(&book);
        assert!(rendered.contains("0.040"));
        assert!(rendered.contains("unclassifiable"));
    }
}
