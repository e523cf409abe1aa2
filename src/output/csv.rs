use anyhow::Result;

use crate::feeding::FeedingOutcome;
use crate::feeding::history::FeedingRecord;
use crate::herd::Animal;

pub fn animals_to_csv(animals: &[Animal]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "tag_id",
        "name",
        "group",
        "sex",
        "weight_kg",
        "pregnant",
        "last_intake_kg",
        "status",
    ])?;
    for animal in animals {
        writer.write_record([
            animal.id.clone(),
            animal.tag_id.clone(),
            animal.name.clone(),
            animal.group.as_slug().to_string(),
            animal.sex.as_slug().to_string(),
            format!("{:.2}", animal.weight()),
            animal.is_pregnant().to_string(),
            format!("{:.3}", animal.last_intake_kg()),
            animal.status().as_slug().to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn outcomes_to_csv(outcomes: &[FeedingOutcome]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["animal_id", "estimated_intake_kg", "status"])?;
    for outcome in outcomes {
        writer.write_record([
            outcome.animal_id.clone(),
            format!("{:.3}", outcome.estimated_intake_kg),
            outcome.status.as_slug().to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn history_to_csv(records: &[FeedingRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "event_id",
        "recorded_at",
        "group",
        "feed_type",
        "total_kg",
        "method",
        "recorded_by",
        "overrides",
        "attention",
    ])?;
    for rec in records {
        let event = &rec.event;
        writer.write_record([
            event.id.clone(),
            event.recorded_at.to_rfc3339(),
            event.group.as_slug().to_string(),
            event.feed_type.clone(),
            format!("{:.2}", event.total_kg),
            event.method.clone(),
            event.recorded_by.clone(),
            event.overrides.len().to_string(),
            rec.outcomes
                .iter()
                .filter(|o| o.status.needs_attention())
                .count()
                .to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
