use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use crate::feeding::FeedingOutcome;
    use crate::herd::FeedStatus;

    #[test]
    fn statuses_render_as_snake_case() {
        let rendered = render_json(&[FeedingOutcome {
            animal_id: "p-1".to_string(),
            estimated_intake_kg: 0.0,
            status: FeedStatus::Missed,
        }])
        .unwrap();
        assert!(rendered.contains(r#""status": "missed""#));
        assert!(rendered.contains(r#""animal_id": "p-1""#));
    }
}
