use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use crate::feeding::history::{record_from_report, FeedingRecord};
use crate::feeding::pipeline::FeedingReport;
use crate::feeding::{FeedingEvent, FeedingOutcome};
use crate::herd::seed::seed_herd;
use crate::herd::{Animal, Group, WeightSample};
use crate::store::migrations::BASE_MIGRATION;

const ANIMAL_COLUMNS: &str = "id, tag_id, name, dob, grp, sex, breed, weight_kg, is_pregnant, last_intake_kg, status";
const EVENT_COLUMNS: &str =
    "id, recorded_at, grp, feed_type, total_kg, method, recorded_by, overrides_json";

/// SQLite-backed animal registry and append-only feeding history.
pub struct HerdStore {
    conn: Connection,
}

impl HerdStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn animal_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM animals", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Seeds the default herd into an empty registry. Returns whether seeding
    /// happened.
    pub fn seed_if_empty(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.animal_count()? > 0 {
            return Ok(false);
        }
        let tx = self.conn.transaction()?;
        insert_seed_tx(&tx, now)?;
        tx.commit()?;
        Ok(true)
    }

    /// Wipes animals and history and reseeds. Either all of it happens or none.
    pub fn reset_to_seed(&mut self, now: DateTime<Utc>) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
DELETE FROM feeding_outcomes;
DELETE FROM feeding_events;
DELETE FROM weight_history;
DELETE FROM animals;
"#,
        )?;
        insert_seed_tx(&tx, now)?;
        tx.commit()?;
        info!("registry reset to seed herd");
        Ok(())
    }

    pub fn insert_animal(&mut self, animal: &Animal) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_animal_tx(&tx, animal)?;
        tx.commit()?;
        debug!("inserted animal {} ({})", animal.id, animal.tag_id);
        Ok(())
    }

    pub fn update_animal(&mut self, animal: &Animal) -> Result<()> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            r#"
UPDATE animals
SET tag_id = ?2, name = ?3, dob = ?4, grp = ?5, sex = ?6, breed = ?7,
    weight_kg = ?8, is_pregnant = ?9, last_intake_kg = ?10, status = ?11
WHERE id = ?1
"#,
            params![
                animal.id,
                animal.tag_id,
                animal.name,
                animal.dob.to_string(),
                animal.group.as_slug(),
                animal.sex.as_slug(),
                animal.breed,
                animal.weight(),
                animal.is_pregnant(),
                animal.last_intake_kg(),
                animal.status().as_slug(),
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("animal not found: {}", animal.id));
        }
        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM weight_history WHERE animal_id = ?1",
            params![animal.id],
            |row| row.get(0),
        )?;
        // History is append-only; only samples recorded since the last save go in.
        let new_samples = animal.weight_history().iter().skip(stored as usize);
        insert_weight_samples_tx(&tx, &animal.id, new_samples)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_animal(&self, id: &str) -> Result<Option<Animal>> {
        let sql = format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let result = stmt.query_row(params![id], row_to_animal);
        match result {
            Ok(mut animal) => {
                animal.weight_history = self.load_weight_history(&animal.id)?;
                Ok(Some(animal))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All animals, newest registration first.
    pub fn list_animals(&self) -> Result<Vec<Animal>> {
        let sql = format!("SELECT {ANIMAL_COLUMNS} FROM animals ORDER BY position DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut animals = stmt
            .query_map([], row_to_animal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for animal in &mut animals {
            animal.weight_history = self.load_weight_history(&animal.id)?;
        }
        Ok(animals)
    }

    fn load_weight_history(&self, animal_id: &str) -> Result<Vec<WeightSample>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT recorded_at, value_kg
FROM weight_history
WHERE animal_id = ?1
ORDER BY id ASC
"#,
        )?;
        let rows = stmt
            .query_map(params![animal_id], |row| {
                Ok(WeightSample {
                    recorded_at: parse_timestamp(row, 0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stores the outcomes on the animals and appends the event to history in
    /// one transaction. Returns the history record as it was written.
    pub fn commit_feeding(&mut self, report: &FeedingReport) -> Result<FeedingRecord> {
        let tx = self.conn.transaction()?;
        for outcome in &report.outcomes {
            tx.execute(
                "UPDATE animals SET last_intake_kg = ?2, status = ?3 WHERE id = ?1",
                params![
                    outcome.animal_id,
                    outcome.estimated_intake_kg,
                    outcome.status.as_slug()
                ],
            )?;
        }
        let event = &report.event;
        tx.execute(
            r#"
INSERT INTO feeding_events(id, recorded_at, grp, feed_type, total_kg, method, recorded_by, overrides_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#,
            params![
                event.id,
                event.recorded_at.to_rfc3339(),
                event.group.as_slug(),
                event.feed_type,
                event.total_kg,
                event.method,
                event.recorded_by,
                serde_json::to_string(&event.overrides)?
            ],
        )?;
        for (position, outcome) in report.outcomes.iter().enumerate() {
            tx.execute(
                r#"
INSERT INTO feeding_outcomes(event_id, position, animal_id, estimated_intake_kg, status)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
                params![
                    event.id,
                    position as i64,
                    outcome.animal_id,
                    outcome.estimated_intake_kg,
                    outcome.status.as_slug()
                ],
            )?;
        }
        tx.commit()?;
        info!(
            "committed feeding {} for {} ({} outcomes)",
            event.id,
            event.group,
            report.outcomes.len()
        );
        Ok(record_from_report(report))
    }

    /// Feeding history, newest first.
    pub fn load_events(&self, group: Option<Group>, limit: usize) -> Result<Vec<FeedingRecord>> {
        let sql = if group.is_some() {
            format!(
                "SELECT {EVENT_COLUMNS} FROM feeding_events WHERE grp = ?1 ORDER BY seq DESC LIMIT ?2"
            )
        } else {
            format!("SELECT {EVENT_COLUMNS} FROM feeding_events ORDER BY seq DESC LIMIT ?1")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let events = if let Some(group) = group {
            stmt.query_map(params![group.as_slug(), limit as i64], row_to_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![limit as i64], row_to_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut records = Vec::with_capacity(events.len());
        for event in events {
            let outcomes = self.load_outcomes(&event.id)?;
            records.push(FeedingRecord { event, outcomes });
        }
        Ok(records)
    }

    pub fn load_outcomes(&self, event_id: &str) -> Result<Vec<FeedingOutcome>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT animal_id, estimated_intake_kg, status
FROM feeding_outcomes
WHERE event_id = ?1
ORDER BY position ASC
"#,
        )?;
        let rows = stmt
            .query_map(params![event_id], |row| {
                Ok(FeedingOutcome {
                    animal_id: row.get(0)?,
                    estimated_intake_kg: row.get(1)?,
                    status: parse_column(row, 2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn insert_animal_tx(tx: &Transaction<'_>, animal: &Animal) -> Result<()> {
    tx.execute(
        r#"
INSERT INTO animals(
    id, position, tag_id, name, dob, grp, sex, breed, weight_kg, is_pregnant, last_intake_kg, status
) VALUES (
    ?1, (SELECT COALESCE(MAX(position), 0) + 1 FROM animals), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
)
"#,
        params![
            animal.id,
            animal.tag_id,
            animal.name,
            animal.dob.to_string(),
            animal.group.as_slug(),
            animal.sex.as_slug(),
            animal.breed,
            animal.weight(),
            animal.is_pregnant(),
            animal.last_intake_kg(),
            animal.status().as_slug(),
        ],
    )?;
    insert_weight_samples_tx(tx, &animal.id, animal.weight_history().iter())
}

fn insert_seed_tx(tx: &Transaction<'_>, now: DateTime<Utc>) -> Result<()> {
    let herd = seed_herd(now)?;
    // Listing is newest first, so insert in reverse to keep seed order.
    for animal in herd.iter().rev() {
        insert_animal_tx(tx, animal)?;
    }
    Ok(())
}

fn insert_weight_samples_tx<'a>(
    tx: &Transaction<'_>,
    animal_id: &str,
    samples: impl Iterator<Item = &'a WeightSample>,
) -> Result<()> {
    for sample in samples {
        tx.execute(
            "INSERT INTO weight_history(animal_id, recorded_at, value_kg) VALUES (?1, ?2, ?3)",
            params![animal_id, sample.recorded_at.to_rfc3339(), sample.value],
        )?;
    }
    Ok(())
}

fn row_to_animal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Animal> {
    let dob: NaiveDate = parse_column(row, 3)?;
    Ok(Animal {
        id: row.get(0)?,
        tag_id: row.get(1)?,
        name: row.get(2)?,
        dob,
        group: parse_column(row, 4)?,
        sex: parse_column(row, 5)?,
        breed: row.get(6)?,
        weight: row.get(7)?,
        weight_history: Vec::new(),
        is_pregnant: row.get(8)?,
        last_intake_kg: row.get(9)?,
        status: parse_column(row, 10)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedingEvent> {
    let overrides_raw: String = row.get(7)?;
    let overrides = serde_json::from_str(&overrides_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    Ok(FeedingEvent {
        id: row.get(0)?,
        recorded_at: parse_timestamp(row, 1)?,
        group: parse_column(row, 2)?,
        feed_type: row.get(3)?,
        total_kg: row.get(4)?,
        method: row.get(5)?,
        recorded_by: row.get(6)?,
        overrides,
    })
}

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};

    use super::HerdStore;
    use crate::feeding::classifier::ClassifierPolicy;
    use crate::feeding::pipeline::plan_feeding;
    use crate::feeding::{FeedingSubmission, ManualOverride};
    use crate::herd::ration::RationBook;
    use crate::herd::{Animal, AnimalUpdate, FeedStatus, Group, Sex};

    fn submission(group: Group, total_kg: f64) -> FeedingSubmission {
        FeedingSubmission {
            group,
            feed_type: "mix".to_string(),
            total_kg,
            method: "trough".to_string(),
            recorded_by: "worker".to_string(),
            overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn seeds_once_and_lists_in_seed_order() {
        let mut store = HerdStore::in_memory().unwrap();
        let now = Utc::now();
        assert!(store.seed_if_empty(now).unwrap());
        assert!(!store.seed_if_empty(now).unwrap());
        let animals = store.list_animals().unwrap();
        assert_eq!(animals.len(), 8);
        assert_eq!(animals[0].id, "seed-1");
        assert!(animals.iter().all(|a| a.weight_history().len() == 1));
    }

    #[test]
    fn animal_round_trips_with_weight_history() {
        let mut store = HerdStore::in_memory().unwrap();
        let now = Utc::now();
        let mut animal = Animal::new("p-1", "T-1", "Rosie", Group::Pregnant, Sex::Female, 150.0, now)
            .unwrap()
            .with_breed("Duroc")
            .with_pregnant(true);
        store.insert_animal(&animal).unwrap();

        let update = AnimalUpdate {
            weight: Some(155.5),
            ..AnimalUpdate::default()
        };
        animal.apply_update(&update, now + Duration::days(3)).unwrap();
        store.update_animal(&animal).unwrap();

        let loaded = store.get_animal("p-1").unwrap().expect("animal missing");
        assert_eq!(loaded.breed, "Duroc");
        assert!(loaded.is_pregnant());
        assert_eq!(loaded.weight(), 155.5);
        assert_eq!(loaded.weight_history().len(), 2);
        assert_eq!(loaded.weight_history().last().unwrap().value, loaded.weight());
        assert_eq!(loaded.status(), FeedStatus::Pending);
        assert!(store.get_animal("nope").unwrap().is_none());
    }

    #[test]
    fn edits_append_weight_history_without_rewriting() {
        let mut store = HerdStore::in_memory().unwrap();
        let now = Utc::now();
        let mut animal = Animal::new("p-1", "T-1", "Rosie", Group::Grower, Sex::Female, 30.0, now).unwrap();
        store.insert_animal(&animal).unwrap();
        let row_ids = |store: &HerdStore| -> Vec<i64> {
            let mut stmt = store
                .conn
                .prepare("SELECT id FROM weight_history WHERE animal_id = 'p-1' ORDER BY id")
                .unwrap();
            let ids = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            ids
        };
        let first = row_ids(&store);

        for (day, weight) in [(7, 34.0), (14, 34.0), (21, 38.5)] {
            let update = AnimalUpdate {
                weight: Some(weight),
                ..AnimalUpdate::default()
            };
            animal.apply_update(&update, now + Duration::days(day)).unwrap();
            store.update_animal(&animal).unwrap();
        }

        let ids = row_ids(&store);
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], first[0]);
        let loaded = store.get_animal("p-1").unwrap().unwrap();
        assert_eq!(loaded.weight_history(), animal.weight_history());
    }

    #[test]
    fn update_of_unknown_animal_fails() {
        let mut store = HerdStore::in_memory().unwrap();
        let ghost = Animal::new("ghost", "G", "G", Group::Adult, Sex::Male, 1.0, Utc::now()).unwrap();
        assert!(store.update_animal(&ghost).is_err());
    }

    #[test]
    fn commit_updates_group_and_appends_history() {
        let mut store = HerdStore::in_memory().unwrap();
        store.seed_if_empty(Utc::now()).unwrap();
        let herd = store.list_animals().unwrap();
        let mut sub = submission(Group::Grower, 1.0);
        sub.overrides.insert("seed-3".to_string(), ManualOverride::Missed);
        let report = plan_feeding(
            &sub,
            &herd,
            &RationBook::with_defaults(),
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        let written = store.commit_feeding(&report).unwrap();

        let napoleon = store.get_animal("seed-3").unwrap().unwrap();
        assert_eq!(napoleon.status(), FeedStatus::Missed);
        assert_eq!(napoleon.last_intake_kg(), 0.0);
        let snowball = store.get_animal("seed-4").unwrap().unwrap();
        assert_eq!(snowball.status(), FeedStatus::Underfed);
        assert!((snowball.last_intake_kg() - 0.6).abs() < 1e-9);
        let piglet = store.get_animal("seed-1").unwrap().unwrap();
        assert_eq!(piglet.status(), FeedStatus::Pending);

        let history = store.load_events(None, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event, report.event);
        assert_eq!(history[0].outcomes, report.outcomes);
        assert_eq!(history[0], written);
    }

    #[test]
    fn history_is_newest_first_and_filterable() {
        let mut store = HerdStore::in_memory().unwrap();
        store.seed_if_empty(Utc::now()).unwrap();
        let herd = store.list_animals().unwrap();
        let book = RationBook::with_defaults();
        let policy = ClassifierPolicy::default();
        let start = Utc::now();
        for (i, (group, kg)) in [(Group::Grower, 3.6), (Group::Adult, 10.0), (Group::Grower, 1.0)]
            .into_iter()
            .enumerate()
        {
            let at = start + Duration::seconds(i as i64);
            let report = plan_feeding(&submission(group, kg), &herd, &book, &policy, at).unwrap();
            store.commit_feeding(&report).unwrap();
        }

        let all = store.load_events(None, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event.total_kg, 1.0);
        let growers = store.load_events(Some(Group::Grower), 10).unwrap();
        assert_eq!(growers.len(), 2);
        assert!(growers.iter().all(|r| r.event.group == Group::Grower));
        assert_eq!(store.load_events(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn reset_wipes_history() {
        let mut store = HerdStore::in_memory().unwrap();
        store.seed_if_empty(Utc::now()).unwrap();
        let herd = store.list_animals().unwrap();
        let report = plan_feeding(
            &submission(Group::Adult, 5.0),
            &herd,
            &RationBook::with_defaults(),
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        store.commit_feeding(&report).unwrap();
        let extra = Animal::new("p-9", "T-9", "Extra", Group::Adult, Sex::Male, 90.0, Utc::now()).unwrap();
        store.insert_animal(&extra).unwrap();

        store.reset_to_seed(Utc::now()).unwrap();
        assert!(store.load_events(None, 10).unwrap().is_empty());
        let animals = store.list_animals().unwrap();
        assert_eq!(animals.len(), 8);
        assert!(animals.iter().all(|a| a.status() == FeedStatus::Pending));
    }

    #[test]
    fn failed_reset_keeps_existing_data() {
        let mut store = HerdStore::in_memory().unwrap();
        store.seed_if_empty(Utc::now()).unwrap();
        let herd = store.list_animals().unwrap();
        let report = plan_feeding(
            &submission(Group::Grower, 3.6),
            &herd,
            &RationBook::with_defaults(),
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        store.commit_feeding(&report).unwrap();
        store
            .conn
            .execute_batch(
                r#"
CREATE TRIGGER refuse_seed BEFORE INSERT ON animals WHEN NEW.id = 'seed-5'
BEGIN SELECT RAISE(ABORT, 'seed refused'); END;
"#,
            )
            .unwrap();

        assert!(store.reset_to_seed(Utc::now()).is_err());
        assert_eq!(store.animal_count().unwrap(), 8);
        assert_eq!(store.load_events(None, 10).unwrap().len(), 1);
        let napoleon = store.get_animal("seed-3").unwrap().unwrap();
        assert_eq!(napoleon.status(), FeedStatus::Ok);
    }
}
