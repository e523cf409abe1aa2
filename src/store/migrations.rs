pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS animals (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    tag_id TEXT NOT NULL,
    name TEXT NOT NULL,
    dob TEXT NOT NULL,
    grp TEXT NOT NULL,
    sex TEXT NOT NULL,
    breed TEXT NOT NULL,
    weight_kg REAL NOT NULL,
    is_pregnant INTEGER NOT NULL DEFAULT 0,
    last_intake_kg REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending'
);
CREATE INDEX IF NOT EXISTS idx_animals_group ON animals(grp, position);

CREATE TABLE IF NOT EXISTS weight_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    animal_id TEXT NOT NULL REFERENCES animals(id) ON DELETE CASCADE,
    recorded_at TEXT NOT NULL,
    value_kg REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_weight_history_animal ON weight_history(animal_id, id);

CREATE TABLE IF NOT EXISTS feeding_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    recorded_at TEXT NOT NULL,
    grp TEXT NOT NULL,
    feed_type TEXT NOT NULL,
    total_kg REAL NOT NULL,
    method TEXT NOT NULL,
    recorded_by TEXT NOT NULL,
    overrides_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feeding_events_group ON feeding_events(grp, seq DESC);

CREATE TABLE IF NOT EXISTS feeding_outcomes (
    event_id TEXT NOT NULL REFERENCES feeding_events(id),
    position INTEGER NOT NULL,
    animal_id TEXT NOT NULL,
    estimated_intake_kg REAL NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (event_id, animal_id)
);
"#;
