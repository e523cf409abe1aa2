pub mod ration;
pub mod schema;
pub mod seed;
pub mod summary;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feeding::FeedingOutcome;

pub use schema::{FeedStatus, Group, Sex};

#[derive(Debug, Error, PartialEq)]
pub enum HerdError {
    #[error("invalid weight {value}: must be a finite, non-negative number of kg")]
    InvalidWeight { value: f64 },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("animal not found: {0}")]
    AnimalNotFound(String),
}

pub fn validate_weight(value: f64) -> Result<f64, HerdError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(HerdError::InvalidWeight { value })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightSample {
    pub recorded_at: DateTime<Utc>,
    pub value: f64,
}

/// A registered animal. Weight and feeding state are only reachable through
/// methods so that the weight history and classifier-produced fields stay
/// consistent. Not deserializable for the same reason; the store rebuilds
/// animals from rows.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Animal {
    pub id: String,
    pub tag_id: String,
    pub name: String,
    pub dob: NaiveDate,
    pub group: Group,
    pub sex: Sex,
    pub breed: String,
    pub(crate) weight: f64,
    pub(crate) weight_history: Vec<WeightSample>,
    pub(crate) is_pregnant: bool,
    pub(crate) last_intake_kg: f64,
    pub(crate) status: FeedStatus,
}

impl Animal {
    pub fn new(
        id: impl Into<String>,
        tag_id: impl Into<String>,
        name: impl Into<String>,
        group: Group,
        sex: Sex,
        weight: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, HerdError> {
        let tag_id = required(tag_id.into(), "tag id")?;
        let name = required(name.into(), "name")?;
        let weight = validate_weight(weight)?;
        Ok(Self {
            id: id.into(),
            tag_id,
            name,
            dob: recorded_at.date_naive(),
            group,
            sex,
            breed: "Unknown".to_string(),
            weight,
            weight_history: vec![WeightSample {
                recorded_at,
                value: weight,
            }],
            is_pregnant: false,
            last_intake_kg: 0.0,
            status: FeedStatus::Pending,
        })
    }

    pub fn with_breed(mut self, breed: &str) -> Self {
        self.breed = breed.to_string();
        self
    }

    pub fn with_dob(mut self, dob: NaiveDate) -> Self {
        self.dob = dob;
        self
    }

    pub fn with_pregnant(mut self, pregnant: bool) -> Self {
        self.set_pregnant(pregnant);
        self
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn weight_history(&self) -> &[WeightSample] {
        &self.weight_history
    }

    pub fn is_pregnant(&self) -> bool {
        self.is_pregnant
    }

    pub fn last_intake_kg(&self) -> f64 {
        self.last_intake_kg
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    /// Records a new weigh-in. Unchanged weights do not grow the history.
    pub fn record_weight(&mut self, value: f64, at: DateTime<Utc>) -> Result<(), HerdError> {
        let value = validate_weight(value)?;
        if value != self.weight {
            self.weight_history.push(WeightSample {
                recorded_at: at,
                value,
            });
            self.weight = value;
        }
        Ok(())
    }

    /// Pregnancy only applies to females.
    pub fn set_pregnant(&mut self, pregnant: bool) {
        self.is_pregnant = pregnant && self.sex == Sex::Female;
    }

    pub fn apply_outcome(&mut self, outcome: &FeedingOutcome) {
        self.last_intake_kg = outcome.estimated_intake_kg;
        self.status = outcome.status;
    }

    /// Applies an edit atomically: on error the animal is left unchanged.
    pub fn apply_update(&mut self, update: &AnimalUpdate, at: DateTime<Utc>) -> Result<(), HerdError> {
        let mut next = self.clone();
        if let Some(tag_id) = &update.tag_id {
            next.tag_id = required(tag_id.clone(), "tag id")?;
        }
        if let Some(name) = &update.name {
            next.name = required(name.clone(), "name")?;
        }
        if let Some(group) = update.group {
            next.group = group;
        }
        if let Some(sex) = update.sex {
            next.sex = sex;
        }
        if let Some(breed) = &update.breed {
            next.breed = breed.clone();
        }
        if let Some(dob) = update.dob {
            next.dob = dob;
        }
        if let Some(weight) = update.weight {
            next.record_weight(weight, at)?;
        }
        let pregnant = update.is_pregnant.unwrap_or(next.is_pregnant);
        next.set_pregnant(pregnant);
        *self = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimalUpdate {
    pub tag_id: Option<String>,
    pub name: Option<String>,
    pub group: Option<Group>,
    pub sex: Option<Sex>,
    pub breed: Option<String>,
    pub dob: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub is_pregnant: Option<bool>,
}

/// Registration form for a new animal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnimal {
    pub tag_id: String,
    pub name: String,
    pub group: Group,
    pub sex: Sex,
    pub weight: f64,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub is_pregnant: bool,
}

impl NewAnimal {
    pub fn into_animal(self, id: String, at: DateTime<Utc>) -> Result<Animal, HerdError> {
        let mut animal = Animal::new(id, self.tag_id, self.name, self.group, self.sex, self.weight, at)?
            .with_pregnant(self.is_pregnant);
        if let Some(breed) = self.breed.filter(|b| !b.trim().is_empty()) {
            animal = animal.with_breed(breed.trim());
        }
        if let Some(dob) = self.dob {
            animal = animal.with_dob(dob);
        }
        Ok(animal)
    }
}

pub fn new_animal_id(at: DateTime<Utc>) -> String {
    format!("p-{}", at.timestamp_millis())
}

/// Animals currently flagged as Underfed or Missed.
pub fn needing_attention(animals: &[Animal]) -> Vec<&Animal> {
    animals
        .iter()
        .filter(|animal| animal.status.needs_attention())
        .collect()
}

fn required(value: String, field: &'static str) -> Result<String, HerdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HerdError::MissingField(field));
    }
    Ok(trimmed.to_string())
}
