pub mod allocation;
pub mod classifier;
pub mod history;
pub mod pipeline;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::herd::{FeedStatus, Group};

#[derive(Debug, Error, PartialEq)]
pub enum FeedingError {
    #[error("total delivered mass must be a finite, non-negative number of kg, got {0}")]
    InvalidTotal(f64),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("animal {animal_id} has an invalid weight {value}")]
    InvalidWeight { animal_id: String, value: f64 },
    #[error("no ration profile for group {0}; outcomes cannot be classified")]
    Unclassifiable(Group),
    #[error("classifier ok ratio must be a positive finite number, got {0}")]
    InvalidPolicy(f64),
}

/// Observed behaviour recorded at the trough, replacing the computed status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ManualOverride {
    Ate,
    Missed,
    Partial,
}

impl ManualOverride {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Ate => "ate",
            Self::Missed => "missed",
            Self::Partial => "partial",
        }
    }

    pub fn status(self) -> FeedStatus {
        match self {
            Self::Ate => FeedStatus::Ok,
            Self::Missed => FeedStatus::Missed,
            Self::Partial => FeedStatus::Underfed,
        }
    }
}

impl Display for ManualOverride {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown override: {0} (expected ate, missed or partial)")]
pub struct OverrideParseError(pub String);

impl FromStr for ManualOverride {
    type Err = OverrideParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ate" => Ok(Self::Ate),
            "missed" => Ok(Self::Missed),
            "partial" => Ok(Self::Partial),
            _ => Err(OverrideParseError(s.to_string())),
        }
    }
}

/// One feeding event as submitted by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingSubmission {
    pub group: Group,
    pub feed_type: String,
    pub total_kg: f64,
    pub method: String,
    pub recorded_by: String,
    #[serde(default)]
    pub overrides: BTreeMap<String, ManualOverride>,
}

impl FeedingSubmission {
    pub fn validate(&self) -> Result<(), FeedingError> {
        if !self.total_kg.is_finite() || self.total_kg < 0.0 {
            return Err(FeedingError::InvalidTotal(self.total_kg));
        }
        if self.feed_type.trim().is_empty() {
            return Err(FeedingError::MissingField("feed type"));
        }
        if self.recorded_by.trim().is_empty() {
            return Err(FeedingError::MissingField("recorded by"));
        }
        Ok(())
    }
}

/// Immutable history record of a committed feeding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedingEvent {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub group: Group,
    pub feed_type: String,
    pub total_kg: f64,
    pub method: String,
    pub recorded_by: String,
    pub overrides: BTreeMap<String, ManualOverride>,
}

impl FeedingEvent {
    pub fn from_submission(submission: &FeedingSubmission, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("fe-{}", recorded_at.format("%Y%m%d%H%M%S%9f")),
            recorded_at,
            group: submission.group,
            feed_type: submission.feed_type.trim().to_string(),
            total_kg: submission.total_kg,
            method: submission.method.trim().to_string(),
            recorded_by: submission.recorded_by.trim().to_string(),
            overrides: submission.overrides.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedingOutcome {
    pub animal_id: String,
    pub estimated_intake_kg: f64,
    pub status: FeedStatus,
}

/// Signalled when a feeding leaves at least one animal underfed or missed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ShortfallNotice {
    pub group: Group,
    pub count: usize,
}
