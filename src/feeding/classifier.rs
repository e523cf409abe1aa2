use serde::{Deserialize, Serialize};

use crate::feeding::{FeedingError, ManualOverride};
use crate::herd::FeedStatus;

pub const DEFAULT_OK_RATIO: f64 = 0.85;

/// Slack for rounding in `share * total / (weight * coefficient)`; every animal
/// of a group has the same true ratio.
const RATIO_TOLERANCE: f64 = 1e-9;

/// Share of the expected ration an animal must receive to count as fed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawClassifierPolicy")]
pub struct ClassifierPolicy {
    pub ok_ratio: f64,
}

#[derive(Deserialize)]
struct RawClassifierPolicy {
    ok_ratio: f64,
}

impl TryFrom<RawClassifierPolicy> for ClassifierPolicy {
    type Error = FeedingError;

    fn try_from(raw: RawClassifierPolicy) -> Result<Self, Self::Error> {
        Self::new(raw.ok_ratio)
    }
}

impl ClassifierPolicy {
    pub fn new(ok_ratio: f64) -> Result<Self, FeedingError> {
        if !ok_ratio.is_finite() || ok_ratio <= 0.0 {
            return Err(FeedingError::InvalidPolicy(ok_ratio));
        }
        Ok(Self { ok_ratio })
    }
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            ok_ratio: DEFAULT_OK_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub status: FeedStatus,
    pub recorded_intake_kg: f64,
    pub ratio: f64,
}

/// A zero expected ration signals no deficit.
pub fn intake_ratio(estimated_intake_kg: f64, expected_ration_kg: f64) -> f64 {
    if expected_ration_kg == 0.0 {
        1.0
    } else {
        estimated_intake_kg / expected_ration_kg
    }
}

pub fn classify_intake(
    estimated_intake_kg: f64,
    expected_ration_kg: f64,
    policy: &ClassifierPolicy,
) -> FeedStatus {
    if estimated_intake_kg == 0.0 {
        return FeedStatus::Missed;
    }
    let ratio = intake_ratio(estimated_intake_kg, expected_ration_kg);
    if ratio + RATIO_TOLERANCE >= policy.ok_ratio {
        FeedStatus::Ok
    } else {
        FeedStatus::Underfed
    }
}

/// Final status and recorded intake for one animal. A manual override always
/// wins over the computed status; `missed` also zeroes the recorded intake.
pub fn classify(
    estimated_intake_kg: f64,
    expected_ration_kg: f64,
    manual: Option<ManualOverride>,
    policy: &ClassifierPolicy,
) -> Classification {
    let ratio = intake_ratio(estimated_intake_kg, expected_ration_kg);
    let (status, recorded_intake_kg) = match manual {
        Some(ManualOverride::Missed) => (FeedStatus::Missed, 0.0),
        Some(other) => (other.status(), estimated_intake_kg),
        None => (
            classify_intake(estimated_intake_kg, expected_ration_kg, policy),
            estimated_intake_kg,
        ),
    };
    Classification {
        status,
        recorded_intake_kg,
        ratio,
    }
}
