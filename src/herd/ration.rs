use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::herd::Group;

#[derive(Debug, Error, PartialEq)]
pub enum RationError {
    #[error("ration coefficient for {group} must be a positive number, got {value}")]
    InvalidCoefficient { group: Group, value: f64 },
}

/// Expected daily feed for a group, in kg of feed per kg of body weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawRationProfile")]
pub struct GroupRationProfile {
    pub group: Group,
    pub name: String,
    pub base_ration_per_kg: f64,
}

#[derive(Deserialize)]
struct RawRationProfile {
    group: Group,
    #[serde(default)]
    name: Option<String>,
    base_ration_per_kg: f64,
}

impl TryFrom<RawRationProfile> for GroupRationProfile {
    type Error = RationError;

    fn try_from(raw: RawRationProfile) -> Result<Self, Self::Error> {
        let mut profile = Self::new(raw.group, raw.base_ration_per_kg)?;
        if let Some(name) = raw.name.filter(|n| !n.trim().is_empty()) {
            profile.name = name;
        }
        Ok(profile)
    }
}

impl GroupRationProfile {
    pub fn new(group: Group, base_ration_per_kg: f64) -> Result<Self, RationError> {
        if !base_ration_per_kg.is_finite() || base_ration_per_kg <= 0.0 {
            return Err(RationError::InvalidCoefficient {
                group,
                value: base_ration_per_kg,
            });
        }
        Ok(Self {
            group,
            name: group.to_string(),
            base_ration_per_kg,
        })
    }

    pub fn expected_ration(&self, weight_kg: f64) -> f64 {
        weight_kg * self.base_ration_per_kg
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RationBook {
    profiles: BTreeMap<Group, GroupRationProfile>,
}

impl RationBook {
    pub fn with_defaults() -> Self {
        let mut book = Self::default();
        for group in Group::ALL {
            // Default coefficients are all positive.
            if let Ok(profile) = GroupRationProfile::new(group, default_coefficient(group)) {
                book.insert(profile);
            }
        }
        book
    }

    pub fn insert(&mut self, profile: GroupRationProfile) {
        self.profiles.insert(profile.group, profile);
    }

    pub fn get(&self, group: Group) -> Option<&GroupRationProfile> {
        self.profiles.get(&group)
    }

    pub fn coefficient(&self, group: Group) -> Option<f64> {
        self.get(group).map(|p| p.base_ration_per_kg)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &GroupRationProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

pub fn default_coefficient(group: Group) -> f64 {
    match group {
        Group::Piglet => 0.05,
        Group::Pregnant => 0.03,
        Group::Grower => 0.04,
        Group::Adult => 0.025,
        Group::Quarantine => 0.02,
    }
}

#[cfg(test)]
mod tests {
    use super::{GroupRationProfile, RationBook, RationError};
    use crate::herd::Group;

    #[test]
    fn rejects_non_positive_coefficients() {
        assert_eq!(
            GroupRationProfile::new(Group::Grower, 0.0),
            Err(RationError::InvalidCoefficient {
                group: Group::Grower,
                value: 0.0
            })
        );
        assert!(GroupRationProfile::new(Group::Grower, -0.1).is_err());
        assert!(GroupRationProfile::new(Group::Grower, f64::NAN).is_err());
    }

    #[test]
    fn defaults_cover_every_group() {
        let book = RationBook::with_defaults();
        assert_eq!(book.len(), Group::ALL.len());
        assert_eq!(book.coefficient(Group::Grower), Some(0.04));
        assert!(book.profiles().all(|p| p.base_ration_per_kg > 0.0));
    }

    #[test]
    fn expected_ration_scales_with_weight() {
        let profile = GroupRationProfile::new(Group::Grower, 0.04).unwrap();
        assert!((profile.expected_ration(40.0) - 1.6).abs() < 1e-12);
        assert_eq!(profile.name, "Grower");
    }

    #[test]
    fn deserialized_profiles_are_validated() {
        let profile: GroupRationProfile =
            serde_json::from_str(r#"{"group":"grower","base_ration_per_kg":0.04}"#).unwrap();
        assert_eq!(profile, GroupRationProfile::new(Group::Grower, 0.04).unwrap());
        let bad = serde_json::from_str::<GroupRationProfile>(
            r#"{"group":"grower","name":"Grower","base_ration_per_kg":0.0}"#,
        );
        assert!(bad.is_err());
    }
}
