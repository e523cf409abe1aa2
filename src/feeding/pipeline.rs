use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::feeding::allocation::allocate;
use crate::feeding::classifier::{classify, ClassifierPolicy};
use crate::feeding::{FeedingError, FeedingEvent, FeedingOutcome, FeedingSubmission, ShortfallNotice};
use crate::herd::ration::RationBook;
use crate::herd::{validate_weight, Animal};

/// Everything a feeding produces before it is committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedingReport {
    pub event: FeedingEvent,
    pub outcomes: Vec<FeedingOutcome>,
    /// Override keys that matched no animal in the fed group.
    pub ignored_overrides: Vec<String>,
}

impl FeedingReport {
    pub fn attention_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.needs_attention())
            .count()
    }

    pub fn shortfall(&self) -> Option<ShortfallNotice> {
        let count = self.attention_count();
        (count > 0).then_some(ShortfallNotice {
            group: self.event.group,
            count,
        })
    }

    pub fn total_recorded_kg(&self) -> f64 {
        self.outcomes.iter().map(|o| o.estimated_intake_kg).sum()
    }
}

/// Computes per-animal outcomes for one submission against a snapshot of the
/// herd. Pure: the caller commits the report.
pub fn plan_feeding(
    submission: &FeedingSubmission,
    herd: &[Animal],
    rations: &RationBook,
    policy: &ClassifierPolicy,
    recorded_at: DateTime<Utc>,
) -> Result<FeedingReport, FeedingError> {
    submission.validate()?;
    let group = submission.group;
    for animal in herd.iter().filter(|a| a.group == group) {
        validate_weight(animal.weight()).map_err(|_| FeedingError::InvalidWeight {
            animal_id: animal.id.clone(),
            value: animal.weight(),
        })?;
    }
    let profile = rations
        .get(group)
        .ok_or(FeedingError::Unclassifiable(group))?;

    let allocations = allocate(group, submission.total_kg, herd);
    let outcomes: Vec<FeedingOutcome> = allocations
        .iter()
        .map(|share| {
            let manual = submission.overrides.get(&share.animal_id).copied();
            let expected = profile.expected_ration(share.weight_kg);
            let result = classify(share.estimated_intake_kg, expected, manual, policy);
            FeedingOutcome {
                animal_id: share.animal_id.clone(),
                estimated_intake_kg: result.recorded_intake_kg,
                status: result.status,
            }
        })
        .collect();

    let ignored_overrides: Vec<String> = submission
        .overrides
        .keys()
        .filter(|id| !allocations.iter().any(|share| &share.animal_id == *id))
        .cloned()
        .collect();
    if !ignored_overrides.is_empty() {
        debug!(
            "ignoring overrides for animals outside {group}: {}",
            ignored_overrides.join(", ")
        );
    }

    Ok(FeedingReport {
        event: FeedingEvent::from_submission(submission, recorded_at),
        outcomes,
        ignored_overrides,
    })
}

/// Writes outcomes into an in-memory registry; animals without an outcome keep
/// their previous intake and status.
pub fn apply_outcomes(herd: &mut [Animal], outcomes: &[FeedingOutcome]) -> usize {
    let mut updated = 0;
    for animal in herd.iter_mut() {
        if let Some(outcome) = outcomes.iter().find(|o| o.animal_id == animal.id) {
            animal.apply_outcome(outcome);
            updated += 1;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::{apply_outcomes, plan_feeding};
    use crate::feeding::classifier::ClassifierPolicy;
    use crate::feeding::{FeedingError, FeedingSubmission, ManualOverride, ShortfallNotice};
    use crate::herd::ration::{GroupRationProfile, RationBook};
    use crate::herd::{Animal, FeedStatus, Group, Sex};

    fn herd() -> Vec<Animal> {
        let now = Utc::now();
        vec![
            Animal::new("A", "T-A", "A", Group::Grower, Sex::Male, 40.0, now).unwrap(),
            Animal::new("S", "T-S", "S", Group::Adult, Sex::Female, 180.0, now).unwrap(),
            Animal::new("B", "T-B", "B", Group::Grower, Sex::Female, 60.0, now).unwrap(),
        ]
    }

    fn rations() -> RationBook {
        let mut book = RationBook::default();
        book.insert(GroupRationProfile::new(Group::Grower, 0.04).unwrap());
        book.insert(GroupRationProfile::new(Group::Adult, 0.025).unwrap());
        book
    }

    fn submission(total_kg: f64, overrides: &[(&str, ManualOverride)]) -> FeedingSubmission {
        FeedingSubmission {
            group: Group::Grower,
            feed_type: "grower-pellet".to_string(),
            total_kg,
            method: "trough".to_string(),
            recorded_by: "worker".to_string(),
            overrides: overrides
                .iter()
                .map(|(id, o)| (id.to_string(), *o))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn plan(sub: &FeedingSubmission) -> super::FeedingReport {
        plan_feeding(sub, &herd(), &rations(), &ClassifierPolicy::default(), Utc::now()).unwrap()
    }

    #[test]
    fn full_delivery_is_ok_for_everyone() {
        let report = plan(&submission(3.6, &[]));
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].animal_id, "A");
        assert!((report.outcomes[0].estimated_intake_kg - 1.44).abs() < 1e-9);
        assert_eq!(report.outcomes[1].animal_id, "B");
        assert!((report.outcomes[1].estimated_intake_kg - 2.16).abs() < 1e-9);
        assert!(report.outcomes.iter().all(|o| o.status == FeedStatus::Ok));
        assert_eq!(report.shortfall(), None);
        assert!((report.total_recorded_kg() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn short_delivery_raises_shortfall() {
        let report = plan(&submission(1.0, &[]));
        assert!(report.outcomes.iter().all(|o| o.status == FeedStatus::Underfed));
        assert!((report.outcomes[0].estimated_intake_kg - 0.4).abs() < 1e-9);
        assert!((report.outcomes[1].estimated_intake_kg - 0.6).abs() < 1e-9);
        assert_eq!(
            report.shortfall(),
            Some(ShortfallNotice {
                group: Group::Grower,
                count: 2
            })
        );
    }

    #[test]
    fn missed_override_zeroes_intake() {
        let report = plan(&submission(3.6, &[("A", ManualOverride::Missed)]));
        assert_eq!(report.outcomes[0].status, FeedStatus::Missed);
        assert_eq!(report.outcomes[0].estimated_intake_kg, 0.0);
        assert_eq!(report.outcomes[1].status, FeedStatus::Ok);
        assert_eq!(report.shortfall().map(|s| s.count), Some(1));
    }

    #[test]
    fn overrides_outside_group_are_ignored() {
        let report = plan(&submission(
            3.6,
            &[("S", ManualOverride::Missed), ("ghost", ManualOverride::Ate)],
        ));
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.animal_id != "S"));
        assert_eq!(report.ignored_overrides, vec!["S".to_string(), "ghost".to_string()]);
        assert_eq!(report.event.overrides.len(), 2);
    }

    #[test]
    fn zero_delivery_marks_group_missed() {
        let report = plan(&submission(0.0, &[]));
        assert!(report.outcomes.iter().all(|o| o.status == FeedStatus::Missed));
        assert_eq!(report.attention_count(), 2);
    }

    #[test]
    fn missing_profile_is_unclassifiable() {
        let mut book = RationBook::default();
        book.insert(GroupRationProfile::new(Group::Adult, 0.025).unwrap());
        let err = plan_feeding(
            &submission(3.6, &[]),
            &herd(),
            &book,
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, FeedingError::Unclassifiable(Group::Grower));
    }

    #[test]
    fn invalid_total_is_rejected_before_allocation() {
        let err = plan_feeding(
            &submission(-2.0, &[]),
            &herd(),
            &rations(),
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, FeedingError::InvalidTotal(-2.0));
    }

    #[test]
    fn empty_group_produces_no_outcomes() {
        let mut sub = submission(5.0, &[]);
        sub.group = Group::Piglet;
        let mut book = rations();
        book.insert(GroupRationProfile::new(Group::Piglet, 0.05).unwrap());
        let report =
            plan_feeding(&sub, &herd(), &book, &ClassifierPolicy::default(), Utc::now()).unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.shortfall(), None);
    }

    #[test]
    fn exact_threshold_delivery_is_ok_for_uneven_weights() {
        let now = Utc::now();
        let growers = vec![
            Animal::new("A", "T-A", "A", Group::Grower, Sex::Male, 30.0, now).unwrap(),
            Animal::new("B", "T-B", "B", Group::Grower, Sex::Female, 70.0, now).unwrap(),
        ];
        // 0.85 * (100 kg * 0.04)
        let report = plan_feeding(
            &submission(3.4, &[]),
            &growers,
            &rations(),
            &ClassifierPolicy::default(),
            now,
        )
        .unwrap();
        assert!(report.outcomes.iter().all(|o| o.status == FeedStatus::Ok));
        assert_eq!(report.shortfall(), None);
    }

    #[test]
    fn all_zero_weight_group_is_missed() {
        let now = Utc::now();
        let growers = vec![
            Animal::new("A", "T-A", "A", Group::Grower, Sex::Male, 0.0, now).unwrap(),
            Animal::new("B", "T-B", "B", Group::Grower, Sex::Female, 0.0, now).unwrap(),
        ];
        let report = plan_feeding(
            &submission(5.0, &[]),
            &growers,
            &rations(),
            &ClassifierPolicy::default(),
            now,
        )
        .unwrap();
        assert_eq!(report.outcomes.len(), 2);
        for outcome in &report.outcomes {
            assert_eq!(outcome.status, FeedStatus::Missed);
            assert_eq!(outcome.estimated_intake_kg, 0.0);
        }
        assert_eq!(report.shortfall().map(|s| s.count), Some(2));
    }

    #[test]
    fn zero_weight_animal_in_fed_group_is_missed() {
        let mut animals = herd();
        animals.push(Animal::new("Z", "T-Z", "Z", Group::Grower, Sex::Male, 0.0, Utc::now()).unwrap());
        let report = plan_feeding(
            &submission(3.6, &[]),
            &animals,
            &rations(),
            &ClassifierPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(report.outcomes.len(), 3);
        let zero = &report.outcomes[2];
        assert_eq!(zero.animal_id, "Z");
        assert_eq!(zero.status, FeedStatus::Missed);
        assert_eq!(zero.estimated_intake_kg, 0.0);
        assert!(report.outcomes[..2].iter().all(|o| o.status == FeedStatus::Ok));
        assert_eq!(report.shortfall().map(|s| s.count), Some(1));
    }

    #[test]
    fn applying_outcomes_leaves_other_groups_alone() {
        let mut animals = herd();
        let report = plan(&submission(1.0, &[]));
        let updated = apply_outcomes(&mut animals, &report.outcomes);
        assert_eq!(updated, 2);
        assert_eq!(animals[0].status(), FeedStatus::Underfed);
        assert!((animals[0].last_intake_kg() - 0.4).abs() < 1e-9);
        assert_eq!(animals[1].status(), FeedStatus::Pending);
        assert_eq!(animals[1].last_intake_kg(), 0.0);

        let again = plan(&submission(3.6, &[]));
        apply_outcomes(&mut animals, &again.outcomes);
        assert_eq!(animals[2].status(), FeedStatus::Ok);
    }
}
