use serde::{Deserialize, Serialize};

use crate::herd::{Animal, Group};

/// An animal's body-weight share of one delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub animal_id: String,
    pub weight_kg: f64,
    pub estimated_intake_kg: f64,
}

pub fn group_total_weight(group: Group, animals: &[Animal]) -> f64 {
    animals
        .iter()
        .filter(|a| a.group == group)
        .map(|a| a.weight())
        .sum()
}

/// Splits `total_kg` across the animals of `group` in proportion to body
/// weight. Animals outside the group get no allocation. Inputs are assumed
/// sanitized (finite, non-negative).
pub fn allocate(group: Group, total_kg: f64, animals: &[Animal]) -> Vec<Allocation> {
    let group_weight = group_total_weight(group, animals);
    animals
        .iter()
        .filter(|a| a.group == group)
        .map(|a| {
            let estimated_intake_kg = if group_weight > 0.0 {
                total_kg * (a.weight() / group_weight)
            } else {
                0.0
            };
            Allocation {
                animal_id: a.id.clone(),
                weight_kg: a.weight(),
                estimated_intake_kg,
            }
        })
        .collect()
}
