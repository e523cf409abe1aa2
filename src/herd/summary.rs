use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::herd::{Animal, FeedStatus, Group};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupStats {
    pub population: usize,
    pub total_weight_kg: f64,
}

/// Dashboard-level view of the herd.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HerdSummary {
    pub population: usize,
    pub ok: usize,
    pub underfed: usize,
    pub missed: usize,
    pub pending: usize,
    pub average_weight_kg: f64,
    pub groups: BTreeMap<Group, GroupStats>,
}

impl HerdSummary {
    pub fn needing_attention(&self) -> usize {
        self.underfed + self.missed
    }

    pub fn underfed_rate_pct(&self) -> f64 {
        if self.population == 0 {
            return 0.0;
        }
        (self.underfed as f64 / self.population as f64) * 100.0
    }

    pub fn active_groups(&self) -> Vec<Group> {
        self.groups.keys().copied().collect()
    }
}

pub fn summarize_herd(animals: &[Animal]) -> HerdSummary {
    let mut summary = HerdSummary {
        population: animals.len(),
        ..HerdSummary::default()
    };
    let mut total_weight = 0.0;
    for animal in animals {
        match animal.status() {
            FeedStatus::Ok => summary.ok += 1,
            FeedStatus::Underfed => summary.underfed += 1,
            FeedStatus::Missed => summary.missed += 1,
            FeedStatus::Pending => summary.pending += 1,
        }
        total_weight += animal.weight();
        let stats = summary.groups.entry(animal.group).or_default();
        stats.population += 1;
        stats.total_weight_kg += animal.weight();
    }
    if !animals.is_empty() {
        summary.average_weight_kg = total_weight / animals.len() as f64;
    }
    summary
}
