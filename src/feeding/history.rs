use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feeding::pipeline::FeedingReport;
use crate::feeding::{FeedingEvent, FeedingOutcome};
use crate::herd::{FeedStatus, Group};

/// A committed feeding with the outcomes it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedingRecord {
    pub event: FeedingEvent,
    pub outcomes: Vec<FeedingOutcome>,
}

pub fn record_from_report(report: &FeedingReport) -> FeedingRecord {
    FeedingRecord {
        event: report.event.clone(),
        outcomes: report.outcomes.clone(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistorySummary {
    pub events: usize,
    pub total_kg: f64,
    pub kg_by_group: BTreeMap<Group, f64>,
    pub outcomes: usize,
    pub ok_outcomes: usize,
}

impl HistorySummary {
    pub fn ok_ratio(&self) -> Option<f64> {
        if self.outcomes == 0 {
            return None;
        }
        Some(self.ok_outcomes as f64 / self.outcomes as f64)
    }
}

pub fn summarize_history(records: &[FeedingRecord], group: Option<Group>) -> HistorySummary {
    let mut summary = HistorySummary::default();
    for rec in records {
        if let Some(group) = group {
            if rec.event.group != group {
                continue;
            }
        }
        summary.events += 1;
        summary.total_kg += rec.event.total_kg;
        *summary.kg_by_group.entry(rec.event.group).or_insert(0.0) += rec.event.total_kg;
        summary.outcomes += rec.outcomes.len();
        summary.ok_outcomes += rec
            .outcomes
            .iter()
            .filter(|o| o.status == FeedStatus::Ok)
            .count();
    }
    summary
}

pub fn summarize_timeline(records: &[FeedingRecord], group: Option<Group>) -> String {
    if records.is_empty() {
        return "No feeding events recorded.".to_string();
    }
    let summary = summarize_history(records, group);
    if summary.events == 0 {
        return "No feeding events for selected group.".to_string();
    }
    match summary.ok_ratio() {
        Some(ratio) => format!(
            "{} events, {:.2} kg delivered, {}/{} outcomes OK ({:.1}%)",
            summary.events,
            summary.total_kg,
            summary.ok_outcomes,
            summary.outcomes,
            ratio * 100.0
        ),
        None => format!(
            "{} events, {:.2} kg delivered, no animal outcomes",
            summary.events, summary.total_kg
        ),
    }
}
