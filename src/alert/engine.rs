use serde::{Deserialize, Serialize};

use crate::alert::rules::AlertEventKind;
use crate::config::AlertRulesConfig;
use crate::feeding::pipeline::FeedingReport;
use crate::herd::Group;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub title: String,
    pub body: String,
    pub group: Group,
    pub count: usize,
}

/// Builds the notifications for one feeding. Only a shortfall (any Underfed
/// or Missed outcome) produces an alert.
pub fn evaluate_alerts(report: &FeedingReport, recipient: &str) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    if let Some(notice) = report.shortfall() {
        let recipient = if recipient.trim().is_empty() {
            "farm admin"
        } else {
            recipient.trim()
        };
        events.push(AlertEvent {
            kind: AlertEventKind::FeedingShortfall,
            title: format!("{} feeding issues in {} group", notice.count, notice.group),
            body: format!(
                "Notify {recipient}: {} of {} animals underfed or missed after {:.2} kg of {} ({}).",
                notice.count,
                report.outcomes.len(),
                report.event.total_kg,
                report.event.feed_type,
                report.event.id
            ),
            group: notice.group,
            count: notice.count,
        });
    }
    events
}

pub fn apply_alert_rules(alerts: Vec<AlertEvent>, rules: &AlertRulesConfig) -> Vec<AlertEvent> {
    alerts
        .into_iter()
        .filter(|event| match event.kind {
            AlertEventKind::FeedingShortfall => rules.feeding_shortfall,
        })
        .collect()
}
