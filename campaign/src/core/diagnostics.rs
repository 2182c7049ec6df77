//! Running diagnostics for one run.
//!
//! Accumulates monotonically turn by turn and freezes into [`RunDiagnostics`]
//! after the last turn.

use std::collections::BTreeMap;

use serde::Serialize;

use super::activity::{self, ActivityCounts, ActivitySummary};
use super::types::ControlEvent;
use super::weekly::WeeklyReportRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentCount {
    pub agent_id: String,
    pub reassignments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentWeek {
    pub week_index: u32,
    pub turn: u32,
    pub by_agent: Vec<AgentCount>,
    pub total_reassignments: usize,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    activity: Vec<ActivityCounts>,
    engagement: Vec<f64>,
    control_events: Vec<ControlEvent>,
    agent_weeks: Vec<AgentWeek>,
    first_row: Option<WeeklyReportRow>,
    last_row: Option<WeeklyReportRow>,
}

/// Frozen end-of-run diagnostics.
#[derive(Debug, Clone)]
pub struct RunDiagnostics {
    pub activity: ActivitySummary,
    /// Sorted by (turn, mechanism, settlement id).
    pub control_events: Vec<ControlEvent>,
    pub events_by_mechanism: BTreeMap<String, usize>,
    pub agent_weeks: Vec<AgentWeek>,
    pub first_row: Option<WeeklyReportRow>,
    pub last_row: Option<WeeklyReportRow>,
}

impl RunDiagnostics {
    pub fn total_reassignments(&self) -> usize {
        self.agent_weeks
            .iter()
            .map(|week| week.total_reassignments)
            .sum()
    }

    /// Reassignment totals per agent across the run.
    pub fn reassignments_by_agent(&self) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for week in &self.agent_weeks {
            for count in &week.by_agent {
                *totals.entry(count.agent_id.clone()).or_insert(0) += count.reassignments;
            }
        }
        totals
    }
}

impl Diagnostics {
    pub fn record_activity(&mut self, counts: ActivityCounts, engagement: Option<f64>) {
        self.activity.push(counts);
        if let Some(level) = engagement {
            self.engagement.push(level);
        }
    }

    pub fn record_control_events(&mut self, events: &[ControlEvent]) {
        self.control_events.extend_from_slice(events);
    }

    pub fn record_agents(&mut self, week_index: u32, turn: u32, mut by_agent: Vec<AgentCount>) {
        by_agent.sort_by(|left, right| left.agent_id.cmp(&right.agent_id));
        let total_reassignments = by_agent.iter().map(|count| count.reassignments).sum();
        self.agent_weeks.push(AgentWeek {
            week_index,
            turn,
            by_agent,
            total_reassignments,
        });
    }

    pub fn record_weekly(&mut self, row: &WeeklyReportRow) {
        if self.first_row.is_none() {
            self.first_row = Some(row.clone());
        }
        self.last_row = Some(row.clone());
    }

    pub fn finish(self) -> RunDiagnostics {
        let mut control_events = self.control_events;
        control_events.sort();
        let mut events_by_mechanism = BTreeMap::new();
        for event in &control_events {
            *events_by_mechanism
                .entry(event.mechanism.clone())
                .or_insert(0) += 1;
        }
        RunDiagnostics {
            activity: activity::summarize(&self.activity, &self.engagement),
            control_events,
            events_by_mechanism,
            agent_weeks: self.agent_weeks,
            first_row: self.first_row,
            last_row: self.last_row,
        }
    }
}
