//! Batch report and aggregate totals

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::domain::StoryOutcome;

/// Totals over the successful entries of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub effort: f64,
    pub time: f64,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchTotals {
    pub fn from_outcomes(outcomes: &[StoryOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut totals, outcome| {
            match outcome.plan() {
                Some(plan) => {
                    totals.effort += plan.effort;
                    totals.time += plan.time;
                    totals.succeeded += 1;
                }
                None => totals.failed += 1,
            }
            totals
        })
    }
}

/// One outcome per input story, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub outcomes: Vec<StoryOutcome>,
    pub totals: BatchTotals,
}

impl BatchReport {
    pub fn new(outcomes: Vec<StoryOutcome>) -> Self {
        let totals = BatchTotals::from_outcomes(&outcomes);
        Self {
            generated_at: Utc::now(),
            outcomes,
            totals,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report for the terminal
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", "Story estimation report".bold()));
        out.push_str(&format!("{}\n\n", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()));

        for (index, outcome) in self.outcomes.iter().enumerate() {
            match outcome {
                StoryOutcome::Planned(plan) => {
                    out.push_str(&format!(
                        "{:>3}. {} {}  effort {:.2}  time {:.2}h  complexity {:?}\n",
                        index + 1,
                        "✓".green(),
                        plan.story_title.bold(),
                        plan.effort,
                        plan.time,
                        plan.overall_complexity,
                    ));
                    for task in &plan.action_plan.tasks {
                        out.push_str(&format!("       - {} ({:.1}h)\n", task.task_name, task.estimated_hours));
                    }
                }
                StoryOutcome::Failed(record) => {
                    out.push_str(&format!(
                        "{:>3}. {} {}  [{}] {}\n",
                        index + 1,
                        "✗".red(),
                        record.story_title.bold(),
                        record.reason.to_string().yellow(),
                        record.message,
                    ));
                }
            }
        }

        out.push_str(&format!(
            "\n{} {} succeeded, {} failed | effort {:.2} | time {:.2}h\n",
            "Totals:".bold(),
            self.totals.succeeded,
            self.totals.failed,
            self.totals.effort,
            self.totals.time,
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureReason, FailureRecord, fixtures};
    use proptest::prelude::*;

    fn planned(effort: f64, time: f64) -> StoryOutcome {
        let mut plan = fixtures::plan("Planned story");
        plan.effort = effort;
        plan.time = time;
        StoryOutcome::Planned(plan)
    }

    fn failed() -> StoryOutcome {
        StoryOutcome::Failed(FailureRecord::new(FailureReason::BatchItemTimeout, "stall", "Stalled story"))
    }

    #[test]
    fn test_totals_skip_failures() {
        let report = BatchReport::new(vec![planned(2.0, 5.0), failed(), planned(1.5, 3.0)]);
        assert_eq!(
            report.totals,
            BatchTotals {
                effort: 3.5,
                time: 8.0,
                succeeded: 2,
                failed: 1,
            }
        );
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_render_text_lists_every_outcome() {
        colored::control::set_override(false);
        let text = BatchReport::new(vec![planned(2.0, 5.0), failed()]).render_text();
        assert!(text.contains("  1. ✓ Planned story  effort 2.00  time 5.00h"));
        assert!(text.contains("  2. ✗ Stalled story  [batch_item_timeout] stall"));
        assert!(text.contains("1 succeeded, 1 failed"));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let report = BatchReport::new(vec![failed(), planned(1.0, 1.0)]);
        let back: BatchReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(!back.outcomes[0].is_success());
        assert!(back.outcomes[1].is_success());
    }

    proptest! {
        #[test]
        fn prop_totals_sum_only_successes(entries in proptest::collection::vec(
            proptest::option::of((0u32..1000, 0u32..1000)), 0..20)
        ) {
            let outcomes: Vec<StoryOutcome> = entries
                .iter()
                .map(|e| match e {
                    Some((effort, time)) => planned(*effort as f64, *time as f64),
                    None => failed(),
                })
                .collect();
            let report = BatchReport::new(outcomes);

            let expected_effort: f64 = entries.iter().flatten().map(|(e, _)| *e as f64).sum();
            let expected_time: f64 = entries.iter().flatten().map(|(_, t)| *t as f64).sum();
            prop_assert_eq!(report.len(), entries.len());
            prop_assert_eq!(report.totals.effort, expected_effort);
            prop_assert_eq!(report.totals.time, expected_time);
            prop_assert_eq!(report.totals.succeeded + report.totals.failed, entries.len());
        }
    }
}
