use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::result::ExecutionResult;
use crate::state::RunStatus;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
const TOP_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub run_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub success: bool,
    pub duration_ms: u64,
    pub documents_processed: usize,
    pub errors: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl From<&ExecutionResult> for ExecutionRecord {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            run_id: result.run_id,
            pipeline: result.pipeline_name.clone(),
            status: result.status,
            success: result.success,
            duration_ms: u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
            documents_processed: result.units.len(),
            errors: result.errors.clone(),
            finished_at: result.finished_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub cancelled_runs: usize,
    pub average_duration_ms: f64,
    pub average_documents_processed: f64,
    /// Most frequent error messages (exact match) with their counts.
    pub top_errors: Vec<(String, usize)>,
}

/// Bounded run history; the oldest record is evicted first.
#[derive(Debug)]
pub struct ExecutionHistory {
    limit: usize,
    records: VecDeque<ExecutionRecord>,
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ExecutionHistory {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            records: VecDeque::with_capacity(limit),
        }
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn find(&self, run_id: Uuid) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.run_id == run_id)
    }

    /// Aggregate over all records, or those of one pipeline.
    #[must_use]
    pub fn metrics(&self, pipeline: Option<&str>) -> PipelineMetrics {
        let records: Vec<&ExecutionRecord> = self
            .records
            .iter()
            .filter(|r| pipeline.is_none_or(|p| r.pipeline == p))
            .collect();
        if records.is_empty() {
            return PipelineMetrics::default();
        }

        let mut error_counts: HashMap<&str, usize> = HashMap::new();
        for error in records.iter().flat_map(|r| &r.errors) {
            *error_counts.entry(error.as_str()).or_default() += 1;
        }
        let mut top_errors: Vec<(String, usize)> = error_counts
            .into_iter()
            .map(|(msg, count)| (msg.to_owned(), count))
            .collect();
        top_errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_errors.truncate(TOP_ERRORS);

        let total = records.len();
        let count = |status: RunStatus| records.iter().filter(|r| r.status == status).count();
        #[allow(clippy::cast_precision_loss)]
        let avg = |sum: u64| sum as f64 / total as f64;

        PipelineMetrics {
            total_runs: total,
            successful_runs: records.iter().filter(|r| r.success).count(),
            failed_runs: count(RunStatus::Failed),
            cancelled_runs: count(RunStatus::Cancelled),
            average_duration_ms: avg(records.iter().map(|r| r.duration_ms).sum()),
            average_documents_processed: avg(
                records.iter().map(|r| r.documents_processed as u64).sum(),
            ),
            top_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pipeline: &str, status: RunStatus, duration_ms: u64, docs: usize, errors: &[&str]) -> ExecutionRecord {
        ExecutionRecord {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status,
            success: status == RunStatus::Completed,
            duration_ms,
            documents_processed: docs,
            errors: errors.iter().map(|e| (*e).to_owned()).collect(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = ExecutionHistory::new(3);
        let ids: Vec<Uuid> = (0..5)
            .map(|_| {
                let r = record("p", RunStatus::Completed, 1, 1, &[]);
                let id = r.run_id;
                history.push(r);
                id
            })
            .collect();
        assert_eq!(history.len(), 3);
        assert!(history.find(ids[0]).is_none());
        assert!(history.find(ids[1]).is_none());
        assert!(history.find(ids[4]).is_some());
    }

    #[test]
    fn aggregates_counts_and_averages() {
        let mut history = ExecutionHistory::default();
        history.push(record("a", RunStatus::Completed, 10, 4, &[]));
        history.push(record("a", RunStatus::Failed, 30, 0, &["split: boom"]));
        history.push(record("a", RunStatus::Cancelled, 20, 2, &[]));
        history.push(record("b", RunStatus::Completed, 100, 10, &[]));

        let m = history.metrics(Some("a"));
        assert_eq!(m.total_runs, 3);
        assert_eq!(m.successful_runs, 1);
        assert_eq!(m.failed_runs, 1);
        assert_eq!(m.cancelled_runs, 1);
        assert!((m.average_duration_ms - 20.0).abs() < f64::EPSILON);
        assert!((m.average_documents_processed - 2.0).abs() < f64::EPSILON);

        assert_eq!(history.metrics(None).total_runs, 4);
        assert_eq!(history.metrics(Some("missing")), PipelineMetrics::default());
    }

    #[test]
    fn top_errors_by_exact_message() {
        let mut history = ExecutionHistory::default();
        for (msg, n) in [("e1", 1), ("e2", 4), ("e3", 2), ("e4", 3), ("e5", 5), ("e6", 6)] {
            for _ in 0..n {
                history.push(record("p", RunStatus::Failed, 1, 0, &[msg]));
            }
        }
        let top = history.metrics(None).top_errors;
        let names: Vec<&str> = top.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(names, vec!["e6", "e5", "e2", "e4", "e3"]);
        assert_eq!(top[0].1, 6);
    }
}
