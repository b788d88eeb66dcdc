//! Persisted simulation results.
//!
//! # Storage format
//!
//! One JSON document per experiment, indexed by scheduler name:
//!
//! ```json
//! {
//!   "runs": {
//!     "round_robin":       { "run_id": "…", "scheduler": "round_robin", "config": {…}, "report": {…} },
//!     "proportional_fair": { "run_id": "…", "scheduler": "proportional_fair", … }
//!   }
//! }
//! ```
//!
//! `report` is the [`AggregateReport`] of the run; `config` echoes the full
//! [`SimConfig`] so a document is self-describing and reproducible (the seed
//! is part of the config).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::stats::AggregateReport;

/// One finished simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub scheduler: String,
    pub config: SimConfig,
    pub report: AggregateReport,
}

impl RunRecord {
    pub fn new(scheduler: impl Into<String>, config: SimConfig, report: AggregateReport) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            scheduler: scheduler.into(),
            config,
            report,
        }
    }
}

/// Results document holding at most one run per scheduler name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub runs: BTreeMap<String, RunRecord>,
}

impl ResultsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a run, replacing any previous run of the same scheduler.
    pub fn insert(&mut self, record: RunRecord) {
        self.runs.insert(record.scheduler.clone(), record);
    }

    pub fn get(&self, scheduler: &str) -> Option<&RunRecord> {
        self.runs.get(scheduler)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }

    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_report() -> AggregateReport {
        AggregateReport {
            sim_duration_ms: 20,
            cell_throughput_mbps: vec![1.5, 2.0],
            user_throughput_mbps: [(1u32, vec![0.5, 1.0]), (2u32, vec![1.0, 1.0])]
                .into_iter()
                .collect(),
            avg_user_throughput_mbps: [(1u32, 0.75), (2u32, 1.0)].into_iter().collect(),
            jain_index_per_frame: vec![0.9, 1.0],
            jain_index_overall: 0.95,
            spectral_efficiency: vec![0.15, 0.2],
        }
    }

    #[test]
    fn document_round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.json");

        let mut doc = ResultsDocument::new();
        doc.insert(RunRecord::new(
            "round_robin",
            SimConfig::default(),
            dummy_report(),
        ));
        doc.save(&path).unwrap();

        let loaded = ResultsDocument::load(&path).unwrap();
        assert_eq!(loaded, doc);
        assert!(loaded.get("round_robin").is_some());
        assert!(loaded.get("best_cqi").is_none());
    }

    #[test]
    fn insert_replaces_same_scheduler() {
        let mut doc = ResultsDocument::new();
        let first = RunRecord::new("best_cqi", SimConfig::default(), dummy_report());
        let second = RunRecord::new("best_cqi", SimConfig::default(), dummy_report());
        let second_id = second.run_id.clone();
        doc.insert(first);
        doc.insert(second);
        assert_eq!(doc.runs.len(), 1);
        assert_eq!(doc.get("best_cqi").unwrap().run_id, second_id);
    }
}
