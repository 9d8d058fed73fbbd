//! The orchestrator's per-invocation output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Observable lifecycle of a single pipeline stage. `Partial` exists so a
/// stage can report "some topics saved, some didn't" distinctly from a
/// clean `Success` or a total `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Skipped,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub create: u32,
    pub merge: u32,
    pub verify: u32,
}

/// One error recorded against a specific pipeline stage and, when known,
/// the topic being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub stage: String,
    pub topic: Option<String>,
    pub kind: String,
    pub message: String,
}

impl RunError {
    pub fn new(stage: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            topic: None,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// The structured report returned by every orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pages_crawled: usize,
    pub topics_extracted: usize,
    pub decisions: DecisionCounts,
    pub documents_created: usize,
    pub documents_merged: usize,
    pub errors: Vec<RunError>,
    pub stage_statuses: BTreeMap<String, StageStatus>,
}

impl RunReport {
    pub fn empty() -> Self {
        Self {
            pages_crawled: 0,
            topics_extracted: 0,
            decisions: DecisionCounts::default(),
            documents_created: 0,
            documents_merged: 0,
            errors: Vec::new(),
            stage_statuses: BTreeMap::new(),
        }
    }

    /// A run is fatal iff the crawl produced zero pages, or some stage that
    /// was attempted saved zero of N results where N >= 1.
    pub fn is_fatal(&self) -> bool {
        self.stage_statuses.values().any(|s| *s == StageStatus::Failed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            1
        } else {
            0
        }
    }
}
