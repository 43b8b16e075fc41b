use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTestcaseRecord {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub verdict: String,
    pub reason: String,
}

impl ExecutedTestcaseRecord {
    pub fn now(name: String, verdict: String, reason: String) -> Self {
        Self {
            timestamp: Utc::now(),
            name,
            verdict,
            reason,
        }
    }
}

/// Append-only list of finished test cases. Clones share the same list, so a
/// handle kept by the caller stays readable after the session ends.
#[derive(Debug, Clone, Default)]
pub struct TestcaseResults {
    records: Arc<Mutex<Vec<ExecutedTestcaseRecord>>>,
}

impl TestcaseResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ExecutedTestcaseRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn snapshot(&self) -> Vec<ExecutedTestcaseRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
