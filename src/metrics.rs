use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing intake activity.
#[derive(Default)]
pub struct IntakeMetrics {
    documents_uploaded: AtomicU64,
    classifications: AtomicU64,
    summaries: AtomicU64,
    deadline_extractions: AtomicU64,
    chat_questions: AtomicU64,
    cache_hits: AtomicU64,
}

impl IntakeMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record documents added to the session.
    pub fn record_uploads(&self, count: u64) {
        self.documents_uploaded.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a classification computed (not served from the memo).
    pub fn record_classification(&self) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a generated summary.
    pub fn record_summary(&self) {
        self.summaries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deadline extraction run.
    pub fn record_deadline_extraction(&self) {
        self.deadline_extractions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered chat question.
    pub fn record_chat_question(&self) {
        self.chat_questions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request answered from a session memo.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
            deadline_extractions: self.deadline_extractions.load(Ordering::Relaxed),
            chat_questions: self.chat_questions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of intake counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents added since startup (archive members counted individually).
    pub documents_uploaded: u64,
    /// Classifications that required a model call or filename check.
    pub classifications: u64,
    /// Summaries generated.
    pub summaries: u64,
    /// Deadline extraction runs.
    pub deadline_extractions: u64,
    /// Chat questions answered.
    pub chat_questions: u64,
    /// Requests answered from a session memo instead of the model.
    pub cache_hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_activity() {
        let metrics = IntakeMetrics::new();
        metrics.record_uploads(3);
        metrics.record_classification();
        metrics.record_classification();
        metrics.record_summary();
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_uploaded, 3);
        assert_eq!(snapshot.classifications, 2);
        assert_eq!(snapshot.summaries, 1);
        assert_eq!(snapshot.deadline_extractions, 0);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(IntakeMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
