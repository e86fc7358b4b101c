//! Status - タスクとサービスの状態ビュー
//!
//! 読み取り専用。ここでの変換は store に何の副作用も与えない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskRecord, TaskStatus};
use crate::ports::TaskCounts;

/// Snapshot of one task as reported by `GET /status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Minutes since creation, only while the task is still pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl TaskView {
    pub fn from_record(record: TaskRecord, now: DateTime<Utc>) -> Self {
        let elapsed_minutes = (!record.is_terminal()).then(|| {
            let minutes = record.age(now).num_milliseconds() as f64 / 60_000.0;
            (minutes * 10.0).round() / 10.0
        });
        let completed_at = match record.status {
            TaskStatus::Completed => record.completed_at,
            _ => None,
        };

        Self {
            task_id: record.id,
            prompt: record.prompt,
            status: record.status,
            image_urls: record.image_urls,
            created_at: record.created_at,
            completed_at,
            elapsed_minutes,
            error: record.error,
            correlation_id: record.correlation_id,
        }
    }
}

/// Service health reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    pub ok: bool,
    pub upstream_configured: bool,
    pub strategies: Vec<String>,
    pub pending_tasks: usize,
    pub completed_tasks: usize,
    pub active_watchers: usize,
}

impl HealthView {
    pub fn new(
        upstream_configured: bool,
        strategies: Vec<String>,
        counts: TaskCounts,
        active_watchers: usize,
    ) -> Self {
        Self {
            ok: true,
            upstream_configured,
            strategies,
            pending_tasks: counts.pending,
            completed_tasks: counts.completed,
            active_watchers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Prompt, Transition};
    use chrono::TimeZone;

    fn record() -> TaskRecord {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        TaskRecord::new(
            TaskId::parse("t1").unwrap(),
            Prompt::parse("a red fox").unwrap(),
            created,
        )
    }

    #[test]
    fn pending_task_reports_elapsed_minutes() {
        let record = record();
        let now = record.created_at + chrono::Duration::seconds(95);

        let view = TaskView::from_record(record, now);

        assert_eq!(view.status, TaskStatus::Submitted);
        assert_eq!(view.elapsed_minutes, Some(1.6));
        assert!(view.completed_at.is_none());
    }

    #[test]
    fn completed_task_reports_completion_time_only() {
        let mut record = record();
        let now = record.created_at + chrono::Duration::minutes(3);
        record
            .apply(
                Transition::Accepted {
                    correlation_id: "c".into(),
                    strategy: "interaction".into(),
                },
                now,
            )
            .unwrap();
        record
            .apply(
                Transition::Completed {
                    image_urls: vec!["https://cdn.example/a.png".into()],
                },
                now,
            )
            .unwrap();

        let view = TaskView::from_record(record, now + chrono::Duration::minutes(10));

        assert_eq!(view.completed_at, Some(now));
        assert!(view.elapsed_minutes.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["task_id"], "t1");
        assert!(json.get("elapsed_minutes").is_none());
    }

    #[test]
    fn timeout_has_no_completion_time() {
        let mut record = record();
        let now = record.created_at + chrono::Duration::minutes(16);
        record.apply(Transition::TimedOut, now).unwrap();

        let view = TaskView::from_record(record, now);

        assert_eq!(view.status, TaskStatus::Timeout);
        assert!(view.completed_at.is_none());
        assert!(view.image_urls.is_empty());
    }
}
