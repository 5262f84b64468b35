use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

/// Persistent queue row (spec §3, §4.5). `request_id` is the primary key;
/// at most one non-terminal row may exist per `username`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct QueueItem {
    pub request_id: Uuid,
    pub username: String,
    pub source: String,
    pub priority: Priority,
    pub status: QueueStatus,
    pub attempts: i32,
    pub submitted_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl QueueItem {
    pub fn new(username: impl Into<String>, source: impl Into<String>, priority: Priority) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            username: username.into(),
            source: source.into(),
            priority,
            status: QueueStatus::Pending,
            attempts: 0,
            submitted_at: Utc::now(),
            last_attempt_at: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, QueueStatus::Completed | QueueStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_pending() {
        let item = QueueItem::new("mindset.therapy", "api", Priority::High);
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert!(!item.is_terminal());
    }
}
