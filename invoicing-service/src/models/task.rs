//! Task model for invoicing-service.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::UnknownVariant;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Planned => "planned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(TaskStatus::Planned),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled tasks accept no further moves.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (
                TaskStatus::Planned,
                TaskStatus::InProgress | TaskStatus::Completed | TaskStatus::Cancelled
            ) | (
                TaskStatus::InProgress,
                TaskStatus::Completed | TaskStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskStatus::from_string(&value).ok_or(UnknownVariant {
            kind: "task status",
            value,
        })
    }
}

/// A scheduled cleaning task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub task_id: Uuid,
    pub customer_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub estimated_duration_hours: Decimal,
    pub actual_duration_hours: Option<Decimal>,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub invoice_generated: bool,
    pub invoiced_utc: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub completed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Task {
    /// Hours billed for the task: the recorded duration, or the estimate when none was recorded.
    pub fn billable_hours(&self) -> Decimal {
        self.actual_duration_hours
            .unwrap_or(self.estimated_duration_hours)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub customer_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub estimated_duration_hours: Decimal,
    pub notes: Option<String>,
}

/// Filter parameters for listing tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub invoice_generated: Option<bool>,
}

impl TaskFilter {
    /// Completed tasks that have no invoice yet.
    pub fn invoiceable() -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            invoice_generated: Some(false),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| s == task.status)
            && self
                .invoice_generated
                .is_none_or(|flag| flag == task.invoice_generated)
    }
}

/// A status change applied by the store.
#[derive(Debug, Clone)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
    pub actual_duration_hours: Option<Decimal>,
    pub completed_utc: Option<DateTime<Utc>>,
}
