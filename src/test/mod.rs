use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use crate::*;

mod notifications;
mod presence;
mod subscription;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Task {
    pub id: String,
    pub status: String,
    pub assignee: String,
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) fn task(id: &str, status: &str, assignee: &str) -> Task {
    Task {
        id: id.to_string(),
        status: status.to_string(),
        assignee: assignee.to_string(),
    }
}

pub(crate) fn task_row(id: &str, status: &str, assignee: &str) -> Document {
    doc! {
        "id" => id,
        "status" => status,
        "assignee" => assignee,
    }
}

pub(crate) fn base_time() -> Timestamp {
    chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub(crate) fn notif(id: &str, user: &str, read: bool, offset_secs: i64) -> Notification {
    Notification {
        id: id.to_string(),
        kind: NotificationKind::Task,
        title: format!("Task update {id}"),
        message: "a task you follow changed".to_string(),
        user_id: user.to_string(),
        read,
        created_at: base_time() + chrono::Duration::seconds(offset_secs),
        metadata: None,
    }
}
