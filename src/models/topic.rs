use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TopicStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TopicStatus {
    /// One step of the toggle cycle. There is no shortcut from
    /// `NotStarted` to `Completed`.
    pub fn next(self) -> Self {
        match self {
            TopicStatus::NotStarted => TopicStatus::InProgress,
            TopicStatus::InProgress => TopicStatus::Completed,
            TopicStatus::Completed => TopicStatus::NotStarted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopicStatus::NotStarted => "not_started",
            TopicStatus::InProgress => "in_progress",
            TopicStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: String,
    pub course_id: String,
    pub topic_name: String,
    pub status: TopicStatus,
    pub hours_spent: f64,
    pub parent_topic_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn is_main(&self) -> bool {
        self.parent_topic_id.is_none()
    }

    /// Merges the fields present in `patch` into this topic.
    pub fn apply(&mut self, patch: &TopicPatch) {
        if let Some(name) = &patch.topic_name {
            self.topic_name = name.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(hours) = patch.hours_spent {
            self.hours_spent = hours;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicPatch {
    pub topic_name: Option<String>,
    pub status: Option<TopicStatus>,
    pub hours_spent: Option<f64>,
    /// Stale-write guard: the store rejects the patch with a conflict when
    /// the topic's `updated_at` no longer matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl TopicPatch {
    pub fn status(status: TopicStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn hours(hours_spent: f64) -> Self {
        Self {
            hours_spent: Some(hours_spent),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topic_name.is_none() && self.status.is_none() && self.hours_spent.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopicRequest {
    pub topic_name: String,
    #[serde(default)]
    pub status: TopicStatus,
    #[serde(default)]
    pub hours_spent: f64,
    pub parent_topic_id: Option<String>,
}
