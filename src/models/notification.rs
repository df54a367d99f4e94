use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ExamSoon,
    Neglected,
    UrgentReview,
}

impl NotificationKind {
    /// Prefix used in notification ids.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::ExamSoon => "exam",
            NotificationKind::Neglected => "neglect",
            NotificationKind::UrgentReview => "progress",
        }
    }
}

/// Derived alert. Never stored; rebuilt on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub urgent: bool,
    pub course_id: String,
}

impl Notification {
    pub fn id_for(kind: NotificationKind, course_id: &str) -> String {
        format!("{}-{}", kind.as_str(), course_id)
    }
}
