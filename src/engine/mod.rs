//! Pure study-progress rules: topic hierarchy, completion, urgency and the
//! alerts derived from them. Nothing in here performs I/O.

pub mod classifier;
pub mod hierarchy;
pub mod notifications;
pub mod progress;

pub use classifier::{AlertThresholds, Classification, classify, days_until};
pub use hierarchy::{TopicNode, TopicTree, validate_parent};
pub use notifications::{NotificationGenerator, filter_acknowledged, generate_notifications};
pub use progress::{
    CourseSummary, DashboardStats, POMODORO_MINUTES, compute_course_summary, compute_progress,
    dashboard_stats, display_progress, log_study_minutes, topic_weight,
};
