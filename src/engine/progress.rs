use serde::Serialize;

use crate::engine::hierarchy::TopicTree;
use crate::error::AppError;
use crate::models::{Course, Topic, TopicStatus};

/// Length of one pomodoro study session.
pub const POMODORO_MINUTES: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseSummary {
    /// Unrounded percentage; use [`display_progress`] for presentation.
    pub progress: f64,
    pub total_hours: f64,
    pub topic_count: usize,
    pub completed_topics: usize,
    pub in_progress_topics: usize,
}

impl CourseSummary {
    pub fn rounded_progress(&self) -> u32 {
        display_progress(self.progress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardStats {
    pub active_courses: usize,
    pub completion_rate: u32,
    pub study_hours: f64,
}

/// Completion percentage over every topic of a course, nesting ignored.
///
/// Each topic weighs `100 / N`; only completed topics count. An empty course
/// is at 0.
pub fn compute_progress(topics: &[Topic]) -> f64 {
    if topics.is_empty() {
        return 0.0;
    }
    let completed = topics
        .iter()
        .filter(|t| t.status == TopicStatus::Completed)
        .count();
    completed as f64 * 100.0 / topics.len() as f64
}

pub fn display_progress(progress: f64) -> u32 {
    progress.clamp(0.0, 100.0).round() as u32
}

/// Display weight of a single topic. `topic_count` is the whole course's
/// topic count, for main and sub-topics alike.
pub fn topic_weight(topic_count: usize) -> u32 {
    (100.0 / topic_count.max(1) as f64).round() as u32
}

/// Derived course fields. Rejects a malformed hierarchy instead of
/// reporting numbers for it.
pub fn compute_course_summary(topics: &[Topic]) -> Result<CourseSummary, AppError> {
    let tree = TopicTree::build(topics)?;

    let mut completed_topics = 0;
    let mut in_progress_topics = 0;
    for topic in topics {
        match topic.status {
            TopicStatus::Completed => completed_topics += 1,
            TopicStatus::InProgress => in_progress_topics += 1,
            TopicStatus::NotStarted => {}
        }
    }

    Ok(CourseSummary {
        progress: compute_progress(topics),
        total_hours: topics.iter().map(|t| t.hours_spent).sum(),
        topic_count: tree.len(),
        completed_topics,
        in_progress_topics,
    })
}

/// Adds a finished study session to `hours_spent`, kept to two decimals.
pub fn log_study_minutes(hours_spent: f64, minutes: u32) -> f64 {
    let hours = hours_spent + f64::from(minutes) / 60.0;
    (hours * 100.0).round() / 100.0
}

pub fn dashboard_stats(courses: &[Course]) -> DashboardStats {
    let progress_sum: f64 = courses.iter().map(|c| c.progress).sum();
    DashboardStats {
        active_courses: courses.len(),
        completion_rate: display_progress(progress_sum / courses.len().max(1) as f64),
        study_hours: courses.iter().map(|c| c.total_hours).sum(),
    }
}
