use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::engine::CourseSummary;

/// Stored identity of a course. Everything derived from its topics lives on
/// [`Course`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CourseRecord {
    pub id: String,
    pub course_name: String,
    pub course_code: String,
    pub exam_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub course_name: String,
    pub course_code: String,
    pub exam_date: DateTime<Utc>,
    /// Unrounded completion percentage in `[0, 100]`.
    pub progress: f64,
    pub total_hours: f64,
    pub topic_count: usize,
    pub completed_topics: usize,
    pub is_neglected: bool,
}

impl Course {
    pub fn from_parts(record: CourseRecord, summary: &CourseSummary, is_neglected: bool) -> Self {
        Self {
            id: record.id,
            course_name: record.course_name,
            course_code: record.course_code,
            exam_date: record.exam_date,
            progress: summary.progress,
            total_hours: summary.total_hours,
            topic_count: summary.topic_count,
            completed_topics: summary.completed_topics,
            is_neglected,
        }
    }

    /// Case-insensitive match on name or code. An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.course_name.to_lowercase().contains(&query)
            || self.course_code.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub course_name: String,
    pub course_code: String,
    pub exam_date: DateTime<Utc>,
}
