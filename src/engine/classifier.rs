use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Course;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Windows and cut-offs for urgency signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub exam_soon_days: i64,
    pub urgent_review_days: i64,
    pub urgent_progress_below: f64,
    pub neglect_after_days: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            exam_soon_days: 7,
            urgent_review_days: 14,
            urgent_progress_below: 30.0,
            neglect_after_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub days_until_exam: i64,
    pub is_neglected: bool,
    pub is_exam_soon: bool,
    pub is_urgent_review: bool,
}

/// Whole days until the exam, rounding any fraction up.
pub fn days_until(exam_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (exam_date - now).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).ceil() as i64
}

impl AlertThresholds {
    /// Past exams (zero or negative day counts) never qualify.
    pub fn is_exam_soon(&self, days_until_exam: i64) -> bool {
        days_until_exam > 0 && days_until_exam <= self.exam_soon_days
    }

    pub fn is_urgent_review(&self, days_until_exam: i64, progress: f64) -> bool {
        days_until_exam > 0
            && days_until_exam <= self.urgent_review_days
            && progress < self.urgent_progress_below
    }

    /// A course with no recorded activity is not considered neglected.
    pub fn is_neglected(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_activity
            .map(|last| now - last > Duration::days(self.neglect_after_days))
            .unwrap_or(false)
    }

    pub fn classify(
        &self,
        exam_date: DateTime<Utc>,
        progress: f64,
        now: DateTime<Utc>,
        last_activity: Option<DateTime<Utc>>,
    ) -> Classification {
        let days_until_exam = days_until(exam_date, now);
        Classification {
            days_until_exam,
            is_neglected: self.is_neglected(last_activity, now),
            is_exam_soon: self.is_exam_soon(days_until_exam),
            is_urgent_review: self.is_urgent_review(days_until_exam, progress),
        }
    }
}

/// Classifies `course` with the default thresholds.
pub fn classify(
    course: &Course,
    now: DateTime<Utc>,
    last_activity: Option<DateTime<Utc>>,
) -> Classification {
    AlertThresholds::default().classify(course.exam_date, course.progress, now, last_activity)
}
