use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::engine::classifier::{AlertThresholds, days_until};
use crate::models::{Course, Notification, NotificationKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationGenerator {
    thresholds: AlertThresholds,
}

impl NotificationGenerator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    /// Alerts for `courses` in input order. Per course the order is exam
    /// reminder, neglect warning, urgent review; any subset may fire.
    pub fn generate(&self, courses: &[Course], now: DateTime<Utc>) -> Vec<Notification> {
        let mut generated = Vec::new();

        for course in courses {
            let days = days_until(course.exam_date, now);

            if self.thresholds.is_exam_soon(days) {
                generated.push(Notification {
                    id: Notification::id_for(NotificationKind::ExamSoon, &course.id),
                    kind: NotificationKind::ExamSoon,
                    title: "Exam Coming Up".to_string(),
                    description: format!(
                        "{} ({}) exam in {} day{}",
                        course.course_name,
                        course.course_code,
                        days,
                        if days == 1 { "" } else { "s" }
                    ),
                    urgent: true,
                    course_id: course.id.clone(),
                });
            }

            if course.is_neglected {
                generated.push(Notification {
                    id: Notification::id_for(NotificationKind::Neglected, &course.id),
                    kind: NotificationKind::Neglected,
                    title: "Neglected Course".to_string(),
                    description: format!(
                        "You haven't studied {} in over {} days. Time to catch up!",
                        course.course_code, self.thresholds.neglect_after_days
                    ),
                    urgent: false,
                    course_id: course.id.clone(),
                });
            }

            if self.thresholds.is_urgent_review(days, course.progress) {
                generated.push(Notification {
                    id: Notification::id_for(NotificationKind::UrgentReview, &course.id),
                    kind: NotificationKind::UrgentReview,
                    title: "Urgent Review".to_string(),
                    description: format!(
                        "Exam soon for {} but progress is low. Focus on this today!",
                        course.course_code
                    ),
                    urgent: true,
                    course_id: course.id.clone(),
                });
            }
        }

        generated
    }
}

/// Generates alerts with the default thresholds.
pub fn generate_notifications(courses: &[Course], now: DateTime<Utc>) -> Vec<Notification> {
    NotificationGenerator::default().generate(courses, now)
}

/// Drops notifications the user has already acknowledged. The input is left
/// untouched.
pub fn filter_acknowledged(
    notifications: &[Notification],
    acknowledged: &HashSet<String>,
) -> Vec<Notification> {
    notifications
        .iter()
        .filter(|n| !acknowledged.contains(&n.id))
        .cloned()
        .collect()
}
