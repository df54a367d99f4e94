use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::{
    AlertThresholds, Classification, CourseSummary, DashboardStats, NotificationGenerator,
    compute_course_summary, dashboard_stats,
};
use crate::error::AppError;
use crate::models::{Course, CourseRecord, Notification};
use crate::store::TopicStore;

/// Builds derived courses, dashboard figures and alerts from the store.
#[derive(Clone)]
pub struct OverviewService {
    store: Arc<dyn TopicStore>,
    thresholds: AlertThresholds,
}

impl OverviewService {
    pub fn new(store: Arc<dyn TopicStore>, thresholds: AlertThresholds) -> Self {
        Self { store, thresholds }
    }

    pub async fn courses(&self, now: DateTime<Utc>) -> Result<Vec<Course>, AppError> {
        let records = self.store.list_courses().await?;
        let mut courses = Vec::with_capacity(records.len());
        for record in records {
            let (course, _, _) = self.evaluate(record, now).await?;
            courses.push(course);
        }
        Ok(courses)
    }

    pub async fn course(&self, course_id: &str, now: DateTime<Utc>) -> Result<Course, AppError> {
        let (course, _, _) = self.evaluate_by_id(course_id, now).await?;
        Ok(course)
    }

    /// Course, its full summary and its classification, all derived from one
    /// read of the course's topics.
    pub async fn course_detail(
        &self,
        course_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Course, CourseSummary, Classification), AppError> {
        self.evaluate_by_id(course_id, now).await
    }

    pub async fn notifications(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, AppError> {
        let courses = self.courses(now).await?;
        Ok(NotificationGenerator::new(self.thresholds).generate(&courses, now))
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardStats, AppError> {
        let courses = self.courses(now).await?;
        Ok(dashboard_stats(&courses))
    }

    async fn evaluate_by_id(
        &self,
        course_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Course, CourseSummary, Classification), AppError> {
        let record = self
            .store
            .list_courses()
            .await?
            .into_iter()
            .find(|c| c.id == course_id)
            .ok_or(AppError::NotFound)?;
        self.evaluate(record, now).await
    }

    async fn evaluate(
        &self,
        record: CourseRecord,
        now: DateTime<Utc>,
    ) -> Result<(Course, CourseSummary, Classification), AppError> {
        let topics = self.store.list_topics(&record.id).await?;
        let summary = compute_course_summary(&topics)?;
        let last_activity = self.store.last_activity(&record.id).await?;
        let classification =
            self.thresholds
                .classify(record.exam_date, summary.progress, now, last_activity);

        debug!("Course {} classified: {:?}", record.id, classification);
        Ok((
            Course::from_parts(record, &summary, classification.is_neglected),
            summary,
            classification,
        ))
    }
}
