use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::engine::hierarchy::subtree_ids;
use crate::error::AppError;
use crate::models::{CourseRecord, Topic, TopicPatch};
use crate::store::TopicStore;

#[derive(Debug, Default)]
struct Inner {
    courses: Vec<CourseRecord>,
    topics: Vec<Topic>,
}

/// `TopicStore` kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(courses: Vec<CourseRecord>, topics: Vec<Topic>) -> Self {
        Self {
            inner: Mutex::new(Inner { courses, topics }),
        }
    }

    pub fn insert_course(&self, course: CourseRecord) -> Result<(), AppError> {
        self.lock()?.courses.push(course);
        Ok(())
    }

    pub fn insert_topic(&self, topic: Topic) -> Result<(), AppError> {
        self.lock()?.topics.push(topic);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, AppError> {
        self.inner.lock().map_err(|_| AppError::InternalServerError)
    }
}

#[async_trait]
impl TopicStore for InMemoryStore {
    async fn list_courses(&self) -> Result<Vec<CourseRecord>, AppError> {
        Ok(self.lock()?.courses.clone())
    }

    async fn list_topics(&self, course_id: &str) -> Result<Vec<Topic>, AppError> {
        Ok(self
            .lock()?
            .topics
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn update_topic(
        &self,
        course_id: &str,
        topic_id: &str,
        patch: &TopicPatch,
    ) -> Result<Topic, AppError> {
        let mut inner = self.lock()?;
        let topic = inner
            .topics
            .iter_mut()
            .find(|t| t.course_id == course_id && t.id == topic_id)
            .ok_or(AppError::NotFound)?;

        if let Some(expected) = patch.expected_updated_at {
            if topic.updated_at != expected {
                return Err(AppError::Conflict(format!("topic {} changed since it was read", topic_id)));
            }
        }

        topic.apply(patch);
        topic.updated_at = Utc::now();
        Ok(topic.clone())
    }

    async fn delete_topic(&self, course_id: &str, topic_id: &str) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        let course_topics: Vec<Topic> = inner
            .topics
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        if !course_topics.iter().any(|t| t.id == topic_id) {
            return Err(AppError::NotFound);
        }

        let doomed = subtree_ids(&course_topics, topic_id);
        inner
            .topics
            .retain(|t| t.course_id != course_id || !doomed.contains(&t.id));
        Ok(())
    }

    async fn last_activity(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self
            .lock()?
            .topics
            .iter()
            .filter(|t| t.course_id == course_id)
            .map(|t| t.updated_at)
            .max())
    }
}
