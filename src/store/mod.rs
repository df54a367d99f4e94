pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{CourseRecord, Topic, TopicPatch};

pub use memory::InMemoryStore;

/// Persistence collaborator behind the engine. Implementations return
/// fully-formed entities; `update_topic` answers with the authoritative
/// merge result.
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<CourseRecord>, AppError>;
    async fn list_topics(&self, course_id: &str) -> Result<Vec<Topic>, AppError>;
    async fn update_topic(
        &self,
        course_id: &str,
        topic_id: &str,
        patch: &TopicPatch,
    ) -> Result<Topic, AppError>;
    /// Removes the topic together with its sub-topics.
    async fn delete_topic(&self, course_id: &str, topic_id: &str) -> Result<(), AppError>;
    /// Most recent topic change in the course, if any.
    async fn last_activity(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, AppError>;
}
