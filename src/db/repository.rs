use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::engine::validate_parent;
use crate::error::AppError;
use crate::models::{CourseRecord, NewCourseRequest, NewTopicRequest, Topic, TopicPatch};
use crate::store::TopicStore;

const TOPIC_COLUMNS: &str =
    "id, course_id, topic_name, status, hours_spent, parent_topic_id, updated_at";

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<CourseRecord>, sqlx::Error> {
    sqlx::query_as::<_, CourseRecord>(
        "SELECT id, course_name, course_code, exam_date FROM courses ORDER BY created_at ASC, rowid ASC"
    )
    .fetch_all(db)
    .await
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<CourseRecord>, sqlx::Error> {
    sqlx::query_as::<_, CourseRecord>(
        "SELECT id, course_name, course_code, exam_date FROM courses WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_course(
    db: &SqlitePool,
    req: NewCourseRequest,
) -> Result<CourseRecord, AppError> {
    if req.course_name.trim().is_empty() || req.course_code.trim().is_empty() {
        return Err(AppError::BadRequest("course name and code are required".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO courses (id, course_name, course_code, exam_date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&id)
    .bind(&req.course_name)
    .bind(&req.course_code)
    .bind(req.exam_date)
    .bind(now)
    .execute(db)
    .await?;

    Ok(CourseRecord {
        id,
        course_name: req.course_name,
        course_code: req.course_code,
        exam_date: req.exam_date,
    })
}

/// Deletes the course and every topic beneath it.
pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM topics WHERE course_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted > 0)
}

pub async fn fetch_topics(db: &SqlitePool, course_id: &str) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE course_id = ? ORDER BY rowid ASC"
    ))
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn find_topic_by_id(
    db: &SqlitePool,
    course_id: &str,
    id: &str,
) -> Result<Option<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE course_id = ? AND id = ?"
    ))
    .bind(course_id)
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Creates a topic, refusing parents outside the course or below the first level.
pub async fn insert_topic(
    db: &SqlitePool,
    course_id: &str,
    req: NewTopicRequest,
) -> Result<Topic, AppError> {
    if req.topic_name.trim().is_empty() {
        return Err(AppError::BadRequest("topic name is required".to_string()));
    }
    if !req.hours_spent.is_finite() || req.hours_spent < 0.0 {
        return Err(AppError::Validation("hours spent must be a non-negative number".to_string()));
    }
    if find_course_by_id(db, course_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    if let Some(parent_id) = &req.parent_topic_id {
        let existing = fetch_topics(db, course_id).await?;
        validate_parent(&existing, parent_id)?;
    }

    let topic = Topic {
        id: Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        topic_name: req.topic_name,
        status: req.status,
        hours_spent: req.hours_spent,
        parent_topic_id: req.parent_topic_id,
        updated_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO topics
            (id, course_id, topic_name, status, hours_spent, parent_topic_id, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&topic.id)
    .bind(&topic.course_id)
    .bind(&topic.topic_name)
    .bind(topic.status)
    .bind(topic.hours_spent)
    .bind(&topic.parent_topic_id)
    .bind(topic.updated_at)
    .execute(db)
    .await?;

    Ok(topic)
}

pub async fn fetch_acknowledged(db: &SqlitePool) -> Result<HashSet<String>, sqlx::Error> {
    let ids = sqlx::query_scalar::<_, String>("SELECT id FROM acknowledged_notifications")
        .fetch_all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

pub async fn acknowledge_notifications(db: &SqlitePool, ids: &[String]) -> Result<usize, sqlx::Error> {
    let now = Utc::now();
    let mut tx = db.begin().await?;
    let mut inserted = 0;

    for id in ids {
        inserted += sqlx::query(
            "INSERT OR IGNORE INTO acknowledged_notifications (id, acknowledged_at) VALUES (?, ?)"
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(inserted)
}

/// `TopicStore` backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TopicStore for SqliteStore {
    async fn list_courses(&self) -> Result<Vec<CourseRecord>, AppError> {
        fetch_courses(&self.db).await.map_err(AppError::from_store)
    }

    async fn list_topics(&self, course_id: &str) -> Result<Vec<Topic>, AppError> {
        fetch_topics(&self.db, course_id)
            .await
            .map_err(AppError::from_store)
    }

    async fn update_topic(
        &self,
        course_id: &str,
        topic_id: &str,
        patch: &TopicPatch,
    ) -> Result<Topic, AppError> {
        // One statement: the precondition check and the write cannot interleave
        // with another writer, and no read lock is ever upgraded.
        let updated = sqlx::query_as::<_, Topic>(&format!(
            r#"
            UPDATE topics
            SET topic_name = COALESCE(?1, topic_name),
                status = COALESCE(?2, status),
                hours_spent = COALESCE(?3, hours_spent),
                updated_at = ?4
            WHERE course_id = ?5 AND id = ?6
              AND (?7 IS NULL OR updated_at = ?7)
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(patch.topic_name.as_deref())
        .bind(patch.status)
        .bind(patch.hours_spent)
        .bind(Utc::now())
        .bind(course_id)
        .bind(topic_id)
        .bind(patch.expected_updated_at)
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::from_store)?;

        if let Some(topic) = updated {
            return Ok(topic);
        }

        match find_topic_by_id(&self.db, course_id, topic_id)
            .await
            .map_err(AppError::from_store)?
        {
            Some(_) => Err(AppError::Conflict(format!(
                "topic {} changed since it was read",
                topic_id
            ))),
            None => Err(AppError::NotFound),
        }
    }

    async fn delete_topic(&self, course_id: &str, topic_id: &str) -> Result<(), AppError> {
        let deleted = sqlx::query(
            "DELETE FROM topics WHERE course_id = ?1 AND (id = ?2 OR parent_topic_id = ?2)"
        )
        .bind(course_id)
        .bind(topic_id)
        .execute(&self.db)
        .await
        .map_err(AppError::from_store)?
        .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn last_activity(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let topics = self.list_topics(course_id).await?;
        Ok(topics.iter().map(|t| t.updated_at).max())
    }
}
