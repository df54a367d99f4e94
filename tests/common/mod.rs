#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;
use studytrack::models::{Course, CourseRecord, Topic, TopicStatus};

pub const COURSE_ID: &str = "c1";

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

pub fn topic(id: &str, status: TopicStatus) -> Topic {
    Topic {
        id: id.to_string(),
        course_id: COURSE_ID.to_string(),
        topic_name: format!("Topic {}", id),
        status,
        hours_spent: 0.0,
        parent_topic_id: None,
        updated_at: fixed_now() - Duration::days(1),
    }
}

pub fn sub_topic(id: &str, parent: &str, status: TopicStatus) -> Topic {
    Topic {
        parent_topic_id: Some(parent.to_string()),
        ..topic(id, status)
    }
}

pub fn course_record(id: &str, exam_date: DateTime<Utc>) -> CourseRecord {
    CourseRecord {
        id: id.to_string(),
        course_name: format!("Course {}", id),
        course_code: "CS101".to_string(),
        exam_date,
    }
}

pub fn course(id: &str, exam_in: Duration, progress: f64, is_neglected: bool) -> Course {
    Course {
        id: id.to_string(),
        course_name: "Algorithms".to_string(),
        course_code: "CS201".to_string(),
        exam_date: fixed_now() + exam_in,
        progress,
        total_hours: 0.0,
        topic_count: 4,
        completed_topics: 0,
        is_neglected,
    }
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Database file shared by several pooled connections, opened the way the
/// server opens it. Remove it with [`remove_database`].
pub async fn file_pool(max_connections: u32) -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("studytrack-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    let pool = studytrack::db::connect(&url, max_connections)
        .await
        .expect("Failed to open database file");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, path)
}

pub async fn remove_database(pool: SqlitePool, path: PathBuf) {
    pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}
