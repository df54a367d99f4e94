use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::engine::{
    Classification, CourseSummary, DashboardStats, POMODORO_MINUTES, TopicNode, TopicTree,
    filter_acknowledged,
};
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

#[derive(Deserialize)]
struct CourseQueryParams {
    #[serde(default)]
    search: Option<String>,
}

#[derive(Deserialize)]
struct StudySessionRequest {
    #[serde(default)]
    minutes: Option<u32>,
}

#[derive(Serialize)]
struct CourseDetail {
    #[serde(flatten)]
    course: Course,
    in_progress_topics: usize,
    classification: Classification,
}

#[derive(Serialize)]
struct TopicUpdateResponse {
    topic: Topic,
    course: CourseSummary,
}

#[derive(Serialize)]
struct AcknowledgeResponse {
    acknowledged: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", get(get_course).delete(delete_course))
        .route("/courses/{id}/topics", get(list_topics).post(create_topic))
        .route(
            "/courses/{id}/topics/{topic_id}",
            axum::routing::patch(update_topic).delete(delete_topic),
        )
        .route("/courses/{id}/topics/{topic_id}/toggle", post(toggle_topic))
        .route("/courses/{id}/topics/{topic_id}/sessions", post(log_session))
        .route("/dashboard", get(dashboard))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read", post(mark_all_read))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(
    State(state): State<AppState>,
    Query(params): Query<CourseQueryParams>,
) -> Result<Json<Vec<Course>>, AppError> {
    let mut courses = state.overview.courses(Utc::now()).await?;
    if let Some(search) = params.search {
        courses.retain(|c| c.matches(&search));
    }
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let record = repository::insert_course(&state.db, req).await?;
    let course = state.overview.course(&record.id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseDetail>, AppError> {
    let (course, summary, classification) = state.overview.course_detail(&id, Utc::now()).await?;
    Ok(Json(CourseDetail {
        course,
        in_progress_topics: summary.in_progress_topics,
        classification,
    }))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::delete_course(&state.db, &id).await?;
    state.coordinator.invalidate(&id)?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn list_topics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TopicNode>>, AppError> {
    if repository::find_course_by_id(&state.db, &id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let topics = state.coordinator.load_course(&id).await?;
    let outline = TopicTree::build(&topics)?.outline();
    Ok(Json(outline))
}

async fn create_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewTopicRequest>,
) -> Result<(StatusCode, Json<Topic>), AppError> {
    let topic = repository::insert_topic(&state.db, &id, req).await?;
    state.coordinator.invalidate(&id)?;
    Ok((StatusCode::CREATED, Json(topic)))
}

async fn update_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(patch): Json<TopicPatch>,
) -> Result<Json<TopicUpdateResponse>, AppError> {
    let topic = state.coordinator.apply_optimistic(&id, &topic_id, patch).await?;
    respond_with_summary(&state, &id, topic).await
}

async fn toggle_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<Json<TopicUpdateResponse>, AppError> {
    let topic = state.coordinator.toggle_status(&id, &topic_id).await?;
    respond_with_summary(&state, &id, topic).await
}

async fn log_session(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(req): Json<StudySessionRequest>,
) -> Result<Json<TopicUpdateResponse>, AppError> {
    let minutes = req.minutes.unwrap_or(POMODORO_MINUTES);
    let topic = state.coordinator.log_study_time(&id, &topic_id, minutes).await?;
    respond_with_summary(&state, &id, topic).await
}

async fn delete_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.coordinator.delete_topic(&id, &topic_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.overview.dashboard(Utc::now()).await?;
    Ok(Json(stats))
}

async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state.overview.notifications(Utc::now()).await?;
    let acknowledged = repository::fetch_acknowledged(&state.db).await?;
    Ok(Json(filter_acknowledged(&notifications, &acknowledged)))
}

async fn mark_all_read(
    State(state): State<AppState>,
) -> Result<Json<AcknowledgeResponse>, AppError> {
    let ids: Vec<String> = state
        .overview
        .notifications(Utc::now())
        .await?
        .into_iter()
        .map(|n| n.id)
        .collect();
    let acknowledged = repository::acknowledge_notifications(&state.db, &ids).await?;
    Ok(Json(AcknowledgeResponse { acknowledged }))
}

async fn respond_with_summary(
    state: &AppState,
    course_id: &str,
    topic: Topic,
) -> Result<Json<TopicUpdateResponse>, AppError> {
    let course = state.coordinator.summary(course_id).await?;
    Ok(Json(TopicUpdateResponse { topic, course }))
}
