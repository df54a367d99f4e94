mod common;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{COURSE_ID, course_record, fixed_now, sub_topic, topic};
use studytrack::error::AppError;
use studytrack::models::TopicStatus::{Completed, InProgress, NotStarted};
use studytrack::models::{CourseRecord, Topic, TopicPatch};
use studytrack::services::OptimisticCoordinator;
use studytrack::store::{InMemoryStore, TopicStore};
use tokio::sync::Semaphore;

/// Wraps the in-memory store with per-topic failures and an optional gate
/// that holds every update until the test releases a permit.
struct ScriptedStore {
    inner: InMemoryStore,
    failures: Mutex<HashMap<String, VecDeque<AppError>>>,
    gate: Option<Arc<Semaphore>>,
    updates: AtomicUsize,
}

impl ScriptedStore {
    fn new(topics: Vec<Topic>) -> Self {
        Self {
            inner: InMemoryStore::with_data(vec![course_record(COURSE_ID, fixed_now())], topics),
            failures: Mutex::new(HashMap::new()),
            gate: None,
            updates: AtomicUsize::new(0),
        }
    }

    fn gated(topics: Vec<Topic>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let store = Self {
            gate: Some(gate.clone()),
            ..Self::new(topics)
        };
        (store, gate)
    }

    fn fail_next(&self, topic_id: &str, err: AppError) {
        self.failures
            .lock()
            .unwrap()
            .entry(topic_id.to_string())
            .or_default()
            .push_back(err);
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicStore for ScriptedStore {
    async fn list_courses(&self) -> Result<Vec<CourseRecord>, AppError> {
        self.inner.list_courses().await
    }

    async fn list_topics(&self, course_id: &str) -> Result<Vec<Topic>, AppError> {
        self.inner.list_topics(course_id).await
    }

    async fn update_topic(
        &self,
        course_id: &str,
        topic_id: &str,
        patch: &TopicPatch,
    ) -> Result<Topic, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(topic_id)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.update_topic(course_id, topic_id, patch).await
    }

    async fn delete_topic(&self, course_id: &str, topic_id: &str) -> Result<(), AppError> {
        self.inner.delete_topic(course_id, topic_id).await
    }

    async fn last_activity(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        self.inner.last_activity(course_id).await
    }
}

fn sample_topics() -> Vec<Topic> {
    let mut first = topic("t1", NotStarted);
    first.hours_spent = 1.0;
    vec![
        first,
        topic("t2", InProgress),
        sub_topic("t3", "t1", Completed),
    ]
}

async fn wait_for_updates(store: &ScriptedStore, expected: usize) {
    for _ in 0..200 {
        if store.updates() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} updates, saw {}", expected, store.updates());
}

fn find<'a>(topics: &'a [Topic], id: &str) -> &'a Topic {
    topics.iter().find(|t| t.id == id).expect("topic present")
}

#[tokio::test]
async fn toggle_commits_server_result() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());

    let updated = coordinator.toggle_status(COURSE_ID, "t1").await.unwrap();

    assert_eq!(updated.status, InProgress);
    assert!(updated.updated_at > fixed_now());

    let local = coordinator.topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&local, "t1"), &updated);

    let stored = store.list_topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&stored, "t1"), &updated);
}

#[tokio::test]
async fn toggle_walks_the_three_step_cycle() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store);

    let seen = [
        coordinator.toggle_status(COURSE_ID, "t1").await.unwrap().status,
        coordinator.toggle_status(COURSE_ID, "t1").await.unwrap().status,
        coordinator.toggle_status(COURSE_ID, "t1").await.unwrap().status,
    ];

    assert_eq!(seen, [InProgress, Completed, NotStarted]);
}

#[tokio::test]
async fn summary_follows_committed_changes() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store);

    assert_eq!(coordinator.summary(COURSE_ID).await.unwrap().rounded_progress(), 33);

    coordinator
        .apply_optimistic(COURSE_ID, "t2", TopicPatch::status(Completed))
        .await
        .unwrap();

    let summary = coordinator.summary(COURSE_ID).await.unwrap();
    assert_eq!(summary.rounded_progress(), 67);
    assert_eq!(summary.completed_topics, 2);
    assert_eq!(summary.in_progress_topics, 0);
}

#[tokio::test]
async fn failed_write_restores_exact_pre_image() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());
    let before = coordinator.topics(COURSE_ID).await.unwrap();

    store.fail_next("t1", AppError::Transport("connection reset".to_string()));
    let patch = TopicPatch {
        topic_name: Some("Renamed".to_string()),
        status: Some(Completed),
        hours_spent: Some(9.0),
        expected_updated_at: None,
    };
    let err = coordinator
        .apply_optimistic(COURSE_ID, "t1", patch)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Transport(_)));
    assert_eq!(coordinator.topics(COURSE_ID).await.unwrap(), before);
}

#[tokio::test]
async fn conflict_kind_survives_rollback() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());
    let before = coordinator.topics(COURSE_ID).await.unwrap();

    store.fail_next("t2", AppError::Conflict("stale".to_string()));
    let err = coordinator.toggle_status(COURSE_ID, "t2").await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.user_message().contains("saved elsewhere"));
    assert_eq!(coordinator.topics(COURSE_ID).await.unwrap(), before);
}

#[tokio::test]
async fn stale_local_copy_is_rejected_as_conflict() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());
    let before = coordinator.topics(COURSE_ID).await.unwrap();

    // Another device edits the topic behind the coordinator's back.
    store
        .update_topic(COURSE_ID, "t1", &TopicPatch::hours(4.0))
        .await
        .unwrap();

    let err = coordinator
        .apply_optimistic(COURSE_ID, "t1", TopicPatch::status(Completed))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(coordinator.topics(COURSE_ID).await.unwrap(), before);

    // A manual retry after reloading starts from the fresh state.
    coordinator.load_course(COURSE_ID).await.unwrap();
    let retried = coordinator
        .apply_optimistic(COURSE_ID, "t1", TopicPatch::status(Completed))
        .await
        .unwrap();
    assert_eq!(retried.status, Completed);
    assert_eq!(retried.hours_spent, 4.0);
}

#[tokio::test]
async fn optimistic_value_is_visible_while_write_is_in_flight() {
    let (store, gate) = ScriptedStore::gated(sample_topics());
    let store = Arc::new(store);
    let coordinator = Arc::new(OptimisticCoordinator::new(store.clone()));

    let task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    wait_for_updates(&store, 1).await;

    let local = coordinator.topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&local, "t1").status, InProgress);
    let stored = store.list_topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&stored, "t1").status, NotStarted);

    gate.add_permits(1);
    let committed = task.await.unwrap().unwrap();
    assert_eq!(committed.status, InProgress);
}

#[tokio::test]
async fn mutations_on_one_topic_are_serialized() {
    let (store, gate) = ScriptedStore::gated(sample_topics());
    let store = Arc::new(store);
    let coordinator = Arc::new(OptimisticCoordinator::new(store.clone()));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    wait_for_updates(&store, 1).await;

    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.updates(), 1, "second toggle must wait for the first");

    gate.add_permits(2);
    assert_eq!(first.await.unwrap().unwrap().status, InProgress);
    assert_eq!(second.await.unwrap().unwrap().status, Completed);

    let stored = store.list_topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&stored, "t1").status, Completed);
}

#[tokio::test]
async fn different_topics_proceed_concurrently() {
    let (store, gate) = ScriptedStore::gated(sample_topics());
    let store = Arc::new(store);
    let coordinator = Arc::new(OptimisticCoordinator::new(store.clone()));

    let a = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    let b = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t2").await })
    };

    wait_for_updates(&store, 2).await;
    gate.add_permits(2);

    assert_eq!(a.await.unwrap().unwrap().status, InProgress);
    assert_eq!(b.await.unwrap().unwrap().status, Completed);
}

#[tokio::test]
async fn failure_on_one_topic_keeps_concurrent_success_on_another() {
    let (store, gate) = ScriptedStore::gated(sample_topics());
    let store = Arc::new(store);
    let coordinator = Arc::new(OptimisticCoordinator::new(store.clone()));
    let before = coordinator.topics(COURSE_ID).await.unwrap();

    store.fail_next("t1", AppError::Transport("timeout".to_string()));

    let failing = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .apply_optimistic(COURSE_ID, "t1", TopicPatch::hours(3.0))
                .await
        })
    };
    wait_for_updates(&store, 1).await;
    let succeeding = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t2").await })
    };
    wait_for_updates(&store, 2).await;

    gate.add_permits(2);
    assert!(matches!(failing.await.unwrap(), Err(AppError::Transport(_))));
    let committed = succeeding.await.unwrap().unwrap();

    let local = coordinator.topics(COURSE_ID).await.unwrap();
    assert_eq!(find(&local, "t1"), find(&before, "t1"));
    assert_eq!(find(&local, "t2"), &committed);
    assert_eq!(find(&local, "t3"), find(&before, "t3"));
}

#[tokio::test]
async fn invalid_hours_never_reach_the_store() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());

    let err = coordinator
        .apply_optimistic(COURSE_ID, "t1", TopicPatch::hours(-1.0))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.updates(), 0);
}

#[tokio::test]
async fn unknown_topic_is_not_found() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store);

    let err = coordinator.toggle_status(COURSE_ID, "ghost").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn study_session_adds_pomodoro_hours() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store);

    let updated = coordinator.log_study_time(COURSE_ID, "t1", 25).await.unwrap();
    assert_eq!(updated.hours_spent, 1.42);

    let summary = coordinator.summary(COURSE_ID).await.unwrap();
    assert_eq!(summary.total_hours, 1.42);
}

#[tokio::test]
async fn deleting_main_topic_drops_its_sub_topics() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    let coordinator = OptimisticCoordinator::new(store.clone());

    coordinator.delete_topic(COURSE_ID, "t1").await.unwrap();

    let local: Vec<String> = coordinator
        .topics(COURSE_ID)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(local, vec!["t2"]);
    assert_eq!(store.list_topics(COURSE_ID).await.unwrap().len(), 1);
}

#[tokio::test]
async fn corrupted_hierarchy_halts_loading() {
    let topics = vec![
        topic("t1", NotStarted),
        sub_topic("t2", "t1", NotStarted),
        sub_topic("t3", "t2", NotStarted),
    ];
    let store = Arc::new(ScriptedStore::new(topics));
    let coordinator = OptimisticCoordinator::new(store);

    let err = coordinator.load_course(COURSE_ID).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(matches!(
        coordinator.summary(COURSE_ID).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn requests_for_unknown_topics_leave_no_state_behind() {
    let coordinator = OptimisticCoordinator::new(Arc::new(InMemoryStore::new()));

    for i in 0..1000 {
        let course = format!("missing-course-{i}");
        let err = coordinator
            .toggle_status(&course, &format!("missing-topic-{i}"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    assert_eq!(coordinator.tracked_locks(), 0);
    assert_eq!(coordinator.cached_courses(), 0);
}

#[tokio::test]
async fn topic_locks_are_released_after_each_mutation() {
    let store = Arc::new(ScriptedStore::new(sample_topics()));
    store.fail_next("t2", AppError::Transport("offline".to_string()));
    let coordinator = OptimisticCoordinator::new(store);

    coordinator.toggle_status(COURSE_ID, "t1").await.unwrap();
    coordinator.toggle_status(COURSE_ID, "t2").await.unwrap_err();
    coordinator.log_study_time(COURSE_ID, "t3", 25).await.unwrap();
    assert_eq!(coordinator.tracked_locks(), 0);

    coordinator.delete_topic(COURSE_ID, "t1").await.unwrap();
    assert_eq!(coordinator.tracked_locks(), 0);
}

#[tokio::test]
async fn queued_mutations_share_one_lock_until_drained() {
    let (store, gate) = ScriptedStore::gated(sample_topics());
    let store = Arc::new(store);
    let coordinator = Arc::new(OptimisticCoordinator::new(store.clone()));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    wait_for_updates(&store, 1).await;
    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.toggle_status(COURSE_ID, "t1").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.tracked_locks(), 1);

    gate.add_permits(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(coordinator.tracked_locks(), 0);
}
