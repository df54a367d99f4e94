use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::engine::hierarchy::subtree_ids;
use crate::engine::{CourseSummary, TopicTree, compute_course_summary, log_study_minutes};
use crate::error::AppError;
use crate::models::{Topic, TopicPatch};
use crate::store::TopicStore;

/// Local topic collection of one course. `generation` moves on every local
/// change so a failed write can tell whether its pre-image is still the
/// whole truth.
#[derive(Debug, Clone, Default)]
struct CourseTopics {
    topics: Vec<Topic>,
    generation: u64,
}

struct Pending {
    snapshot: Vec<Topic>,
    generation: u64,
    request: TopicPatch,
}

/// Applies topic updates locally before the store confirms them, then
/// commits the store's answer or restores the pre-image.
///
/// Mutations of the same topic run one after another; different topics and
/// courses proceed concurrently.
pub struct OptimisticCoordinator {
    store: Arc<dyn TopicStore>,
    courses: Mutex<HashMap<String, CourseTopics>>,
    topic_locks: Mutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl OptimisticCoordinator {
    pub fn new(store: Arc<dyn TopicStore>) -> Self {
        Self {
            store,
            courses: Mutex::new(HashMap::new()),
            topic_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the local collection with the store's current topics.
    pub async fn load_course(&self, course_id: &str) -> Result<Vec<Topic>, AppError> {
        let topics = self.store.list_topics(course_id).await?;
        TopicTree::build(&topics)?;

        let mut courses = self.courses()?;
        if topics.is_empty() {
            courses.remove(course_id);
            return Ok(topics);
        }
        let entry = courses.entry(course_id.to_string()).or_default();
        entry.topics = topics.clone();
        entry.generation += 1;
        Ok(topics)
    }

    /// Forgets the local collection; the next access reloads it.
    pub fn invalidate(&self, course_id: &str) -> Result<(), AppError> {
        self.courses()?.remove(course_id);
        self.locks()?
            .retain(|(course, _), lock| course != course_id || Arc::strong_count(lock) > 1);
        Ok(())
    }

    /// Current local view, optimistic changes included.
    pub async fn topics(&self, course_id: &str) -> Result<Vec<Topic>, AppError> {
        self.ensure_loaded(course_id).await?;
        Ok(self
            .courses()?
            .get(course_id)
            .map(|entry| entry.topics.clone())
            .unwrap_or_default())
    }

    /// Number of courses with a local collection.
    pub fn cached_courses(&self) -> usize {
        self.courses.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of per-topic locks currently held or awaited.
    pub fn tracked_locks(&self) -> usize {
        self.topic_locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Derived course fields, recomputed from the local view on every call.
    pub async fn summary(&self, course_id: &str) -> Result<CourseSummary, AppError> {
        let topics = self.topics(course_id).await?;
        compute_course_summary(&topics)
    }

    pub async fn apply_optimistic(
        &self,
        course_id: &str,
        topic_id: &str,
        patch: TopicPatch,
    ) -> Result<Topic, AppError> {
        validate_patch(&patch)?;
        self.mutate(course_id, topic_id, move |_| Ok(patch)).await
    }

    /// Advances the topic one step along not_started -> in_progress -> completed -> not_started.
    pub async fn toggle_status(&self, course_id: &str, topic_id: &str) -> Result<Topic, AppError> {
        self.mutate(course_id, topic_id, |topic| {
            Ok(TopicPatch::status(topic.status.next()))
        })
        .await
    }

    /// Adds a finished study session to the topic's hours.
    pub async fn log_study_time(
        &self,
        course_id: &str,
        topic_id: &str,
        minutes: u32,
    ) -> Result<Topic, AppError> {
        if minutes == 0 {
            return Err(AppError::BadRequest("a study session must last at least a minute".to_string()));
        }
        self.mutate(course_id, topic_id, move |topic| {
            Ok(TopicPatch::hours(log_study_minutes(topic.hours_spent, minutes)))
        })
        .await
    }

    /// Deletes the topic and its sub-topics once the store confirms.
    pub async fn delete_topic(&self, course_id: &str, topic_id: &str) -> Result<(), AppError> {
        let lock = self.topic_lock(course_id, topic_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.delete_confirmed(course_id, topic_id).await
        };
        self.release_lock(course_id, topic_id, lock);
        result
    }

    async fn delete_confirmed(&self, course_id: &str, topic_id: &str) -> Result<(), AppError> {
        self.store.delete_topic(course_id, topic_id).await?;
        info!("Deleted topic {} from course {}", topic_id, course_id);

        let mut doomed = vec![topic_id.to_string()];
        {
            let mut courses = self.courses()?;
            if let Some(entry) = courses.get_mut(course_id) {
                doomed = subtree_ids(&entry.topics, topic_id).into_iter().collect();
                entry.topics.retain(|t| !doomed.contains(&t.id));
                entry.generation += 1;
                if entry.topics.is_empty() {
                    courses.remove(course_id);
                }
            }
        }

        // Sub-topics are gone too; drop their idle locks.
        self.locks()?.retain(|(course, topic), lock| {
            course != course_id || !doomed.contains(topic) || Arc::strong_count(lock) > 1
        });
        Ok(())
    }

    async fn mutate<F>(&self, course_id: &str, topic_id: &str, build: F) -> Result<Topic, AppError>
    where
        F: FnOnce(&Topic) -> Result<TopicPatch, AppError> + Send,
    {
        let lock = self.topic_lock(course_id, topic_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.mutate_locked(course_id, topic_id, build).await
        };
        self.release_lock(course_id, topic_id, lock);
        result
    }

    async fn mutate_locked<F>(
        &self,
        course_id: &str,
        topic_id: &str,
        build: F,
    ) -> Result<Topic, AppError>
    where
        F: FnOnce(&Topic) -> Result<TopicPatch, AppError> + Send,
    {
        self.ensure_loaded(course_id).await?;
        let pending = self.apply_local(course_id, topic_id, build)?;
        debug!("Applied optimistic update to topic {}: {:?}", topic_id, pending.request);

        match self.store.update_topic(course_id, topic_id, &pending.request).await {
            Ok(topic) => {
                self.commit(course_id, &topic)?;
                Ok(topic)
            }
            Err(err) => {
                self.rollback(course_id, topic_id, pending);
                warn!("Update of topic {} failed, rolled back: {}", topic_id, err);
                Err(err)
            }
        }
    }

    async fn ensure_loaded(&self, course_id: &str) -> Result<(), AppError> {
        let loaded = self.courses()?.contains_key(course_id);
        if loaded {
            return Ok(());
        }

        let topics = self.store.list_topics(course_id).await?;
        TopicTree::build(&topics)?;
        if topics.is_empty() {
            return Ok(());
        }

        self.courses()?
            .entry(course_id.to_string())
            .or_insert(CourseTopics { topics, generation: 0 });
        Ok(())
    }

    fn apply_local<F>(&self, course_id: &str, topic_id: &str, build: F) -> Result<Pending, AppError>
    where
        F: FnOnce(&Topic) -> Result<TopicPatch, AppError>,
    {
        let mut courses = self.courses()?;
        let entry = courses.get_mut(course_id).ok_or(AppError::NotFound)?;
        let current = entry
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .ok_or(AppError::NotFound)?;

        let mut request = build(current)?;
        if request.is_empty() {
            return Err(AppError::BadRequest("nothing to update".to_string()));
        }
        if request.expected_updated_at.is_none() {
            request.expected_updated_at = Some(current.updated_at);
        }

        let snapshot = entry.topics.clone();
        if let Some(topic) = entry.topics.iter_mut().find(|t| t.id == topic_id) {
            topic.apply(&request);
        }
        entry.generation += 1;

        Ok(Pending {
            snapshot,
            generation: entry.generation,
            request,
        })
    }

    /// The store's topic replaces the optimistic one field for field.
    fn commit(&self, course_id: &str, topic: &Topic) -> Result<(), AppError> {
        let mut courses = self.courses()?;
        let Some(entry) = courses.get_mut(course_id) else {
            return Ok(());
        };

        if let Some(local) = entry.topics.iter_mut().find(|t| t.id == topic.id) {
            *local = topic.clone();
        }
        entry.generation += 1;

        match compute_course_summary(&entry.topics) {
            Ok(summary) => info!(
                "Committed topic {} in course {} (progress {}%, {} of {} completed)",
                topic.id,
                course_id,
                summary.rounded_progress(),
                summary.completed_topics,
                summary.topic_count
            ),
            Err(e) => warn!("Course {} hierarchy invalid after commit: {}", course_id, e),
        }
        Ok(())
    }

    fn rollback(&self, course_id: &str, topic_id: &str, pending: Pending) {
        let Ok(mut courses) = self.courses.lock() else {
            error!("Topic state lock poisoned, cannot roll back topic {}", topic_id);
            return;
        };
        let Some(entry) = courses.get_mut(course_id) else {
            return;
        };

        if entry.generation == pending.generation {
            entry.topics = pending.snapshot;
        } else if let Some(original) = pending.snapshot.into_iter().find(|t| t.id == topic_id) {
            // Other topics moved on meanwhile; only this topic goes back.
            if let Some(local) = entry.topics.iter_mut().find(|t| t.id == topic_id) {
                *local = original;
            }
        }
        entry.generation += 1;
    }

    fn topic_lock(&self, course_id: &str, topic_id: &str) -> Result<Arc<AsyncMutex<()>>, AppError> {
        Ok(self
            .locks()?
            .entry((course_id.to_string(), topic_id.to_string()))
            .or_default()
            .clone())
    }

    /// Drops the map entry once the last waiter is done with it. The map
    /// holds one reference and `lock` another; anything above that is a
    /// mutation still queued on this topic.
    fn release_lock(&self, course_id: &str, topic_id: &str, lock: Arc<AsyncMutex<()>>) {
        let Ok(mut locks) = self.topic_locks.lock() else {
            error!("Topic lock table poisoned, keeping lock for topic {}", topic_id);
            return;
        };
        let key = (course_id.to_string(), topic_id.to_string());
        let idle = locks
            .get(&key)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
        if idle {
            locks.remove(&key);
        }
    }

    fn locks(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<(String, String), Arc<AsyncMutex<()>>>>, AppError> {
        self.topic_locks.lock().map_err(|_| AppError::InternalServerError)
    }

    fn courses(&self) -> Result<MutexGuard<'_, HashMap<String, CourseTopics>>, AppError> {
        self.courses.lock().map_err(|_| AppError::InternalServerError)
    }
}

fn validate_patch(patch: &TopicPatch) -> Result<(), AppError> {
    if let Some(hours) = patch.hours_spent {
        if !hours.is_finite() || hours < 0.0 {
            return Err(AppError::Validation("hours spent must be a non-negative number".to_string()));
        }
    }
    if let Some(name) = &patch.topic_name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("topic name is required".to_string()));
        }
    }
    Ok(())
}
