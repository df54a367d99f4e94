use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::AppError;
use crate::models::Topic;

/// A course's topics split into main topics and sub-topics grouped by parent.
/// Both partitions keep the input order.
#[derive(Debug)]
pub struct TopicTree<'a> {
    main: Vec<&'a Topic>,
    children: HashMap<&'a str, Vec<&'a Topic>>,
    len: usize,
}

/// A main topic with its sub-topics, for nested display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicNode {
    #[serde(flatten)]
    pub topic: Topic,
    pub sub_topics: Vec<Topic>,
}

impl<'a> TopicTree<'a> {
    /// Fails with `Validation` on duplicate ids, unknown or cross-course
    /// parents, and sub-topics nested under another sub-topic.
    pub fn build(topics: &'a [Topic]) -> Result<Self, AppError> {
        let mut by_id: HashMap<&str, &Topic> = HashMap::with_capacity(topics.len());
        for topic in topics {
            if by_id.insert(topic.id.as_str(), topic).is_some() {
                return Err(AppError::Validation(format!("duplicate topic id {}", topic.id)));
            }
        }

        let mut main = Vec::new();
        let mut children: HashMap<&str, Vec<&Topic>> = HashMap::new();

        for topic in topics {
            let Some(parent_id) = topic.parent_topic_id.as_deref() else {
                main.push(topic);
                continue;
            };

            let parent = by_id.get(parent_id).copied().ok_or_else(|| {
                AppError::Validation(format!(
                    "topic {} references unknown parent {}",
                    topic.id, parent_id
                ))
            })?;

            if parent.course_id != topic.course_id {
                return Err(AppError::Validation(format!(
                    "topic {} has a parent in another course",
                    topic.id
                )));
            }
            if !parent.is_main() {
                return Err(AppError::Validation(format!(
                    "topic {} is nested under sub-topic {}",
                    topic.id, parent_id
                )));
            }

            children.entry(parent_id).or_default().push(topic);
        }

        Ok(Self {
            main,
            children,
            len: topics.len(),
        })
    }

    pub fn main_topics(&self) -> &[&'a Topic] {
        &self.main
    }

    /// Sub-topics of `topic_id` in input order. Empty for topics without
    /// children and for ids that are themselves sub-topics.
    pub fn children_of(&self, topic_id: &str) -> &[&'a Topic] {
        self.children
            .get(topic_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every topic in the course, main and sub alike.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn outline(&self) -> Vec<TopicNode> {
        self.main
            .iter()
            .map(|topic| TopicNode {
                topic: (*topic).clone(),
                sub_topics: self
                    .children_of(&topic.id)
                    .iter()
                    .map(|t| (*t).clone())
                    .collect(),
            })
            .collect()
    }
}

/// Checks that a new topic may be attached under `parent_id` in a course
/// whose current topics are `existing`.
pub fn validate_parent(existing: &[Topic], parent_id: &str) -> Result<(), AppError> {
    let parent = existing
        .iter()
        .find(|t| t.id == parent_id)
        .ok_or_else(|| AppError::Validation(format!("parent topic {} is not in this course", parent_id)))?;

    if !parent.is_main() {
        return Err(AppError::Validation(format!(
            "topic {} is a sub-topic and cannot have sub-topics",
            parent_id
        )));
    }
    Ok(())
}

/// Ids of `topic_id` and all of its sub-topics.
pub(crate) fn subtree_ids(topics: &[Topic], topic_id: &str) -> HashSet<String> {
    let mut ids: HashSet<String> = topics
        .iter()
        .filter(|t| t.parent_topic_id.as_deref() == Some(topic_id))
        .map(|t| t.id.clone())
        .collect();
    ids.insert(topic_id.to_string());
    ids
}
