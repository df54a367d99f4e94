pub mod course;
pub mod notification;
pub mod topic;

pub use course::{Course, CourseRecord, NewCourseRequest};
pub use notification::{Notification, NotificationKind};
pub use topic::{NewTopicRequest, Topic, TopicPatch, TopicStatus};
