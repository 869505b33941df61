use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ids::{CourseId, LessonId, UserId};
use crate::model::progress::CourseProgress;

/// A user's enrollment in a course together with their progress tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub current_lesson_id: Option<LessonId>,
    pub state: CourseProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Builds a new enrollment record around a freshly built tree.
    #[must_use]
    pub fn new(
        user_id: UserId,
        course_id: CourseId,
        state: CourseProgress,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            current_lesson_id: state.current_lesson_id,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy the tree's current lesson onto the record.
    pub fn sync_current_lesson(&mut self) {
        self.current_lesson_id = self.state.current_lesson_id;
    }
}
