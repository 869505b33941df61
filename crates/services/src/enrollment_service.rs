use std::sync::Arc;

use course_core::model::{CourseId, CourseProgress, Enrollment, LessonOrder, UserId};
use course_core::time::Clock;
use storage::repository::{CourseRepository, DeckCatalog, ProgressRepository, StorageError};
use tracing::info;

use crate::error::EnrollmentError;
use crate::materialize::{DeckCache, materialize_lesson};
use crate::progress_locks::ProgressLocks;

/// Creates the initial progress tree when a user joins a course.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    catalog: Arc<dyn DeckCatalog>,
    progress: Arc<dyn ProgressRepository>,
    locks: ProgressLocks,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        catalog: Arc<dyn DeckCatalog>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            catalog,
            progress,
            locks: ProgressLocks::new(),
        }
    }

    /// Share progress locks with the other services.
    #[must_use]
    pub fn with_locks(mut self, locks: ProgressLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Enroll `user_id` in `course_id`.
    ///
    /// Every lesson is materialized from the current contents of the decks it
    /// references, and the first lesson becomes the current one. Nothing is
    /// stored unless every lesson and deck resolves.
    ///
    /// # Errors
    ///
    /// - `EnrollmentError::NoLessons` if the course has no lessons.
    /// - `EnrollmentError::NoDecksReferenced` for the first lesson without deck references.
    /// - `EnrollmentError::AlreadyEnrolled` if progress already exists.
    /// - `EnrollmentError::Storage` if a lookup or the final write fails.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        let _guard = self.locks.lock(user_id, course_id).await;

        let lessons = self
            .courses
            .list_lessons(course_id, LessonOrder::Ascending)
            .await?;
        let Some(first) = lessons.first() else {
            return Err(EnrollmentError::NoLessons);
        };

        let mut state = CourseProgress::new();
        let mut decks = DeckCache::new(self.catalog.as_ref());
        for lesson in &lessons {
            let progress = materialize_lesson(lesson, &mut decks).await?;
            state.lessons.insert(lesson.id.key(), progress);
        }
        state.current_lesson_id = Some(first.id);

        let enrollment = Enrollment::new(user_id, course_id, state, self.clock.now());
        match self.progress.create_progress(&enrollment).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => return Err(EnrollmentError::AlreadyEnrolled),
            Err(err) => return Err(err.into()),
        }

        info!(
            %user_id,
            %course_id,
            lessons = lessons.len(),
            "user enrolled"
        );
        Ok(enrollment)
    }
}
