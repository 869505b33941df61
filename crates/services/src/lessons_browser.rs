use std::sync::Arc;

use serde::Serialize;

use course_core::model::{CourseId, Lesson, LessonOrder, UserId};
use storage::repository::CourseRepository;

use crate::error::BrowseError;
use crate::sync_service::SyncService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrowseOptions {
    /// Enrich lessons with this user's progress.
    pub user_id: Option<UserId>,
    /// Blank out lesson bodies.
    pub bodyless: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonWithProgress {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub is_completed: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BrowseResult {
    Public(Vec<Lesson>),
    WithProgress(Vec<LessonWithProgress>),
}

/// Lists a course's lessons, optionally enriched with a user's progress.
#[derive(Clone)]
pub struct LessonsBrowser {
    courses: Arc<dyn CourseRepository>,
    sync: Arc<SyncService>,
}

impl LessonsBrowser {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, sync: Arc<SyncService>) -> Self {
        Self { courses, sync }
    }

    /// Lessons of `course_id` in course order.
    ///
    /// With a user the tree is synced first, so completion and the current
    /// lesson reflect live content.
    ///
    /// # Errors
    ///
    /// Returns `BrowseError::Sync` if the user's progress cannot be synced
    /// (including when the user is not enrolled) and `BrowseError::Storage`
    /// if lessons cannot be listed.
    pub async fn browse(
        &self,
        course_id: CourseId,
        options: BrowseOptions,
    ) -> Result<BrowseResult, BrowseError> {
        let Some(user_id) = options.user_id else {
            let mut lessons = self
                .courses
                .list_lessons(course_id, LessonOrder::Ascending)
                .await?;
            if options.bodyless {
                lessons.iter_mut().for_each(strip_body);
            }
            return Ok(BrowseResult::Public(lessons));
        };

        let (enrollment, lessons) = self.sync.sync_with_lessons(user_id, course_id).await?;
        let enriched = lessons
            .into_iter()
            .map(|mut lesson| {
                let key = lesson.id.key();
                let is_completed = enrollment.state.is_lesson_completed(&key);
                let is_current = enrollment.state.is_current(lesson.id);
                if options.bodyless {
                    strip_body(&mut lesson);
                }
                LessonWithProgress {
                    lesson,
                    is_completed,
                    is_current,
                }
            })
            .collect();
        Ok(BrowseResult::WithProgress(enriched))
    }
}

fn strip_body(lesson: &mut Lesson) {
    lesson.body.clear();
}
