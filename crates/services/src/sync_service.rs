use std::sync::Arc;

use tracing::{debug, info, warn};

use course_core::model::{CourseId, Enrollment, Lesson, LessonId, LessonOrder, UserId};
use course_core::time::Clock;
use storage::repository::{CourseRepository, DeckCatalog, ProgressRepository, StorageError};

use crate::error::SyncError;
use crate::materialize::{DeckCache, materialize_lesson};
use crate::progress_locks::ProgressLocks;

/// Reconciles a user's progress tree with the course's current content.
#[derive(Clone)]
pub struct SyncService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    catalog: Arc<dyn DeckCatalog>,
    progress: Arc<dyn ProgressRepository>,
    locks: ProgressLocks,
}

impl SyncService {
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

    /// Bring the tree of `user_id` in `course_id` in line with live content.
    ///
    /// New lessons are materialized, new decks and cards are tracked and
    /// reopen their parents, and anything no longer referenced is pruned.
    /// Progress on surviving entries is untouched. Afterwards the current
    /// lesson is the first incomplete one in course order, or the last one.
    ///
    /// # Errors
    ///
    /// - `SyncError::ProgressNotInitialized` if the user is not enrolled.
    /// - `SyncError::NoDecksReferenced` if a newly added lesson has no decks.
    /// - `SyncError::Storage` on any lookup or write failure.
    ///
    /// Nothing is saved when an error is returned.
    pub async fn sync(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, SyncError> {
        self.sync_with_lessons(user_id, course_id)
            .await
            .map(|(enrollment, _)| enrollment)
    }

    /// Sync and also hand back the ordered lessons the tree was reconciled with.
    pub(crate) async fn sync_with_lessons(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(Enrollment, Vec<Lesson>), SyncError> {
        let _guard = self.locks.lock(user_id, course_id).await;

        let mut enrollment = match self.progress.get_progress(user_id, course_id).await {
            Ok(enrollment) => enrollment,
            Err(StorageError::NotFound) => return Err(SyncError::ProgressNotInitialized),
            Err(err) => return Err(err.into()),
        };
        let lessons = self
            .courses
            .list_lessons(course_id, LessonOrder::Ascending)
            .await?;

        let now = self.clock.now();
        let mut decks = DeckCache::new(self.catalog.as_ref());
        let state = &mut enrollment.state;

        for lesson in &lessons {
            let lesson_key = lesson.id.key();
            let Some(lesson_progress) = state.lessons.get_mut(&lesson_key) else {
                let progress = materialize_lesson(lesson, &mut decks).await?;
                debug!(lesson_id = %lesson.id, decks = progress.decks.len(), "lesson added");
                state.lessons.insert(lesson_key, progress);
                continue;
            };

            let references = lesson.deck_references();
            if references.is_empty() {
                warn!(
                    %user_id,
                    %course_id,
                    lesson_id = %lesson.id,
                    "lesson no longer references any deck"
                );
            }

            let deck_keys: Vec<String> = references.iter().map(|id| id.key()).collect();
            let deck_diff = lesson_progress.reconcile_decks(&deck_keys);

            let mut cards_added = 0;
            let mut cards_removed = 0;
            for deck_id in references {
                let deck = decks.get(deck_id).await?;
                let card_diff =
                    lesson_progress.reconcile_cards(&lesson_key, &deck_id.key(), &deck.card_keys())?;
                cards_added += card_diff.missing.len();
                cards_removed += card_diff.extra.len();
            }

            debug!(
                lesson_id = %lesson.id,
                decks_added = deck_diff.missing.len(),
                decks_removed = deck_diff.extra.len(),
                cards_added,
                cards_removed,
                "lesson reconciled"
            );
        }

        let live: Vec<String> = lessons.iter().map(|lesson| lesson.id.key()).collect();
        let lesson_diff = state.retain_lessons(&live);
        let promoted = state.roll_up(now);

        let ordered: Vec<LessonId> = lessons.iter().map(|lesson| lesson.id).collect();
        state.recompute_current_lesson(&ordered);
        enrollment.sync_current_lesson();
        enrollment.updated_at = now;

        self.progress.save_progress(&enrollment).await?;

        info!(
            %user_id,
            %course_id,
            lessons_removed = lesson_diff.extra.len(),
            promoted,
            current_lesson = ?enrollment.current_lesson_id,
            "progress synced"
        );
        Ok((enrollment, lessons))
    }
}
