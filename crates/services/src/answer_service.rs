use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use course_core::model::{
    AnswerId, CardId, CourseId, DeckId, LessonId, ProgressError, UserId, correct_answers_by_card,
};
use course_core::time::Clock;
use storage::repository::{DeckCatalog, ProgressRepository, StorageError};

use crate::error::AnswerError;
use crate::progress_locks::ProgressLocks;

/// One submitted answer: the chosen answer for a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAnswer {
    pub card_id: CardId,
    pub answer_id: AnswerId,
}

impl CardAnswer {
    #[must_use]
    pub fn new(card_id: CardId, answer_id: AnswerId) -> Self {
        Self { card_id, answer_id }
    }
}

/// Feedback for a single submitted answer, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardAnswerResult {
    pub card_id: CardId,
    pub correct: bool,
    pub card_completed: bool,
}

/// State of the answered deck and lesson after a batch is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub lesson_completed: bool,
    pub deck_completed: bool,
    pub results: Vec<CardAnswerResult>,
}

/// Records answer submissions against a user's progress tree.
#[derive(Clone)]
pub struct AnswerService {
    clock: Clock,
    catalog: Arc<dyn DeckCatalog>,
    progress: Arc<dyn ProgressRepository>,
    locks: ProgressLocks,
}

impl AnswerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn DeckCatalog>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
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

    /// Record a batch of answers for cards of one deck within one lesson.
    ///
    /// Correctness comes from the catalog's current answer keys; an answer ID
    /// that is not a correct answer of its card counts as incorrect. Answers
    /// are applied in order, so repeated submissions for one card all count.
    ///
    /// # Errors
    ///
    /// - `AnswerError::ProgressNotInitialized` if the user is not enrolled.
    /// - `AnswerError::Progress` if the lesson, deck or a card is not tracked.
    ///   Nothing is saved in that case.
    /// - `AnswerError::Storage` if the card lookup or the final write fails.
    pub async fn answer(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
        deck_id: DeckId,
        answers: &[CardAnswer],
    ) -> Result<AnswerOutcome, AnswerError> {
        let _guard = self.locks.lock(user_id, course_id).await;

        let mut enrollment = match self.progress.get_progress(user_id, course_id).await {
            Ok(enrollment) => enrollment,
            Err(StorageError::NotFound) => return Err(AnswerError::ProgressNotInitialized),
            Err(err) => return Err(err.into()),
        };

        let lesson_key = lesson_id.key();
        let deck_key = deck_id.key();
        if enrollment.state.lesson(&lesson_key).is_none() {
            return Err(ProgressError::LessonNotFound {
                lesson_id: lesson_key,
            }
            .into());
        }
        if enrollment.state.deck(&lesson_key, &deck_key).is_none() {
            return Err(ProgressError::DeckNotFound {
                lesson_id: lesson_key,
                deck_id: deck_key,
            }
            .into());
        }

        let mut outcome = AnswerOutcome {
            lesson_completed: enrollment.state.is_lesson_completed(&lesson_key),
            deck_completed: enrollment.state.is_deck_completed(&lesson_key, &deck_key),
            results: Vec::with_capacity(answers.len()),
        };
        if answers.is_empty() {
            return Ok(outcome);
        }

        let mut seen = HashSet::with_capacity(answers.len());
        let card_ids: Vec<CardId> = answers
            .iter()
            .map(|answer| answer.card_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let cards = self.catalog.get_cards(&card_ids).await?;
        let correct_by_card = correct_answers_by_card(&cards);

        let now = self.clock.now();
        for answer in answers {
            let correct = correct_by_card
                .get(&answer.card_id)
                .is_some_and(|correct| correct.contains(&answer.answer_id));
            let effect = enrollment.state.answer_card(
                &lesson_key,
                &deck_key,
                &answer.card_id.key(),
                correct,
                now,
            )?;
            outcome.results.push(CardAnswerResult {
                card_id: answer.card_id,
                correct,
                card_completed: effect.card_completed,
            });
        }

        outcome.deck_completed = enrollment.state.is_deck_completed(&lesson_key, &deck_key);
        outcome.lesson_completed = enrollment.state.is_lesson_completed(&lesson_key);
        if outcome.lesson_completed {
            enrollment.state.current_lesson_id = Some(lesson_id);
        }
        enrollment.sync_current_lesson();
        enrollment.updated_at = now;

        self.progress.save_progress(&enrollment).await?;

        debug!(
            %user_id,
            %course_id,
            %lesson_id,
            %deck_id,
            answers = answers.len(),
            lesson_completed = outcome.lesson_completed,
            "answers recorded"
        );
        Ok(outcome)
    }
}
