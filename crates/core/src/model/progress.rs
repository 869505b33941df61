use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::deck::Deck;
use crate::model::ids::LessonId;
use crate::reconcile::{KeyDiff, apply_diff};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// An answer or reconciliation step targeted a key the tree does not track.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lesson {lesson_id} not found in progress state")]
    LessonNotFound { lesson_id: String },

    #[error("deck {deck_id} not found in lesson {lesson_id}")]
    DeckNotFound { lesson_id: String, deck_id: String },

    #[error("card {card_id} not found in deck {deck_id}")]
    CardNotFound { deck_id: String, card_id: String },
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProgress {
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CardProgress {
    /// Count one answer. Returns `true` if this answer completed the card.
    ///
    /// Counters keep growing after completion; completion itself never reverts.
    pub fn record_answer(&mut self, correct: bool, at: DateTime<Utc>) -> bool {
        if !correct {
            self.incorrect_answers = self.incorrect_answers.saturating_add(1);
            return false;
        }

        self.correct_answers = self.correct_answers.saturating_add(1);
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(at);
        true
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckProgress {
    #[serde(default)]
    pub cards: BTreeMap<String, CardProgress>,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeckProgress {
    /// Fresh progress tracking every card of `deck`, all incomplete.
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            cards: deck
                .cards
                .iter()
                .map(|card| (card.id.key(), CardProgress::default()))
                .collect(),
            is_completed: false,
            completed_at: None,
        }
    }

    /// A deck with no tracked cards is never complete.
    #[must_use]
    pub fn all_cards_completed(&self) -> bool {
        !self.cards.is_empty() && self.cards.values().all(|card| card.is_completed)
    }

    /// Marks the deck complete if every tracked card is. Never reopens.
    ///
    /// Returns `true` if the deck transitioned to complete.
    pub fn promote_if_complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed || !self.all_cards_completed() {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(at);
        true
    }

    fn reopen(&mut self) {
        self.is_completed = false;
        self.completed_at = None;
    }

    /// Track cards newly present in `live` and drop cards no longer in it.
    ///
    /// Any newly tracked card reopens the deck, and so does losing every card.
    pub fn reconcile_cards(&mut self, live: &[String]) -> KeyDiff {
        let diff = KeyDiff::compute(&self.cards, live);
        apply_diff(&mut self.cards, &diff, CardProgress::default);
        if !diff.missing.is_empty() || self.cards.is_empty() {
            self.reopen();
        }
        diff
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    #[serde(default)]
    pub decks: BTreeMap<String, DeckProgress>,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Fresh progress for a lesson built from the full contents of its decks.
    #[must_use]
    pub fn from_decks<'a>(decks: impl IntoIterator<Item = &'a Deck>) -> Self {
        Self {
            decks: decks
                .into_iter()
                .map(|deck| (deck.id.key(), DeckProgress::from_deck(deck)))
                .collect(),
            is_completed: false,
            completed_at: None,
        }
    }

    /// A lesson with no tracked decks is never complete.
    #[must_use]
    pub fn all_decks_completed(&self) -> bool {
        !self.decks.is_empty() && self.decks.values().all(|deck| deck.is_completed)
    }

    /// Marks the lesson complete if every deck is. Never reopens.
    pub fn promote_if_complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed || !self.all_decks_completed() {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(at);
        true
    }

    fn reopen(&mut self) {
        self.is_completed = false;
        self.completed_at = None;
    }

    /// Track decks newly referenced in `live` and drop decks no longer referenced.
    ///
    /// A newly tracked deck starts with no cards and reopens the lesson. A
    /// lesson left without decks is reopened too.
    pub fn reconcile_decks(&mut self, live: &[String]) -> KeyDiff {
        let diff = KeyDiff::compute(&self.decks, live);
        apply_diff(&mut self.decks, &diff, DeckProgress::default);
        if !diff.missing.is_empty() || self.decks.is_empty() {
            self.reopen();
        }
        diff
    }

    /// Reconcile the cards of one tracked deck against its live card list.
    ///
    /// New cards reopen both the deck and this lesson. A deck emptied of
    /// cards is reopened and takes the lesson with it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::DeckNotFound` if `deck_id` is not tracked.
    pub fn reconcile_cards(
        &mut self,
        lesson_id: &str,
        deck_id: &str,
        live: &[String],
    ) -> Result<KeyDiff, ProgressError> {
        let deck = self
            .decks
            .get_mut(deck_id)
            .ok_or_else(|| ProgressError::DeckNotFound {
                lesson_id: lesson_id.to_owned(),
                deck_id: deck_id.to_owned(),
            })?;
        let diff = deck.reconcile_cards(live);
        if !diff.missing.is_empty() || deck.cards.is_empty() {
            self.reopen();
        }
        Ok(diff)
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// What a single recorded answer changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerEffect {
    pub correct: bool,
    pub card_completed: bool,
    pub deck_completed: bool,
    pub lesson_completed: bool,
}

/// Per-user, per-course completion tree: lessons → decks → cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    #[serde(default)]
    pub lessons: BTreeMap<String, LessonProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lesson_id: Option<LessonId>,
}

impl CourseProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: &str) -> Option<&LessonProgress> {
        self.lessons.get(lesson_id)
    }

    #[must_use]
    pub fn deck(&self, lesson_id: &str, deck_id: &str) -> Option<&DeckProgress> {
        self.lesson(lesson_id)?.decks.get(deck_id)
    }

    #[must_use]
    pub fn card(&self, lesson_id: &str, deck_id: &str, card_id: &str) -> Option<&CardProgress> {
        self.deck(lesson_id, deck_id)?.cards.get(card_id)
    }

    #[must_use]
    pub fn is_card_completed(&self, lesson_id: &str, deck_id: &str, card_id: &str) -> bool {
        self.card(lesson_id, deck_id, card_id)
            .is_some_and(|card| card.is_completed)
    }

    /// True if the deck is tracked, non-empty, and every card is complete.
    #[must_use]
    pub fn is_deck_completed(&self, lesson_id: &str, deck_id: &str) -> bool {
        self.deck(lesson_id, deck_id)
            .is_some_and(DeckProgress::all_cards_completed)
    }

    #[must_use]
    pub fn is_lesson_completed(&self, lesson_id: &str) -> bool {
        self.lesson(lesson_id)
            .is_some_and(|lesson| lesson.is_completed || lesson.all_decks_completed())
    }

    #[must_use]
    pub fn is_current(&self, lesson_id: LessonId) -> bool {
        self.current_lesson_id == Some(lesson_id)
    }

    /// Record one answer and roll completion up through deck and lesson.
    ///
    /// # Errors
    ///
    /// Returns a `ProgressError` naming the first key (lesson, deck, card) that
    /// is not tracked.
    pub fn answer_card(
        &mut self,
        lesson_id: &str,
        deck_id: &str,
        card_id: &str,
        correct: bool,
        at: DateTime<Utc>,
    ) -> Result<AnswerEffect, ProgressError> {
        let lesson = self
            .lessons
            .get_mut(lesson_id)
            .ok_or_else(|| ProgressError::LessonNotFound {
                lesson_id: lesson_id.to_owned(),
            })?;
        let deck = lesson
            .decks
            .get_mut(deck_id)
            .ok_or_else(|| ProgressError::DeckNotFound {
                lesson_id: lesson_id.to_owned(),
                deck_id: deck_id.to_owned(),
            })?;
        let card = deck
            .cards
            .get_mut(card_id)
            .ok_or_else(|| ProgressError::CardNotFound {
                deck_id: deck_id.to_owned(),
                card_id: card_id.to_owned(),
            })?;

        let newly_completed = card.record_answer(correct, at);
        let card_completed = card.is_completed;

        if newly_completed {
            deck.promote_if_complete(at);
        }
        let deck_completed = deck.is_completed;

        if newly_completed {
            lesson.promote_if_complete(at);
        }

        Ok(AnswerEffect {
            correct,
            card_completed,
            deck_completed,
            lesson_completed: lesson.is_completed,
        })
    }

    /// Promote every deck and lesson whose children are all complete.
    ///
    /// Returns the number of decks and lessons that transitioned.
    pub fn roll_up(&mut self, at: DateTime<Utc>) -> usize {
        let mut promoted = 0;
        for lesson in self.lessons.values_mut() {
            for deck in lesson.decks.values_mut() {
                promoted += usize::from(deck.promote_if_complete(at));
            }
            promoted += usize::from(lesson.promote_if_complete(at));
        }
        promoted
    }

    /// Drop lessons that are no longer part of the course.
    pub fn retain_lessons(&mut self, live: &[String]) -> KeyDiff {
        let diff = KeyDiff::compute(&self.lessons, live);
        for key in &diff.extra {
            self.lessons.remove(key);
        }
        diff
    }

    /// Point `current_lesson_id` at the first incomplete lesson in `ordered`,
    /// or at the last tracked lesson if all are complete.
    ///
    /// Lessons in `ordered` that the tree does not track are skipped; with
    /// none tracked the current lesson is cleared.
    pub fn recompute_current_lesson(&mut self, ordered: &[LessonId]) -> Option<LessonId> {
        let mut last = None;
        for lesson_id in ordered {
            let Some(lesson) = self.lessons.get(&lesson_id.key()) else {
                continue;
            };
            last = Some(*lesson_id);
            if !lesson.is_completed {
                self.current_lesson_id = Some(*lesson_id);
                return self.current_lesson_id;
            }
        }
        self.current_lesson_id = last;
        self.current_lesson_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::deck::{Card, PossibleAnswer};
    use crate::model::ids::{AnswerId, CardId, DeckId};
    use crate::time::fixed_now;

    fn deck_with_cards(n: usize) -> Deck {
        let cards = (0..n)
            .map(|i| {
                Card::new(
                    CardId::random(),
                    format!("Q{i}"),
                    vec![PossibleAnswer::new(AnswerId::random(), "A", true)],
                )
            })
            .collect();
        Deck::new(DeckId::random(), "Deck", cards)
    }

    fn single_lesson(deck: &Deck) -> (CourseProgress, String) {
        let lesson_id = LessonId::random();
        let mut progress = CourseProgress::new();
        progress
            .lessons
            .insert(lesson_id.key(), LessonProgress::from_decks([deck]));
        progress.current_lesson_id = Some(lesson_id);
        (progress, lesson_id.key())
    }

    #[test]
    fn correct_answer_completes_card_deck_and_lesson() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let card_key = deck.cards[0].id.key();

        let effect = progress
            .answer_card(&lesson, &deck_key, &card_key, true, fixed_now())
            .unwrap();

        assert!(effect.card_completed && effect.deck_completed && effect.lesson_completed);
        let lesson_progress = progress.lesson(&lesson).unwrap();
        assert_eq!(lesson_progress.completed_at, Some(fixed_now()));
        assert_eq!(
            progress.card(&lesson, &deck_key, &card_key).unwrap().correct_answers,
            1
        );
    }

    #[test]
    fn incorrect_then_correct_in_order() {
        let deck = deck_with_cards(2);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let first = deck.cards[0].id.key();

        progress
            .answer_card(&lesson, &deck_key, &first, false, fixed_now())
            .unwrap();
        let effect = progress
            .answer_card(&lesson, &deck_key, &first, true, fixed_now())
            .unwrap();

        assert!(effect.card_completed);
        assert!(!effect.deck_completed, "second card still open");
        let card = progress.card(&lesson, &deck_key, &first).unwrap();
        assert_eq!((card.correct_answers, card.incorrect_answers), (1, 1));
    }

    #[test]
    fn answering_never_reopens_a_card() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let card_key = deck.cards[0].id.key();

        progress
            .answer_card(&lesson, &deck_key, &card_key, true, fixed_now())
            .unwrap();
        progress
            .answer_card(&lesson, &deck_key, &card_key, false, fixed_now())
            .unwrap();
        progress
            .answer_card(&lesson, &deck_key, &card_key, true, fixed_now())
            .unwrap();

        let card = progress.card(&lesson, &deck_key, &card_key).unwrap();
        assert!(card.is_completed);
        assert_eq!((card.correct_answers, card.incorrect_answers), (2, 1));
        assert!(progress.is_lesson_completed(&lesson));
    }

    #[test]
    fn unknown_keys_are_reported_outermost_first() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();

        let err = progress
            .answer_card("missing", &deck_key, "c", true, fixed_now())
            .unwrap_err();
        assert!(matches!(err, ProgressError::LessonNotFound { .. }));

        let err = progress
            .answer_card(&lesson, "missing", "c", true, fixed_now())
            .unwrap_err();
        assert!(matches!(err, ProgressError::DeckNotFound { .. }));

        let err = progress
            .answer_card(&lesson, &deck_key, "missing", true, fixed_now())
            .unwrap_err();
        assert!(matches!(err, ProgressError::CardNotFound { .. }));
    }

    #[test]
    fn empty_deck_is_never_completed() {
        let mut deck = DeckProgress::default();
        assert!(!deck.all_cards_completed());
        assert!(!deck.promote_if_complete(fixed_now()));
        assert!(!deck.is_completed);
    }

    #[test]
    fn new_card_reopens_deck_and_lesson() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let card_key = deck.cards[0].id.key();
        progress
            .answer_card(&lesson, &deck_key, &card_key, true, fixed_now())
            .unwrap();

        let live = vec![card_key.clone(), CardId::random().key()];
        let lesson_progress = progress.lessons.get_mut(&lesson).unwrap();
        let diff = lesson_progress
            .reconcile_cards(&lesson, &deck_key, &live)
            .unwrap();

        assert_eq!(diff.missing.len(), 1);
        assert!(!lesson_progress.is_completed);
        assert!(lesson_progress.completed_at.is_none());
        let deck_progress = &lesson_progress.decks[&deck_key];
        assert!(!deck_progress.is_completed);
        assert!(deck_progress.cards[&card_key].is_completed, "existing card untouched");
    }

    #[test]
    fn emptied_deck_reopens_deck_and_lesson() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let card_key = deck.cards[0].id.key();
        progress
            .answer_card(&lesson, &deck_key, &card_key, true, fixed_now())
            .unwrap();
        assert!(progress.is_lesson_completed(&lesson));

        let lesson_progress = progress.lessons.get_mut(&lesson).unwrap();
        let diff = lesson_progress
            .reconcile_cards(&lesson, &deck_key, &[])
            .unwrap();
        assert_eq!(diff.extra, vec![card_key]);
        assert_eq!(progress.roll_up(fixed_now()), 0);

        let deck_progress = progress.deck(&lesson, &deck_key).unwrap();
        assert!(deck_progress.cards.is_empty());
        assert!(!deck_progress.is_completed);
        assert!(deck_progress.completed_at.is_none());
        assert!(!progress.is_lesson_completed(&lesson));
    }

    #[test]
    fn lesson_without_decks_is_reopened() {
        let deck = deck_with_cards(1);
        let (mut progress, lesson) = single_lesson(&deck);
        progress
            .answer_card(&lesson, &deck.id.key(), &deck.cards[0].id.key(), true, fixed_now())
            .unwrap();

        let lesson_progress = progress.lessons.get_mut(&lesson).unwrap();
        lesson_progress.reconcile_decks(&[]);

        assert!(lesson_progress.decks.is_empty());
        assert!(!lesson_progress.is_completed);
        assert!(lesson_progress.completed_at.is_none());
    }

    #[test]
    fn pruning_keeps_sibling_state() {
        let deck = deck_with_cards(2);
        let (mut progress, lesson) = single_lesson(&deck);
        let deck_key = deck.id.key();
        let keep = deck.cards[0].id.key();
        progress
            .answer_card(&lesson, &deck_key, &keep, true, fixed_now())
            .unwrap();
        let before = progress.card(&lesson, &deck_key, &keep).cloned();

        let lesson_progress = progress.lessons.get_mut(&lesson).unwrap();
        let diff = lesson_progress
            .reconcile_cards(&lesson, &deck_key, std::slice::from_ref(&keep))
            .unwrap();
        assert_eq!(diff.extra.len(), 1);

        assert_eq!(progress.card(&lesson, &deck_key, &keep).cloned(), before);
        assert_eq!(progress.roll_up(fixed_now()), 2, "deck and lesson promoted");
        assert!(progress.is_deck_completed(&lesson, &deck_key));
    }

    #[test]
    fn current_lesson_is_first_incomplete_or_last() {
        let ids: Vec<LessonId> = (0..3).map(|_| LessonId::random()).collect();
        let mut progress = CourseProgress::new();
        for id in &ids {
            progress.lessons.insert(id.key(), LessonProgress::default());
        }
        progress.lessons.get_mut(&ids[0].key()).unwrap().is_completed = true;

        assert_eq!(progress.recompute_current_lesson(&ids), Some(ids[1]));
        assert!(progress.is_current(ids[1]));
        assert!(!progress.is_current(ids[0]));

        for id in &ids {
            progress.lessons.get_mut(&id.key()).unwrap().is_completed = true;
        }
        assert_eq!(progress.recompute_current_lesson(&ids), Some(ids[2]));

        assert_eq!(progress.recompute_current_lesson(&[]), None);
    }

    #[test]
    fn serialization_omits_unset_timestamps() {
        let deck = deck_with_cards(1);
        let (progress, _) = single_lesson(&deck);
        let json = serde_json::to_string(&progress).unwrap();
        assert!(!json.contains("completed_at"));
        let back: CourseProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
