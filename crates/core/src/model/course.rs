use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deck_refs::parse_deck_references;
use crate::model::ids::{CourseId, DeckId, LessonId};
use crate::validation::{ErrorKey, ValidationErrors};

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub order: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated course input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    pub order: i64,
    pub title: String,
    pub description: String,
}

impl CourseDraft {
    /// Validate the draft and stamp it with an ID and creation time.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` listing every missing field.
    pub fn validate(self, id: CourseId, now: DateTime<Utc>) -> Result<Course, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.title.trim().is_empty() {
            errors.add(ErrorKey::NoTitle);
        }
        if self.description.trim().is_empty() {
            errors.add(ErrorKey::NoDescription);
        }
        errors.into_result()?;

        Ok(Course {
            id,
            order: self.order,
            title: self.title,
            description: self.description,
            created_at: now,
        })
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A lesson body is markdown that embeds decks via `![deck](<uuid>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub order: i64,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    /// Decks referenced by the body, in order of first appearance.
    #[must_use]
    pub fn deck_references(&self) -> Vec<DeckId> {
        parse_deck_references(&self.body)
    }
}

/// Unvalidated lesson input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub course_id: CourseId,
    pub order: i64,
    pub title: String,
    pub description: String,
    pub body: String,
}

impl LessonDraft {
    /// Validate the draft and stamp it with an ID and creation time.
    ///
    /// A lesson must reference at least one deck.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` listing every problem found.
    pub fn validate(self, id: LessonId, now: DateTime<Utc>) -> Result<Lesson, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.title.trim().is_empty() {
            errors.add(ErrorKey::NoTitle);
        }
        if self.description.trim().is_empty() {
            errors.add(ErrorKey::NoDescription);
        }
        if self.body.trim().is_empty() {
            errors.add(ErrorKey::NoBody);
        } else if parse_deck_references(&self.body).is_empty() {
            errors.add(ErrorKey::NoDecksReferenced);
        }
        errors.into_result()?;

        Ok(Lesson {
            id,
            course_id: self.course_id,
            order: self.order,
            title: self.title,
            description: self.description,
            body: self.body,
            created_at: now,
        })
    }
}

/// Sort order for lesson listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LessonOrder {
    /// Course order, first lesson first.
    #[default]
    Ascending,
    Descending,
}
