mod course;
mod deck;
mod enrollment;
mod ids;
pub mod progress;

pub use course::{Course, CourseDraft, Lesson, LessonDraft, LessonOrder};
pub use deck::{Card, CardKind, Deck, PossibleAnswer, correct_answers_by_card};
pub use enrollment::Enrollment;
pub use ids::{AnswerId, CardId, CourseId, DeckId, LessonId, ParseIdError, UserId};

pub use progress::{
    AnswerEffect, CardProgress, CourseProgress, DeckProgress, LessonProgress, ProgressError,
};
