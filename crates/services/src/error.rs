//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{LessonId, ProgressError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("course has no lessons")]
    NoLessons,
    #[error("lesson {lesson_id} does not reference any deck")]
    NoDecksReferenced { lesson_id: LessonId },
    #[error("user is already enrolled in this course")]
    AlreadyEnrolled,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnswerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("progress not initialized for this course")]
    ProgressNotInitialized,
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SyncService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("progress not initialized for this course")]
    ProgressNotInitialized,
    #[error("lesson {lesson_id} does not reference any deck")]
    NoDecksReferenced { lesson_id: LessonId },
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LessonsBrowser`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrowseError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    DeckClient(#[from] reqwest::Error),
}

/// Shared failure of the lesson materialization step used by enroll and sync.
#[derive(Debug)]
pub(crate) enum MaterializeError {
    NoDecksReferenced(LessonId),
    Storage(StorageError),
}

impl From<StorageError> for MaterializeError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<MaterializeError> for EnrollmentError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::NoDecksReferenced(lesson_id) => Self::NoDecksReferenced { lesson_id },
            MaterializeError::Storage(err) => Self::Storage(err),
        }
    }
}

impl From<MaterializeError> for SyncError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::NoDecksReferenced(lesson_id) => Self::NoDecksReferenced { lesson_id },
            MaterializeError::Storage(err) => Self::Storage(err),
        }
    }
}
