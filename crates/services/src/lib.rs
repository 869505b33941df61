#![forbid(unsafe_code)]

pub mod answer_service;
pub mod app_services;
pub mod deck_client;
pub mod enrollment_service;
pub mod error;
pub mod lessons_browser;
mod materialize;
pub mod progress_locks;
pub mod sync_service;

pub use course_core::Clock;

pub use answer_service::{AnswerOutcome, AnswerService, CardAnswer, CardAnswerResult};
pub use app_services::AppServices;
pub use deck_client::{DeckClientConfig, HttpDeckClient};
pub use enrollment_service::EnrollmentService;
pub use error::{AnswerError, AppServicesError, BrowseError, EnrollmentError, SyncError};
pub use lessons_browser::{BrowseOptions, BrowseResult, LessonWithProgress, LessonsBrowser};
pub use progress_locks::ProgressLocks;
pub use sync_service::SyncService;
