use std::sync::Arc;

use storage::repository::{DeckCatalog, Storage};
use tracing::info;

use crate::Clock;
use crate::answer_service::AnswerService;
use crate::deck_client::{DeckClientConfig, HttpDeckClient};
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::lessons_browser::LessonsBrowser;
use crate::progress_locks::ProgressLocks;
use crate::sync_service::SyncService;

/// Assembles the progress services over one storage backend.
///
/// All services share a single `ProgressLocks`, so enroll, answer and sync
/// on the same (user, course) never interleave within the process.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    enrollment: Arc<EnrollmentService>,
    answers: Arc<AnswerService>,
    sync: Arc<SyncService>,
    lessons: Arc<LessonsBrowser>,
}

impl AppServices {
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let locks = ProgressLocks::new();

        let enrollment = Arc::new(
            EnrollmentService::new(
                clock,
                Arc::clone(&storage.courses),
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.progress),
            )
            .with_locks(locks.clone()),
        );
        let answers = Arc::new(
            AnswerService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.progress),
            )
            .with_locks(locks.clone()),
        );
        let sync = Arc::new(
            SyncService::new(
                clock,
                Arc::clone(&storage.courses),
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.progress),
            )
            .with_locks(locks),
        );
        let lessons = Arc::new(LessonsBrowser::new(
            Arc::clone(&storage.courses),
            Arc::clone(&sync),
        ));

        Self {
            storage,
            enrollment,
            answers,
            sync,
            lessons,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// With a deck client config, deck contents come from the remote deck
    /// service instead of the local tables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the HTTP client
    /// setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        deck_client: Option<DeckClientConfig>,
    ) -> Result<Self, AppServicesError> {
        let mut storage = Storage::sqlite(db_url).await?;
        if let Some(config) = deck_client {
            let client = HttpDeckClient::new(config)?;
            info!(base_url = client.base_url(), "using remote deck service");
            let catalog: Arc<dyn DeckCatalog> = Arc::new(client);
            storage = storage.with_catalog(catalog);
        }
        Ok(Self::from_storage(storage, clock))
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn enrollment(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollment)
    }

    #[must_use]
    pub fn answers(&self) -> Arc<AnswerService> {
        Arc::clone(&self.answers)
    }

    #[must_use]
    pub fn sync(&self) -> Arc<SyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn lessons(&self) -> Arc<LessonsBrowser> {
        Arc::clone(&self.lessons)
    }
}
