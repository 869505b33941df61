use async_trait::async_trait;
use course_core::model::{
    Card, CardId, Course, CourseId, Deck, DeckId, Enrollment, Lesson, LessonId, LessonOrder,
    UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Authored courses and their ordered lessons.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by ID, `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// All lessons of a course sorted by lesson order.
    ///
    /// An unknown course yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(
        &self,
        course_id: CourseId,
        order: LessonOrder,
    ) -> Result<Vec<Lesson>, StorageError>;
}

/// Read access to deck contents, local or remote.
#[async_trait]
pub trait DeckCatalog: Send + Sync {
    /// Fetch a deck with all of its cards and answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the deck does not exist.
    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError>;

    /// Fetch many cards in one round trip.
    ///
    /// Unknown IDs are skipped; duplicates are returned once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_cards(&self, ids: &[CardId]) -> Result<Vec<Card>, StorageError>;
}

/// Write access to locally stored decks.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Persist a deck, replacing its previous card list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError>;
}

/// Durable home of progress trees, keyed by (user, course).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load a user's enrollment and progress tree.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user is not enrolled.
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError>;

    /// Store a brand-new enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user is already enrolled.
    async fn create_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// Overwrite the tree and current lesson of an existing enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no enrollment exists for the pair.
    async fn save_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    decks: Arc<Mutex<HashMap<DeckId, Deck>>>,
    progress: Arc<Mutex<HashMap<(UserId, CourseId), Enrollment>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a lesson, as an author deleting it from the course would.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn remove_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(&id))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn list_lessons(
        &self,
        course_id: CourseId,
        order: LessonOrder,
    ) -> Result<Vec<Lesson>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut lessons: Vec<Lesson> = guard
            .values()
            .filter(|lesson| lesson.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by(|a, b| {
            (a.order, a.created_at, a.id).cmp(&(b.order, b.created_at, b.id))
        });
        if order == LessonOrder::Descending {
            lessons.reverse();
        }
        Ok(lessons)
    }
}

#[async_trait]
impl DeckCatalog for InMemoryRepository {
    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError> {
        let guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_cards(&self, ids: &[CardId]) -> Result<Vec<Card>, StorageError> {
        let guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut by_id: HashMap<CardId, &Card> = HashMap::new();
        for card in guard.values().flat_map(|deck| deck.cards.iter()) {
            by_id.insert(card.id, card);
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(card) = by_id.get(id) {
                found.push((*card).clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(deck.id, deck.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&(user_id, course_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn create_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (enrollment.user_id, enrollment.course_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, enrollment.clone());
        Ok(())
    }

    async fn save_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard
            .get_mut(&(enrollment.user_id, enrollment.course_id))
            .ok_or(StorageError::NotFound)?;
        slot.current_lesson_id = enrollment.current_lesson_id;
        slot.state = enrollment.state.clone();
        slot.updated_at = enrollment.updated_at;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub decks: Arc<dyn DeckRepository>,
    pub catalog: Arc<dyn DeckCatalog>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, sharing its contents.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let decks: Arc<dyn DeckRepository> = Arc::new(repo.clone());
        let catalog: Arc<dyn DeckCatalog> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            courses,
            decks,
            catalog,
            progress,
        }
    }

    /// Serve deck contents from `catalog` instead of local storage.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn DeckCatalog>) -> Self {
        self.catalog = catalog;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CourseProgress, PossibleAnswer};
    use course_core::model::AnswerId;
    use course_core::time::fixed_now;

    fn lesson(course_id: CourseId, order: i64) -> Lesson {
        Lesson {
            id: LessonId::random(),
            course_id,
            order,
            title: format!("Lesson {order}"),
            description: String::new(),
            body: String::new(),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn lessons_are_listed_in_course_order() {
        let repo = InMemoryRepository::new();
        let course = CourseId::random();
        let second = lesson(course, 2);
        let first = lesson(course, 1);
        repo.upsert_lesson(&second).await.unwrap();
        repo.upsert_lesson(&first).await.unwrap();
        repo.upsert_lesson(&lesson(CourseId::random(), 0))
            .await
            .unwrap();

        let asc = repo
            .list_lessons(course, LessonOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(
            asc.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        let desc = repo
            .list_lessons(course, LessonOrder::Descending)
            .await
            .unwrap();
        assert_eq!(desc[0].id, second.id);
    }

    #[tokio::test]
    async fn get_cards_skips_unknown_and_duplicate_ids() {
        let repo = InMemoryRepository::new();
        let card = Card::new(
            CardId::random(),
            "Q",
            vec![PossibleAnswer::new(AnswerId::random(), "A", true)],
        );
        let deck = Deck::new(DeckId::random(), "D", vec![card.clone()]);
        repo.upsert_deck(&deck).await.unwrap();

        let cards = repo
            .get_cards(&[card.id, CardId::random(), card.id])
            .await
            .unwrap();
        assert_eq!(cards, vec![card]);
    }

    #[tokio::test]
    async fn second_enrollment_conflicts() {
        let repo = InMemoryRepository::new();
        let enrollment = Enrollment::new(
            UserId::random(),
            CourseId::random(),
            CourseProgress::new(),
            fixed_now(),
        );
        repo.create_progress(&enrollment).await.unwrap();

        let err = repo.create_progress(&enrollment).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn saving_unknown_enrollment_is_not_found() {
        let repo = InMemoryRepository::new();
        let enrollment = Enrollment::new(
            UserId::random(),
            CourseId::random(),
            CourseProgress::new(),
            fixed_now(),
        );
        let err = repo.save_progress(&enrollment).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
