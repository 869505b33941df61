//! Deck lookups and lesson materialization shared by enroll and sync.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use course_core::model::{Deck, DeckId, DeckProgress, Lesson, LessonProgress};
use storage::repository::{DeckCatalog, StorageError};

use crate::error::MaterializeError;

/// Fetches each deck from the catalog at most once per operation.
pub(crate) struct DeckCache<'a> {
    catalog: &'a dyn DeckCatalog,
    decks: HashMap<DeckId, Deck>,
}

impl<'a> DeckCache<'a> {
    pub(crate) fn new(catalog: &'a dyn DeckCatalog) -> Self {
        Self {
            catalog,
            decks: HashMap::new(),
        }
    }

    pub(crate) async fn get(&mut self, id: DeckId) -> Result<&Deck, StorageError> {
        match self.decks.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let deck = self.catalog.get_deck(id).await?;
                Ok(entry.insert(deck))
            }
        }
    }
}

/// Build fresh progress for `lesson` from the full contents of every deck it
/// references, in reference order.
pub(crate) async fn materialize_lesson(
    lesson: &Lesson,
    decks: &mut DeckCache<'_>,
) -> Result<LessonProgress, MaterializeError> {
    let references = lesson.deck_references();
    if references.is_empty() {
        return Err(MaterializeError::NoDecksReferenced(lesson.id));
    }

    let mut progress = LessonProgress::default();
    for deck_id in references {
        let deck = decks.get(deck_id).await?;
        progress
            .decks
            .insert(deck_id.key(), DeckProgress::from_deck(deck));
    }
    Ok(progress)
}
