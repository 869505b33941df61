use std::collections::{HashMap, HashSet};

use course_core::model::{Card, CardId, Deck, DeckId, PossibleAnswer};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, parse_card_kind, parse_id, ser};
use crate::repository::{DeckCatalog, DeckRepository, StorageError};

fn position(i: usize) -> Result<i64, StorageError> {
    i64::try_from(i).map_err(|_| StorageError::Serialization("position overflow".into()))
}

/// Card IDs as strings, first occurrence wins.
fn distinct_keys(ids: &[CardId]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(**id))
        .map(ToString::to_string)
        .collect()
}

/// Builds `?{start}, ?{start + 1}, ...` for an `IN (...)` clause.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn card_from_row(row: &SqliteRow) -> Result<Card, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    Ok(Card {
        id: parse_id("card id", &row.try_get::<String, _>("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        kind: parse_card_kind(&kind)?,
        possible_answers: Vec::new(),
    })
}

fn answer_from_row(row: &SqliteRow) -> Result<(CardId, PossibleAnswer), StorageError> {
    let card_id = parse_id("card id", &row.try_get::<String, _>("card_id").map_err(ser)?)?;
    let answer = PossibleAnswer {
        id: parse_id("answer id", &row.try_get::<String, _>("id").map_err(ser)?)?,
        text: row.try_get("text").map_err(ser)?,
        is_correct: row.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
    };
    Ok((card_id, answer))
}

/// Attach answer rows (already in position order) to their cards.
fn attach_answers(cards: &mut [Card], rows: &[SqliteRow]) -> Result<(), StorageError> {
    let index: HashMap<CardId, usize> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| (card.id, i))
        .collect();
    for row in rows {
        let (card_id, answer) = answer_from_row(row)?;
        if let Some(&i) = index.get(&card_id) {
            cards[i].possible_answers.push(answer);
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let deck_id = deck.id.to_string();

        sqlx::query(
            r"
            INSERT INTO decks (id, title, description)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description
            ",
        )
        .bind(deck_id.as_str())
        .bind(deck.title.as_str())
        .bind(deck.description.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // answers go with their cards via ON DELETE CASCADE
        sqlx::query("DELETE FROM cards WHERE deck_id = ?1")
            .bind(deck_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (card_pos, card) in deck.cards.iter().enumerate() {
            let card_id = card.id.to_string();
            sqlx::query(
                r"
                INSERT INTO cards (id, deck_id, position, title, explanation, kind)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(card_id.as_str())
            .bind(deck_id.as_str())
            .bind(position(card_pos)?)
            .bind(card.title.as_str())
            .bind(card.explanation.as_str())
            .bind(card.kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (answer_pos, answer) in card.possible_answers.iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO answers (id, card_id, position, text, is_correct)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(answer.id.to_string())
                .bind(card_id.as_str())
                .bind(position(answer_pos)?)
                .bind(answer.text.as_str())
                .bind(i64::from(answer.is_correct))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeckCatalog for SqliteRepository {
    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError> {
        let deck_id = id.to_string();

        let row = sqlx::query("SELECT id, title, description FROM decks WHERE id = ?1")
            .bind(deck_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let card_rows = sqlx::query(
            r"
            SELECT id, title, explanation, kind
            FROM cards
            WHERE deck_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(deck_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let answer_rows = sqlx::query(
            r"
            SELECT a.id, a.card_id, a.text, a.is_correct
            FROM answers a
            JOIN cards c ON c.id = a.card_id
            WHERE c.deck_id = ?1
            ORDER BY c.position ASC, a.position ASC
            ",
        )
        .bind(deck_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut cards = Vec::with_capacity(card_rows.len());
        for card_row in &card_rows {
            cards.push(card_from_row(card_row)?);
        }
        attach_answers(&mut cards, &answer_rows)?;

        Ok(Deck {
            id: parse_id("deck id", &row.try_get::<String, _>("id").map_err(ser)?)?,
            title: row.try_get("title").map_err(ser)?,
            description: row.try_get("description").map_err(ser)?,
            cards,
        })
    }

    async fn get_cards(&self, ids: &[CardId]) -> Result<Vec<Card>, StorageError> {
        let unique = distinct_keys(ids);
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let card_sql = format!(
            "SELECT id, title, explanation, kind FROM cards WHERE id IN ({})",
            placeholders(1, unique.len())
        );
        let mut card_query = sqlx::query(&card_sql);
        for id in &unique {
            card_query = card_query.bind(id.as_str());
        }
        let card_rows = card_query.fetch_all(&self.pool).await.map_err(conn)?;

        let answer_sql = format!(
            "SELECT id, card_id, text, is_correct FROM answers WHERE card_id IN ({}) \
             ORDER BY card_id ASC, position ASC",
            placeholders(1, unique.len())
        );
        let mut answer_query = sqlx::query(&answer_sql);
        for id in &unique {
            answer_query = answer_query.bind(id.as_str());
        }
        let answer_rows = answer_query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut by_id: HashMap<String, Card> = HashMap::with_capacity(card_rows.len());
        let mut found = Vec::with_capacity(card_rows.len());
        for row in &card_rows {
            found.push(card_from_row(row)?);
        }
        attach_answers(&mut found, &answer_rows)?;
        for card in found {
            by_id.insert(card.id.to_string(), card);
        }

        // keep the caller's order
        Ok(unique.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2");
    }

    #[test]
    fn distinct_keys_keep_first_occurrence_order() {
        let (a, b) = (CardId::random(), CardId::random());
        assert_eq!(
            distinct_keys(&[b, a, b, a]),
            vec![b.to_string(), a.to_string()]
        );
        assert!(distinct_keys(&[]).is_empty());
    }
}
