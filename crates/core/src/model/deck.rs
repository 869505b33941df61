use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::ids::{AnswerId, CardId, DeckId};

//
// ─── CARD KIND ─────────────────────────────────────────────────────────────────
//

/// How a card is presented to the learner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    #[default]
    SingleChoice,
    FillInTheBlanks,
}

impl CardKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardKind::SingleChoice => "single_choice",
            CardKind::FillInTheBlanks => "fill_in_the_blanks",
        }
    }

    #[must_use]
    pub fn from_str_opt(raw: &str) -> Option<Self> {
        match raw {
            "single_choice" => Some(Self::SingleChoice),
            "fill_in_the_blanks" => Some(Self::FillInTheBlanks),
            _ => None,
        }
    }
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// One selectable answer for a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleAnswer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

impl PossibleAnswer {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            is_correct,
        }
    }
}

/// A flashcard as authored in the content service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub kind: CardKind,
    #[serde(default)]
    pub possible_answers: Vec<PossibleAnswer>,
}

impl Card {
    #[must_use]
    pub fn new(id: CardId, title: impl Into<String>, possible_answers: Vec<PossibleAnswer>) -> Self {
        Self {
            id,
            title: title.into(),
            explanation: String::new(),
            kind: CardKind::default(),
            possible_answers,
        }
    }

    /// IDs of the answers marked correct.
    pub fn correct_answer_ids(&self) -> impl Iterator<Item = AnswerId> + '_ {
        self.possible_answers
            .iter()
            .filter(|answer| answer.is_correct)
            .map(|answer| answer.id)
    }
}

/// A deck with its full card list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Deck {
    #[must_use]
    pub fn new(id: DeckId, title: impl Into<String>, cards: Vec<Card>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            cards,
        }
    }

    /// Card IDs in progress-tree key form, in deck order.
    #[must_use]
    pub fn card_keys(&self) -> Vec<String> {
        self.cards.iter().map(|card| card.id.key()).collect()
    }
}

/// Maps each card in a batch to the set of its correct answer IDs.
#[must_use]
pub fn correct_answers_by_card(cards: &[Card]) -> HashMap<CardId, HashSet<AnswerId>> {
    cards
        .iter()
        .map(|card| (card.id, card.correct_answer_ids().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answers_are_grouped_per_card() {
        let right = AnswerId::random();
        let wrong = AnswerId::random();
        let other_right = AnswerId::random();
        let first = CardId::random();
        let second = CardId::random();
        let cards = vec![
            Card::new(
                first,
                "Q1",
                vec![
                    PossibleAnswer::new(right, "yes", true),
                    PossibleAnswer::new(wrong, "no", false),
                ],
            ),
            Card::new(
                second,
                "Q2",
                vec![PossibleAnswer::new(other_right, "ok", true)],
            ),
        ];

        let by_card = correct_answers_by_card(&cards);
        assert!(by_card[&first].contains(&right));
        assert!(!by_card[&first].contains(&wrong));
        assert!(!by_card[&first].contains(&other_right));
        assert!(by_card[&second].contains(&other_right));
    }

    #[test]
    fn card_kind_round_trips_through_str() {
        for kind in [CardKind::SingleChoice, CardKind::FillInTheBlanks] {
            assert_eq!(CardKind::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(CardKind::from_str_opt("essay"), None);
    }
}
