use std::collections::HashSet;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use course_core::model::{Card, CardId, Deck, DeckId};
use storage::repository::{DeckCatalog, StorageError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct DeckClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl DeckClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `COURSE_DECKS_URL`. `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COURSE_DECKS_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url.trim()))
    }
}

/// `DeckCatalog` backed by the remote deck service's JSON API.
#[derive(Clone, Debug)]
pub struct HttpDeckClient {
    client: Client,
    base_url: String,
}

impl HttpDeckClient {
    /// Build a client for the deck service at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be constructed.
    pub fn new(config: DeckClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct BatchGetCardsRequest<'a> {
    card_ids: &'a [CardId],
}

#[derive(Debug, Deserialize)]
struct BatchGetCardsResponse {
    #[serde(default)]
    cards: Vec<Card>,
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound);
    }
    if !status.is_success() {
        return Err(StorageError::Connection(format!(
            "deck service responded with status {status}"
        )));
    }
    let body = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&body).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl DeckCatalog for HttpDeckClient {
    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError> {
        let url = format!("{}/decks/{id}", self.base_url);
        let response = self.client.get(url).send().await.map_err(transport)?;
        decode(response).await
    }

    async fn get_cards(&self, ids: &[CardId]) -> Result<Vec<Card>, StorageError> {
        let mut requested = HashSet::with_capacity(ids.len());
        let card_ids: Vec<CardId> = ids
            .iter()
            .copied()
            .filter(|id| requested.insert(*id))
            .collect();
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/cards:batchGet", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&BatchGetCardsRequest {
                card_ids: &card_ids,
            })
            .send()
            .await
            .map_err(transport)?;
        let body: BatchGetCardsResponse = decode(response).await?;

        let mut returned = HashSet::with_capacity(body.cards.len());
        Ok(body
            .cards
            .into_iter()
            .filter(|card| requested.contains(&card.id) && returned.insert(card.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{AnswerId, PossibleAnswer};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn client(base_url: &str) -> HttpDeckClient {
        HttpDeckClient::new(DeckClientConfig::new(base_url)).unwrap()
    }

    fn sample_deck() -> Deck {
        Deck::new(
            DeckId::random(),
            "Borrowing",
            vec![Card::new(
                CardId::random(),
                "Who owns it?",
                vec![PossibleAnswer::new(AnswerId::random(), "the caller", true)],
            )],
        )
    }

    #[tokio::test]
    async fn get_deck_decodes_json() {
        let deck = sample_deck();
        let (base, server) = serve_once("200 OK", serde_json::to_string(&deck).unwrap()).await;

        let fetched = client(&base).get_deck(deck.id).await.unwrap();
        assert_eq!(fetched, deck);

        let request = server.await.unwrap();
        assert!(request.starts_with(&format!("GET /decks/{} ", deck.id)));
    }

    #[tokio::test]
    async fn missing_deck_maps_to_not_found() {
        let (base, _server) = serve_once("404 Not Found", "{}".into()).await;
        let err = client(&base).get_deck(DeckId::random()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn server_error_maps_to_connection() {
        let (base, _server) = serve_once("503 Service Unavailable", String::new()).await;
        let err = client(&base).get_deck(DeckId::random()).await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_serialization() {
        let (base, _server) = serve_once("200 OK", "{\"id\": 42}".into()).await;
        let err = client(&base).get_deck(DeckId::random()).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn batch_get_posts_distinct_ids_and_drops_unrequested_cards() {
        let deck = sample_deck();
        let card = deck.cards[0].clone();
        let stray = Card::new(CardId::random(), "stray", vec![]);
        let body = serde_json::json!({ "cards": [&card, &stray] }).to_string();
        let (base, server) = serve_once("200 OK", body).await;

        let cards = client(&base)
            .get_cards(&[card.id, card.id])
            .await
            .unwrap();
        assert_eq!(cards, vec![card.clone()]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /cards:batchGet "));
        assert_eq!(request.matches(&card.id.to_string()).count(), 1);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_request() {
        let client = client("http://127.0.0.1:9");
        assert!(client.get_cards(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = client("http://decks.local/api/");
        assert_eq!(client.base_url(), "http://decks.local/api");
    }
}
