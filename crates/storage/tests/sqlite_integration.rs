use course_core::model::{
    AnswerId, Card, CardId, CardKind, Course, CourseId, CourseProgress, Deck, DeckId,
    DeckProgress, Enrollment, Lesson, LessonId, LessonOrder, LessonProgress, PossibleAnswer,
    UserId,
};
use course_core::time::fixed_now;
use storage::repository::{
    CourseRepository, DeckCatalog, DeckRepository, ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn course() -> Course {
    Course {
        id: CourseId::random(),
        order: 1,
        title: "Rust basics".into(),
        description: "Ownership and borrowing".into(),
        created_at: fixed_now(),
    }
}

fn lesson(course_id: CourseId, order: i64, deck: DeckId) -> Lesson {
    Lesson {
        id: LessonId::random(),
        course_id,
        order,
        title: format!("Lesson {order}"),
        description: "desc".into(),
        body: format!("Intro\n\n![deck]({deck})\n"),
        created_at: fixed_now(),
    }
}

fn deck(cards: usize) -> Deck {
    let cards = (0..cards)
        .map(|i| {
            Card::new(
                CardId::random(),
                format!("Q{i}"),
                vec![
                    PossibleAnswer::new(AnswerId::random(), "right", true),
                    PossibleAnswer::new(AnswerId::random(), "wrong", false),
                ],
            )
        })
        .collect();
    Deck::new(DeckId::random(), "Deck", cards)
}

#[tokio::test]
async fn sqlite_lessons_are_ordered_and_scoped_to_course() {
    let repo = connect("memdb_lessons").await;
    let other = course();
    let course = course();
    repo.upsert_course(&course).await.unwrap();
    repo.upsert_course(&other).await.unwrap();

    let second = lesson(course.id, 2, DeckId::random());
    let first = lesson(course.id, 1, DeckId::random());
    repo.upsert_lesson(&second).await.unwrap();
    repo.upsert_lesson(&first).await.unwrap();
    repo.upsert_lesson(&lesson(other.id, 0, DeckId::random()))
        .await
        .unwrap();

    let asc = repo
        .list_lessons(course.id, LessonOrder::Ascending)
        .await
        .unwrap();
    assert_eq!(asc, vec![first.clone(), second.clone()]);

    let desc = repo
        .list_lessons(course.id, LessonOrder::Descending)
        .await
        .unwrap();
    assert_eq!(desc, vec![second, first]);

    let fetched = repo.get_course(course.id).await.unwrap();
    assert_eq!(fetched, Some(course));
    assert!(repo.get_course(CourseId::random()).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_deck_roundtrip_keeps_card_and_answer_order() {
    let repo = connect("memdb_decks").await;
    let mut deck = deck(3);
    deck.description = "three questions".into();
    deck.cards[1].kind = CardKind::FillInTheBlanks;
    deck.cards[1].explanation = "fill it in".into();
    repo.upsert_deck(&deck).await.unwrap();

    let fetched = repo.get_deck(deck.id).await.unwrap();
    assert_eq!(fetched, deck);

    // replacing the deck drops cards that are gone
    deck.cards.remove(0);
    repo.upsert_deck(&deck).await.unwrap();
    let fetched = repo.get_deck(deck.id).await.unwrap();
    assert_eq!(fetched.cards.len(), 2);
    assert_eq!(fetched, deck);

    let err = repo.get_deck(DeckId::random()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_get_cards_skips_unknown_and_keeps_request_order() {
    let repo = connect("memdb_cards").await;
    let deck = deck(2);
    repo.upsert_deck(&deck).await.unwrap();

    let a = deck.cards[0].id;
    let b = deck.cards[1].id;
    let cards = repo
        .get_cards(&[b, CardId::random(), a, b])
        .await
        .unwrap();
    assert_eq!(cards, vec![deck.cards[1].clone(), deck.cards[0].clone()]);

    assert!(repo.get_cards(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_progress_create_get_save() {
    let repo = connect("memdb_progress").await;
    let deck = deck(1);
    let lesson_id = LessonId::random();

    let mut state = CourseProgress::new();
    state
        .lessons
        .insert(lesson_id.key(), LessonProgress::from_decks([&deck]));
    state.current_lesson_id = Some(lesson_id);

    let user = UserId::random();
    let course = CourseId::random();
    let mut enrollment = Enrollment::new(user, course, state, fixed_now());
    repo.create_progress(&enrollment).await.unwrap();

    let loaded = repo.get_progress(user, course).await.unwrap();
    assert_eq!(loaded, enrollment);

    let err = repo.create_progress(&enrollment).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let card_key = deck.cards[0].id.key();
    enrollment
        .state
        .answer_card(&lesson_id.key(), &deck.id.key(), &card_key, true, fixed_now())
        .unwrap();
    enrollment.updated_at = fixed_now() + chrono::Duration::minutes(5);
    repo.save_progress(&enrollment).await.unwrap();

    let loaded = repo.get_progress(user, course).await.unwrap();
    assert!(loaded.state.is_lesson_completed(&lesson_id.key()));
    assert_eq!(loaded.updated_at, enrollment.updated_at);
    assert_eq!(loaded.created_at, enrollment.created_at);
}

#[tokio::test]
async fn sqlite_progress_is_isolated_per_user_and_course() {
    let repo = connect("memdb_isolation").await;
    let user = UserId::random();
    let course = CourseId::random();

    let mut state = CourseProgress::new();
    let mut lesson = LessonProgress::default();
    lesson
        .decks
        .insert(DeckId::random().key(), DeckProgress::default());
    state.lessons.insert(LessonId::random().key(), lesson);
    repo.create_progress(&Enrollment::new(user, course, state, fixed_now()))
        .await
        .unwrap();

    let err = repo
        .get_progress(UserId::random(), course)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let stranger = Enrollment::new(user, CourseId::random(), CourseProgress::new(), fixed_now());
    let err = repo.save_progress(&stranger).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}
