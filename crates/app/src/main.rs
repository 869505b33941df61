use std::fmt;
use std::str::FromStr;

use course_core::model::{
    AnswerId, Card, CardId, CardKind, CourseDraft, CourseId, Deck, DeckId, LessonDraft, LessonId,
    PossibleAnswer, UserId,
};
use serde_json::json;
use services::{AppServices, BrowseOptions, CardAnswer, Clock, DeckClientConfig};
use storage::repository::{CourseRepository, DeckRepository, ProgressRepository};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";
const DEFAULT_LOG_FILTER: &str = "services=info,storage=info,app=info";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidAnswer { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidAnswer { raw } => {
                write!(f, "invalid --answer value (expected <card>=<answer>): {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id<T: FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn parse_answer(raw: String) -> Result<CardAnswer, ArgsError> {
    let Some((card, answer)) = raw.split_once('=') else {
        return Err(ArgsError::InvalidAnswer { raw });
    };
    match (card.trim().parse::<CardId>(), answer.trim().parse::<AnswerId>()) {
        (Ok(card_id), Ok(answer_id)) => Ok(CardAnswer::new(card_id, answer_id)),
        _ => Err(ArgsError::InvalidAnswer { raw }),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- seed    [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- enroll  --user <id> --course <id>");
    eprintln!(
        "  cargo run -p app -- answer  --user <id> --course <id> --lesson <id> --deck <id> --answer <card>=<answer>..."
    );
    eprintln!("  cargo run -p app -- sync    --user <id> --course <id>");
    eprintln!("  cargo run -p app -- lessons --course <id> [--user <id>] [--bodyless]");
    eprintln!("  cargo run -p app -- show    --user <id> --course <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_DECKS_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    Enroll,
    Answer,
    Sync,
    Lessons,
    Show,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "enroll" => Some(Self::Enroll),
            "answer" => Some(Self::Answer),
            "sync" => Some(Self::Sync),
            "lessons" => Some(Self::Lessons),
            "show" => Some(Self::Show),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    user_id: Option<UserId>,
    course_id: Option<CourseId>,
    lesson_id: Option<LessonId>,
    deck_id: Option<DeckId>,
    answers: Vec<CardAnswer>,
    bodyless: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("COURSE_DB_URL")
                .ok()
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    parsed.user_id = Some(parse_id("--user", require_value(args, "--user")?)?);
                }
                "--course" => {
                    parsed.course_id =
                        Some(parse_id("--course", require_value(args, "--course")?)?);
                }
                "--lesson" => {
                    parsed.lesson_id =
                        Some(parse_id("--lesson", require_value(args, "--lesson")?)?);
                }
                "--deck" => {
                    parsed.deck_id = Some(parse_id("--deck", require_value(args, "--deck")?)?);
                }
                "--answer" => {
                    parsed
                        .answers
                        .push(parse_answer(require_value(args, "--answer")?)?);
                }
                "--bodyless" => parsed.bodyless = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn user(&self) -> Result<UserId, ArgsError> {
        self.user_id.ok_or(ArgsError::MissingFlag { flag: "--user" })
    }

    fn course(&self) -> Result<CourseId, ArgsError> {
        self.course_id
            .ok_or(ArgsError::MissingFlag { flag: "--course" })
    }

    fn lesson(&self) -> Result<LessonId, ArgsError> {
        self.lesson_id
            .ok_or(ArgsError::MissingFlag { flag: "--lesson" })
    }

    fn deck(&self) -> Result<DeckId, ArgsError> {
        self.deck_id.ok_or(ArgsError::MissingFlag { flag: "--deck" })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.contains("mode=memory") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // in-memory URLs need no file
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn demo_card(title: &str, right: &str, wrong: &[&str]) -> Card {
    let mut answers = vec![PossibleAnswer::new(AnswerId::random(), right, true)];
    answers.extend(
        wrong
            .iter()
            .map(|text| PossibleAnswer::new(AnswerId::random(), *text, false)),
    );
    Card::new(CardId::random(), title, answers)
}

/// Store a small three-lesson course and print its identifiers.
async fn seed(services: &AppServices, clock: Clock) -> Result<(), Box<dyn std::error::Error>> {
    let storage = services.storage();
    let now = clock.now();

    let course = CourseDraft {
        order: 1,
        title: "Ownership in Rust".into(),
        description: "Moves, borrows and lifetimes, one deck at a time.".into(),
    }
    .validate(CourseId::random(), now)?;
    storage.courses.upsert_course(&course).await?;

    let mut moves = Deck::new(
        DeckId::random(),
        "Moves",
        vec![
            demo_card(
                "What happens to `a` after `let b = a;` for a String?",
                "It is moved",
                &["It is copied", "It is cloned"],
            ),
            demo_card(
                "Which trait makes assignment copy instead of move?",
                "Copy",
                &["Clone", "Send"],
            ),
        ],
    );
    moves.description = "Ownership transfer".into();

    let borrows = Deck::new(
        DeckId::random(),
        "Borrows",
        vec![demo_card(
            "How many `&mut` borrows may be live at once?",
            "One",
            &["Two", "Unlimited"],
        )],
    );

    let mut blanks = demo_card("A reference must never outlive its ___", "referent", &[]);
    blanks.kind = CardKind::FillInTheBlanks;
    let lifetimes = Deck::new(DeckId::random(), "Lifetimes", vec![blanks]);

    for deck in [&moves, &borrows, &lifetimes] {
        storage.decks.upsert_deck(deck).await?;
    }

    let plan = [
        ("Moves", vec![&moves]),
        ("Borrowing", vec![&borrows, &moves]),
        ("Lifetimes", vec![&lifetimes]),
    ];
    let mut lessons = Vec::with_capacity(plan.len());
    for (order, (title, decks)) in (1_i64..).zip(plan) {
        let mut body = format!("# {title}\n\nWork through the decks below.\n");
        for deck in &decks {
            body.push_str(&format!("\n![deck]({})\n", deck.id));
        }
        let lesson = LessonDraft {
            course_id: course.id,
            order,
            title: title.into(),
            description: format!("Lesson {order} of the ownership course"),
            body,
        }
        .validate(LessonId::random(), now)?;
        storage.courses.upsert_lesson(&lesson).await?;
        lessons.push(json!({
            "id": lesson.id,
            "title": lesson.title,
            "decks": decks,
        }));
    }

    tracing::info!(course_id = %course.id, lessons = lessons.len(), "demo course seeded");
    print_json(&json!({ "course_id": course.id, "lessons": lessons }))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let clock = Clock::default();
    let services =
        AppServices::new_sqlite(&args.db_url, clock, DeckClientConfig::from_env()).await?;

    match cmd {
        Command::Seed => seed(&services, clock).await,
        Command::Enroll => {
            let enrollment = services
                .enrollment()
                .enroll(args.user()?, args.course()?)
                .await?;
            print_json(&enrollment)
        }
        Command::Answer => {
            let outcome = services
                .answers()
                .answer(
                    args.user()?,
                    args.course()?,
                    args.lesson()?,
                    args.deck()?,
                    &args.answers,
                )
                .await?;
            print_json(&outcome)
        }
        Command::Sync => {
            let enrollment = services.sync().sync(args.user()?, args.course()?).await?;
            print_json(&enrollment)
        }
        Command::Lessons => {
            let options = BrowseOptions {
                user_id: args.user_id,
                bodyless: args.bodyless,
            };
            let result = services.lessons().browse(args.course()?, options).await?;
            print_json(&result)
        }
        Command::Show => {
            let enrollment = services
                .storage()
                .progress
                .get_progress(args.user()?, args.course()?)
                .await?;
            print_json(&enrollment)
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
