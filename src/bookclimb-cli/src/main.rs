//! BookClimb CLI - reading quiz and debate practice
//!
//! Runs the reading-comprehension flows against an OpenAI-compatible API.

use bookclimb_core::{
    Config, DebateEngine, DebateEvent, DebateTopic, DifficultyTier, EventCategory, EventSink,
    JsonLinesSink, LexiconFilter, OpenAiGenerator, QuizDraft, ReadingSession, Side, Speaker,
    TextGenerator, TracingSink, TurnOutcome, essay, events, quiz, topic,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

const TOPIC_ATTEMPTS: usize = 2;
const WRAP_WIDTH: usize = 66;

#[derive(Parser)]
#[command(
    name = "bookclimb",
    version,
    about = "Reading quiz and debate practice for young readers",
    long_about = "Generates reading quizzes and runs book debates against an OpenAI-compatible API."
)]
struct Cli {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model name, overrides the configuration
    #[arg(short, long, global = true, value_name = "MODEL")]
    model: Option<String>,

    /// Difficulty tier: easy, standard or advanced (쉬움, 기본, 심화)
    #[arg(short, long, global = true, default_value = "standard", value_name = "TIER")]
    tier: String,

    /// Student identifier; learning events are recorded when set
    #[arg(long, global = true, value_name = "ID")]
    student: Option<String>,

    /// Append learning events to this JSON lines file instead of the log
    #[arg(long, global = true, value_name = "PATH")]
    events: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a sentence into a debate topic (no API call)
    Normalize {
        #[arg(value_name = "SENTENCE")]
        sentence: String,

        /// Use the "…하는 것이 옳다." ending when one has to be added
        #[arg(long)]
        alternate: bool,
    },
    /// Recommend two debate topics for a book
    Topics {
        #[command(flatten)]
        book: BookArgs,
    },
    /// Take a five-question quiz about a book
    Quiz {
        #[command(flatten)]
        book: BookArgs,
    },
    /// Debate a topic against the generated opponent
    Debate {
        #[command(flatten)]
        book: BookArgs,

        /// Debate topic; recommended from the book when omitted
        #[arg(long, value_name = "TOPIC")]
        topic: Option<String>,

        /// Your side: for or against (찬성, 반대)
        #[arg(long, default_value = "for", value_name = "SIDE")]
        side: String,

        /// Write the debate record to this file
        #[arg(long, value_name = "PATH")]
        record: Option<PathBuf>,
    },
    /// Get feedback on a book report (read from stdin when no essay is given)
    Essay {
        #[command(flatten)]
        book: BookArgs,

        /// Essay text
        #[arg(long, value_name = "TEXT", conflicts_with = "essay_file")]
        essay: Option<String>,

        /// File containing the essay
        #[arg(long, value_name = "PATH")]
        essay_file: Option<PathBuf>,
    },
}

#[derive(Args)]
struct BookArgs {
    /// Book title
    #[arg(long, value_name = "TITLE")]
    title: String,

    /// Synopsis text
    #[arg(long, value_name = "TEXT", conflicts_with = "synopsis_file")]
    synopsis: Option<String>,

    /// File containing the synopsis
    #[arg(long, value_name = "PATH")]
    synopsis_file: Option<PathBuf>,
}

impl BookArgs {
    async fn load_synopsis(&self) -> Result<String, Box<dyn std::error::Error>> {
        match (&self.synopsis, &self.synopsis_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => Ok(tokio::fs::read_to_string(path).await.map_err(|e| {
                format!("Failed to read synopsis {}: {}", path.display(), e)
            })?),
            (None, None) => Err("Either --synopsis or --synopsis-file is required".into()),
        }
    }
}

/// Everything a command needs once configuration has been resolved.
struct App {
    config: Config,
    generator: Arc<dyn TextGenerator>,
    sink: Box<dyn EventSink>,
    session: ReadingSession,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Normalize {
        sentence,
        alternate,
    } = &cli.command
    {
        println!("{}", topic::normalize(sentence, *alternate));
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(model) = &cli.model {
        config.generator.model = model.clone();
    }
    let tier: DifficultyTier = cli.tier.parse()?;
    tracing::debug!(model = %config.generator.model, %tier, "Configuration resolved");

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
        bookclimb_core::GeneratorSettings::new(api_base, api_key, config.generator.model.clone()),
    )?);
    let sink: Box<dyn EventSink> = match &cli.events {
        Some(path) => Box::new(JsonLinesSink::new(path)),
        None => Box::new(TracingSink),
    };

    let mut app = App {
        config,
        generator,
        sink,
        session: ReadingSession::new(cli.student.clone().unwrap_or_default(), tier),
    };

    match cli.command {
        Command::Normalize { .. } => {}
        Command::Topics { book } => {
            app.session.select_book(&book.title, book.load_synopsis().await?);
            run_topics(&mut app).await?;
        }
        Command::Quiz { book } => {
            app.session.select_book(&book.title, book.load_synopsis().await?);
            run_quiz(&mut app, cli.student.is_some()).await?;
        }
        Command::Debate {
            book,
            topic,
            side,
            record,
        } => {
            let side: Side = side.parse()?;
            app.session.select_book(&book.title, book.load_synopsis().await?);
            run_debate(&mut app, topic, side, record, cli.student.is_some()).await?;
        }
        Command::Essay {
            book,
            essay,
            essay_file,
        } => {
            app.session.select_book(&book.title, book.load_synopsis().await?);
            let text = match (essay, essay_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                    format!("Failed to read essay {}: {}", path.display(), e)
                })?,
                (None, None) => {
                    let mut text = String::new();
                    tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut text)
                        .await?;
                    text
                }
            };
            run_essay(&mut app, &text, cli.student.is_some()).await?;
        }
    }

    Ok(())
}

fn print_header(title: &str, subtitle: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "BookClimb".bold(), subtitle)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Book:".bold(), title.bright_white());
    println!();
}

fn book_of(app: &App) -> Result<(String, String), Box<dyn std::error::Error>> {
    let book = app.session.book().ok_or("No book selected")?;
    Ok((book.title.clone(), book.synopsis.clone()))
}

async fn recommend(app: &mut App) -> Result<[DebateTopic; 2], Box<dyn std::error::Error>> {
    let (title, synopsis) = book_of(app)?;
    let topics = topic::recommend_topics(
        app.generator.as_ref(),
        &title,
        &synopsis,
        app.session.topics(),
        &app.config.generator,
        TOPIC_ATTEMPTS,
    )
    .await;
    app.session.add_topics(topics.clone());
    Ok(topics)
}

async fn run_topics(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    let (title, _) = book_of(app)?;
    print_header(&title, "Debate topics");

    for (i, topic) in recommend(app).await?.iter().enumerate() {
        println!("  {}. {}", i + 1, topic.as_str().bright_cyan());
    }
    println!();
    Ok(())
}

async fn run_quiz(app: &mut App, record: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (title, synopsis) = book_of(app)?;
    let tier = app.session.tier();
    print_header(&title, &format!("Quiz ({})", tier.label()));

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let quiz_set = loop {
        let draft = quiz::generate_quiz(
            app.generator.as_ref(),
            &title,
            &synopsis,
            tier,
            &app.config,
        )
        .await?;

        match draft {
            QuizDraft::Ready(quiz_set) => break quiz_set,
            QuizDraft::Rejected { reason, raw } => {
                eprintln!("{} {}", "Quiz rejected:".red().bold(), reason);
                eprintln!("{}", raw.dimmed());
                let answer = prompt_line(&mut input, "다시 만들까요? (y/n)").await?;
                if !answer.as_deref().is_some_and(wants_retry) {
                    return Err(format!("Quiz rejected: {}", reason).into());
                }
            }
        }
    };

    let attempt = app.session.install_quiz(quiz_set)?;

    for index in 0..attempt.quiz().items().len() {
        let item = attempt
            .quiz()
            .get(index)
            .ok_or("Quiz item disappeared")?
            .clone();
        println!("{}", format!("Q{}. {}", index + 1, item.question()).bold());
        for (n, option) in item.options().iter().enumerate() {
            println!("   {}) {}", n + 1, option);
        }

        loop {
            let Some(line) = prompt_line(&mut input, "정답 번호 (1-4)").await? else {
                return Ok(());
            };
            match line.parse::<u8>() {
                Ok(choice) if attempt.choose(index, choice).is_ok() => break,
                _ => println!("{}", "1에서 4 사이의 번호를 입력하세요.".yellow()),
            }
        }
        println!();
    }

    let grade = attempt.grade()?;
    println!("{}", "─".repeat(70).dimmed());
    for (i, (ok, item)) in grade.correct.iter().zip(attempt.quiz().items()).enumerate() {
        let mark = if *ok { "⭕".green() } else { "❌".red() };
        println!("  문제 {}: {} (정답: {})", i + 1, mark, item.correct_text());
    }
    println!();
    println!("{}", format!("  총점: {} / 100", grade.score).bright_green().bold());
    println!();

    match quiz::explain_attempt(app.generator.as_ref(), attempt, tier, &app.config).await {
        Ok(explanation) => println!("{}", textwrap(&explanation, WRAP_WIDTH)),
        Err(e) => eprintln!("{} {}", "Explanation unavailable:".yellow(), e),
    }

    if record {
        let payload = events::quiz_payload(&title, &grade, tier);
        events::record_event(
            app.sink.as_ref(),
            app.session.student_id(),
            EventCategory::Quiz,
            payload,
        )
        .await;
    }
    Ok(())
}

async fn run_debate(
    app: &mut App,
    topic: Option<String>,
    side: Side,
    record_path: Option<PathBuf>,
    record: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (title, synopsis) = book_of(app)?;
    let tier = app.session.tier();

    let topic = match topic {
        Some(candidate) => DebateTopic::new(&candidate, false),
        None => {
            let [first, _] = recommend(app).await?;
            first
        }
    };

    print_header(&title, &format!("Debate ({})", tier.label()));
    println!("{} {}", "Topic:".bold(), topic.as_str().bright_white());
    println!(
        "{} {}",
        "Your side:".bold(),
        side.display_name().yellow()
    );
    println!("{}", "Type /quit to stop.".dimmed());
    println!("{}", "─".repeat(70).dimmed());

    let safety = LexiconFilter::from_config(&app.config.safety)?;
    let engine = DebateEngine::new(app.generator.clone(), Arc::new(safety), app.config.clone())
        .with_callback(create_console_callback());

    let debate = engine.start(topic, tier, side, &synopsis);
    let session = app.session.install_debate(debate)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    while let Some(speaker) = session.next_speaker() {
        match speaker {
            Speaker::Participant => {
                let Some(line) = prompt_line(&mut input, "발언").await? else {
                    return Ok(());
                };
                if line.is_empty() {
                    continue;
                }
                if let TurnOutcome::Rejected { .. } = engine.submit_turn(session, &line).await? {
                    continue;
                }
            }
            Speaker::Opponent => engine.opponent_turn(session).await?,
        }
    }

    println!("{}", "  Scoring...".dimmed());
    let outcome = engine.conclude(session).await?.clone();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "  찬성 {}점 / 반대 {}점, 승리: {}",
        outcome.score.for_side.total.to_string().bright_cyan(),
        outcome.score.against_side.total.to_string().bright_cyan(),
        outcome.score.winner.display_name().bright_green().bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{}", textwrap(&outcome.feedback, WRAP_WIDTH));
    println!();

    if let Some(path) = record_path {
        tokio::fs::write(&path, session.record_text(&title)).await?;
        println!("{} {}", "Record saved to".dimmed(), path.display());
    }

    if record {
        let payload = events::debate_payload(&title, session);
        events::record_event(
            app.sink.as_ref(),
            app.session.student_id(),
            EventCategory::Debate,
            payload,
        )
        .await;
    }

    println!("{}", "  Debate concluded.".bright_green().bold());
    Ok(())
}

async fn run_essay(
    app: &mut App,
    essay: &str,
    record: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (title, synopsis) = book_of(app)?;
    let tier = app.session.tier();
    print_header(&title, &format!("Essay feedback ({})", tier.label()));

    let feedback = essay::request_essay_feedback(
        app.generator.as_ref(),
        &title,
        &synopsis,
        essay,
        tier,
        &app.config,
    )
    .await?;

    println!("{}", "피드백 결과".bold());
    println!("{}", textwrap(&feedback, WRAP_WIDTH));
    println!();

    if record {
        let payload = events::essay_payload(&title, essay.trim(), &feedback, tier);
        events::record_event(
            app.sink.as_ref(),
            app.session.student_id(),
            EventCategory::Essay,
            payload,
        )
        .await;
    }
    Ok(())
}

/// Whether a reply to a yes/no prompt means yes.
fn wants_retry(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "네" | "응" | "ㅇ"
    )
}

/// Read one trimmed line. `None` on end of input or `/quit`.
async fn prompt_line(
    input: &mut Lines<BufReader<Stdin>>,
    label: &str,
) -> Result<Option<String>, std::io::Error> {
    use std::io::Write;

    print!("{} ", format!("{} >", label).bright_cyan());
    std::io::stdout().flush()?;

    Ok(input
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .filter(|line| line != "/quit"))
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::RoundStart {
            index,
            label,
            speaker,
        } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  📢 {}라운드: {}", index, label)
                    .bright_magenta()
                    .bold()
            );
            println!("  {}", format!("{} 차례", speaker.display_name()).dimmed());
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        DebateEvent::SpeakerMessage {
            speaker,
            label,
            content,
        } => {
            if speaker == Speaker::Opponent {
                println!(
                    "{} {} {}",
                    "▶".bright_cyan(),
                    speaker.display_name().bright_cyan().bold(),
                    format!("({})", label).yellow()
                );
                let wrapped = textwrap(&content, WRAP_WIDTH);
                for line in wrapped.lines() {
                    println!("  {}", line);
                }
                println!();
            }
        }
        DebateEvent::TurnRejected { suggestion } => {
            println!(
                "{}",
                "⚠️ 바르고 고운말을 사용해 주세요. 이렇게 바꿔 볼까요?"
                    .red()
                    .bold()
            );
            println!("  {}", suggestion.yellow());
            println!();
        }
        DebateEvent::DebateEnd => {
            // Handled in run_debate
        }
    })
}

/// Simple text wrapping function. Keeps paragraph breaks.
fn textwrap(text: &str, width: usize) -> String {
    text.lines()
        .map(|paragraph| {
            let mut result = String::new();
            let mut current_line_len = 0;

            for word in paragraph.split_whitespace() {
                let word_len = word.chars().count();
                if current_line_len + word_len + 1 > width && current_line_len > 0 {
                    result.push('\n');
                    current_line_len = 0;
                }
                if current_line_len > 0 {
                    result.push(' ');
                    current_line_len += 1;
                }
                result.push_str(word);
                current_line_len += word_len;
            }
            result
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textwrap_counts_characters() {
        let wrapped = textwrap("가나다 라마바 사아자", 7);
        assert_eq!(wrapped, "가나다 라마바\n사아자");
    }

    #[test]
    fn test_textwrap_keeps_paragraphs() {
        assert_eq!(textwrap("one two\nthree", 80), "one two\nthree");
    }

    #[test]
    fn test_retry_answers() {
        assert!(wants_retry("y"));
        assert!(wants_retry(" YES "));
        assert!(wants_retry("네"));
        assert!(!wants_retry("n"));
        assert!(!wants_retry(""));
    }

    #[test]
    fn test_cli_parses_essay_command() {
        let cli = Cli::try_parse_from([
            "bookclimb",
            "essay",
            "--title",
            "어린 왕자",
            "--synopsis",
            "줄거리",
            "--essay",
            "재미있었다.",
        ])
        .unwrap();
        match cli.command {
            Command::Essay { essay, essay_file, .. } => {
                assert_eq!(essay.as_deref(), Some("재미있었다."));
                assert!(essay_file.is_none());
            }
            _ => panic!("expected essay command"),
        }
    }

    #[test]
    fn test_cli_parses_debate_command() {
        let cli = Cli::try_parse_from([
            "bookclimb",
            "--tier",
            "easy",
            "debate",
            "--title",
            "어린 왕자",
            "--synopsis",
            "줄거리",
            "--side",
            "반대",
        ])
        .unwrap();
        assert_eq!(cli.tier, "easy");
        match cli.command {
            Command::Debate { book, side, topic, .. } => {
                assert_eq!(book.title, "어린 왕자");
                assert_eq!(side, "반대");
                assert!(topic.is_none());
            }
            _ => panic!("expected debate command"),
        }
    }
}
