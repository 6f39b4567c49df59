//! studygen CLI
//!
//! Generates study material, manages the history, runs terminal reviews
//! and serves the HTTP/WebSocket API.

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use studygen_core::session::load_theme;
use studygen_core::{
    create_router, AppState, Config, Direction, FileStore, Flashcard, FlashcardEvent,
    FlashcardReview, GeminiClient, GenerationMode, GenerationPipeline, GenerationRequest,
    HistoryRecord, HistoryStore, KeyValueStore, McqEvent, McqItem, McqPhase, McqReview,
    StudyDeck, Theme, THEME_KEY,
};
use studygen_export::{export, export_to_path, ExportFormat};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Width of the summary column in `history list`.
const LIST_LABEL_WIDTH: usize = 60;

/// studygen - flashcards and quizzes from your notes
///
/// Turns text or a photo of your notes into flashcards or multiple-choice
/// questions, keeps a history of everything generated and lets you review it.
#[derive(Parser, Debug)]
#[command(name = "studygen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: studygen.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Directory for history and theme storage
    #[arg(short, long, value_name = "DIR", global = true)]
    data_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate flashcards or questions from text or an image
    Generate(GenerateArgs),

    /// List, show or clear past generations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Review a stored record interactively
    Review {
        /// Record id as shown by `history list`
        id: i64,
    },

    /// Export a stored record
    Export {
        /// Record id as shown by `history list`
        id: i64,

        /// Output format: markdown, json or tsv
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Write to this file or directory instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show or set the interface theme
    Theme {
        /// One of default, dark, ocean, sunset
        name: Option<String>,
    },

    /// Serve the HTTP and WebSocket API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(ClapArgs, Debug)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["text", "image"])))]
struct GenerateArgs {
    /// Source text to study
    #[arg(short, long)]
    text: Option<String>,

    /// Image of the source material (jpg, png, gif or webp)
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// flashcards or mcq (default from config)
    #[arg(short, long)]
    mode: Option<String>,

    /// Generate an icon for every item
    #[arg(long)]
    icons: bool,

    /// Start an interactive review when generation finishes
    #[arg(long)]
    review: bool,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List stored records, newest first
    List,
    /// Print one record as Markdown
    Show {
        /// Record id
        id: i64,
    },
    /// Delete every stored record
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.validate()?;
    tracing::debug!(data_dir = %config.data_dir, "Configuration loaded");

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_path()));

    match args.command {
        Command::Generate(generate) => run_generate(&config, storage, generate).await,
        Command::History { action } => run_history(storage, action).await,
        Command::Review { id } => {
            let history = HistoryStore::load(storage);
            let record = history.get(id)?;
            review_record(record)
        }
        Command::Export { id, format, output } => {
            let format: ExportFormat = format.parse()?;
            let history = HistoryStore::load(storage);
            run_export(history.get(id)?, format, output.as_deref())
        }
        Command::Theme { name } => run_theme(storage.as_ref(), name.as_deref()),
        Command::Serve { port } => run_serve(config, storage, port).await,
    }
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Ok(Config::load_from_file(path)?)
        }
        None => Ok(Config::load()?),
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<GenerationPipeline> {
    let client = Arc::new(GeminiClient::from_config(config)?);
    let text: Arc<dyn studygen_core::TextGenerator> = client.clone();
    Ok(GenerationPipeline::new(text, client))
}

async fn run_generate(
    config: &Config,
    storage: Arc<dyn KeyValueStore>,
    args: GenerateArgs,
) -> anyhow::Result<()> {
    let mode = match args.mode.as_deref() {
        Some(mode) => mode.parse::<GenerationMode>().map_err(anyhow::Error::msg)?,
        None => config.default_mode,
    };
    let request = match (args.text, args.image) {
        (Some(text), _) => GenerationRequest::text(text, mode),
        (None, Some(path)) => GenerationRequest::image_file(path, mode),
        (None, None) => anyhow::bail!("Provide --text or --image"),
    }
    .with_icons(args.icons || config.generate_icons);

    let pipeline = build_pipeline(config)?;
    let theme = load_theme(storage.as_ref());
    let history = Mutex::new(HistoryStore::load(storage));

    println!("Generating {mode}...");
    let record = pipeline.generate(request, &history, theme).await.map_err(|e| {
        tracing::error!(error = %e, "Generation failed");
        anyhow::anyhow!("{}", e.user_message())
    })?;

    println!("Saved record {} ({} items)", record.id, record.deck.len());
    println!();
    print_deck(&record.deck);

    if args.review {
        println!();
        review_record(&record)?;
    }
    Ok(())
}

async fn run_history(storage: Arc<dyn KeyValueStore>, action: HistoryAction) -> anyhow::Result<()> {
    let mut history = HistoryStore::load(storage);

    match action {
        HistoryAction::List => {
            if history.is_empty() {
                println!("No history yet");
                return Ok(());
            }
            for record in history.records() {
                println!(
                    "{}  {}  {:<10}  {:>3} items  {}",
                    record.id,
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.mode().as_str(),
                    record.deck.len(),
                    record.label(LIST_LABEL_WIDTH)
                );
            }
        }
        HistoryAction::Show { id } => {
            let record = history.get(id)?;
            print!("{}", export(record, ExportFormat::Markdown)?);
        }
        HistoryAction::Clear => {
            let count = history.len();
            history.clear().await;
            println!("Cleared {count} records");
        }
    }
    Ok(())
}

fn run_export(record: &HistoryRecord, format: ExportFormat, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let written = export_to_path(record, format, path).map_err(|e| {
                anyhow::anyhow!("Failed to write export: {e}\n\nPath: {}", path.display())
            })?;
            println!("Exported record {} as {format} to {}", record.id, written.display());
        }
        None => print!("{}", export(record, format)?),
    }
    Ok(())
}

fn run_theme(storage: &dyn KeyValueStore, name: Option<&str>) -> anyhow::Result<()> {
    match name {
        Some(name) => {
            let theme: Theme = name.parse().map_err(anyhow::Error::msg)?;
            storage.set(THEME_KEY, theme.as_str())?;
            println!("Theme set to {theme}");
        }
        None => {
            let current = load_theme(storage);
            for theme in Theme::ALL {
                let marker = if theme == current { "*" } else { " " };
                println!("{marker} {theme}");
            }
        }
    }
    Ok(())
}

async fn run_serve(config: Config, storage: Arc<dyn KeyValueStore>, port: u16) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let state = AppState::new(config, storage, pipeline);
    let router = create_router(state);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port")
    })?;

    println!("studygen API running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_deck(deck: &StudyDeck) {
    match deck {
        StudyDeck::Flashcards(cards) => {
            for (i, card) in cards.iter().enumerate() {
                println!("{}. {}", i + 1, card.question);
                println!("   -> {}", card.answer);
            }
        }
        StudyDeck::Mcqs(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{}. {}", i + 1, item.question);
                for (n, option) in item.options.iter().enumerate() {
                    let marker = if item.is_correct(option) { "*" } else { " " };
                    println!("   {marker}{}) {option}", n + 1);
                }
            }
        }
    }
}

// ============================================================================
// Interactive review
// ============================================================================

/// A line of input during a review.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReviewCommand {
    Flip,
    Next,
    Previous,
    Restart,
    Choose(usize),
    Quit,
    Unknown,
}

fn parse_review_command(line: &str) -> ReviewCommand {
    let line = line.trim().to_lowercase();
    match line.as_str() {
        "" | "f" | "flip" => ReviewCommand::Flip,
        "n" | "next" => ReviewCommand::Next,
        "p" | "prev" | "previous" => ReviewCommand::Previous,
        "r" | "restart" => ReviewCommand::Restart,
        "q" | "quit" | "exit" => ReviewCommand::Quit,
        other => other
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .map_or(ReviewCommand::Unknown, |n| ReviewCommand::Choose(n - 1)),
    }
}

fn read_command(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> anyhow::Result<ReviewCommand> {
    print!("> ");
    std::io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(parse_review_command(&line?)),
        None => Ok(ReviewCommand::Quit),
    }
}

fn review_record(record: &HistoryRecord) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    match &record.deck {
        StudyDeck::Flashcards(cards) => review_flashcards(cards, &mut lines),
        StudyDeck::Mcqs(items) => review_mcqs(items, &mut lines),
    }
}

fn review_flashcards(
    cards: &[Flashcard],
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> anyhow::Result<()> {
    println!("Enter: flip   n: next   p: previous   q: quit");
    let mut review = FlashcardReview::new(cards.len());

    loop {
        let Some(card) = cards.get(review.current_index()) else {
            return Ok(());
        };
        println!();
        println!("[{}/{}] {}", review.current_index() + 1, review.len(), card.question);
        if review.is_flipped() {
            println!("  -> {}", card.answer);
        }

        review = match read_command(lines)? {
            ReviewCommand::Flip => review.apply(FlashcardEvent::Flip),
            ReviewCommand::Next => review.navigate(Direction::Forward),
            ReviewCommand::Previous => review.navigate(Direction::Backward),
            ReviewCommand::Quit => return Ok(()),
            _ => review,
        };
    }
}

fn review_mcqs(
    items: &[McqItem],
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> anyhow::Result<()> {
    println!("1-4: answer   n: next   r: restart   q: quit");
    let mut review = McqReview::new(items.len());

    loop {
        match review.phase() {
            McqPhase::Finished => {
                println!();
                println!("Quiz complete! Score: {}/{}", review.score(), review.len());
                println!("r: restart   q: quit");
            }
            McqPhase::Answering(index) | McqPhase::Answered(index) => {
                let Some(item) = items.get(index) else {
                    return Ok(());
                };
                println!();
                println!("[{}/{}] {}", index + 1, review.len(), item.question);
                for (n, option) in item.options.iter().enumerate() {
                    println!("  {}) {option}", n + 1);
                }
                if let Some(selected) = review.selected() {
                    if item.is_correct(selected) {
                        println!("Correct!");
                    } else {
                        println!("Incorrect. The answer is: {}", item.correct_answer);
                    }
                }
            }
        }

        let event = match read_command(lines)? {
            ReviewCommand::Choose(n) => match review.phase() {
                McqPhase::Answering(index) => items
                    .get(index)
                    .and_then(|item| item.options.get(n))
                    .map(|option| McqEvent::Select(option.clone())),
                _ => None,
            },
            ReviewCommand::Next => Some(McqEvent::Next),
            ReviewCommand::Restart => Some(McqEvent::Restart),
            ReviewCommand::Quit => return Ok(()),
            _ => None,
        };
        if let Some(event) = event {
            review = review.apply(items, event);
        }
    }
}
