mod play;

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lab_core::TRIGGER_TOLERANCE_SECS;
use lab_core::model::{LessonDefinition, ProgressState};
use services::LessonProgress;
use storage::repository::{DEFAULT_SESSION_KEY, ProgressRepository, Storage};
use tracing_subscriber::EnvFilter;

use crate::play::{PlayOptions, play_lesson};

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
    InvalidStep { raw: f64 },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStep { raw } => write!(
                f,
                "--step must be positive and below {MAX_STEP_SECS}s so no checkpoint is skipped, got {raw}"
            ),
        }
    }
}

impl Error for ArgsError {}

#[derive(Parser)]
#[command(name = "orbital-lab")]
#[command(about = "Video lessons that pause for quizzes at fixed checkpoints", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database URL for saved progress
    #[arg(long = "db", env = "LAB_DB_URL", default_value = "sqlite://orbital-lab.sqlite3", global = true)]
    db_url: String,

    /// Storage key of the learner's progress record
    #[arg(long = "session", env = "LAB_SESSION_KEY", default_value = DEFAULT_SESSION_KEY, global = true)]
    session_key: String,

    /// Lesson JSON file (defaults to the built-in Earth Observation lesson)
    #[arg(long, env = "LAB_LESSON", global = true)]
    lesson: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the lesson, answering each checkpoint from stdin
    Run {
        /// Answer every checkpoint correctly without prompting
        #[arg(long)]
        auto: bool,

        /// Simulated seconds per frame
        #[arg(long, default_value_t = 0.25)]
        step: f64,
    },

    /// Show saved progress for the session key
    Status,

    /// Check the lesson configuration
    Validate,
}

/// Frames as wide as a trigger window could jump over a checkpoint.
const MAX_STEP_SECS: f64 = 2.0 * TRIGGER_TOLERANCE_SECS;

fn check_step(step: f64) -> Result<f64, ArgsError> {
    if !step.is_finite() || step <= 0.0 || step >= MAX_STEP_SECS {
        return Err(ArgsError::InvalidStep { raw: step });
    }
    Ok(step)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_lesson(path: Option<&Path>) -> Result<LessonDefinition, Box<dyn Error>> {
    let lesson = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            LessonDefinition::from_json(&raw)?
        }
        None => LessonDefinition::earth_observation_101()?,
    };
    Ok(lesson)
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
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

async fn open_storage(raw_url: &str) -> Result<Storage, Box<dyn Error>> {
    if raw_url.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: raw_url.to_string(),
        }
        .into());
    }
    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let db_url = normalize_sqlite_url(raw_url);
    prepare_sqlite_file(&db_url)?;
    Ok(Storage::sqlite(&db_url).await?)
}

fn print_progress(lesson: &LessonDefinition, progress: &LessonProgress) {
    println!("lesson       {} ({})", lesson.lesson.lesson_id, lesson.lesson.title);
    println!(
        "completed    {}/{} ({:.0}%)",
        progress.completed, progress.total, progress.percentage
    );
    println!("attempts     {}", progress.attempts);
    println!("story steps  {}", progress.story_steps);
    println!("secrets      {}", progress.secrets);
    println!("view mode    {}", progress.view_mode);
    println!(
        "position     {:.1}s / {:.0}s",
        progress.current_time, progress.duration
    );
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let lesson = load_lesson(cli.lesson.as_deref())?;

    match cli.command {
        Commands::Validate => {
            let registry = lesson.registry()?;
            println!(
                "{}: {} checkpoints, {} interactions, {:.0}s",
                lesson.lesson.lesson_id,
                registry.len(),
                registry.definitions().count(),
                lesson.lesson.duration_secs
            );
            Ok(())
        }
        Commands::Status => {
            let registry = lesson.registry()?;
            let storage = open_storage(&cli.db_url).await?;
            let state = storage
                .progress
                .load_progress(&cli.session_key)
                .await?
                .map(ProgressState::from_snapshot)
                .unwrap_or_default();
            let progress = LessonProgress::compute(&registry, &state, lesson.lesson.duration_secs);
            print_progress(&lesson, &progress);
            Ok(())
        }
        Commands::Run { auto, step } => {
            let step = check_step(step)?;
            let storage = open_storage(&cli.db_url).await?;
            let options = PlayOptions { auto, step };
            let mut input = std::io::stdin().lock();
            let progress = play_lesson(
                &lesson,
                storage.progress,
                &cli.session_key,
                &options,
                &mut input,
            )
            .await?;
            println!();
            print_progress(&lesson, &progress);
            Ok(())
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
