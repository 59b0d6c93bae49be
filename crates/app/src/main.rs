use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use lesson_core::model::{LessonCatalog, ProgressError};
use services::{Clock, LearnerProgressService, LessonLoopService};
use storage::json::JsonQuestionBank;
use storage::repository::{QuestionBank, Storage};

mod args;
mod play;

use args::{Args, ArgsError, Command, print_usage};

/// Stderr logging, `warn` unless `RUST_LOG` says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Question source and catalog: the JSON directory when given, else the database.
async fn lesson_source(
    args: &Args,
    storage: &Storage,
) -> Result<(Arc<dyn QuestionBank>, LessonCatalog), Box<dyn std::error::Error>> {
    if let Some(dir) = &args.lessons_dir {
        let bank = JsonQuestionBank::new(dir);
        let catalog = bank
            .catalog()
            .await
            .map_err(|e| format!("no lessons found in {}: {e}", dir.display()))?;
        let bank: Arc<dyn QuestionBank> = Arc::new(bank);
        return Ok((bank, catalog));
    }

    let lessons = storage.content.list_lessons().await?;
    let catalog = LessonCatalog::from_lessons(lessons).map_err(|e| match e {
        ProgressError::EmptyCatalog => {
            "database holds no lessons; run `import --lessons <dir>` first".to_owned()
        }
        other => format!("database lessons are incomplete: {other}"),
    })?;
    Ok((Arc::clone(&storage.questions), catalog))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: play when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.to_string())
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(command = ?cmd, db = %parsed.db_url, "starting");

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_dir(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let clock = Clock::System;

    match cmd {
        Command::Play => {
            let (questions, catalog) = lesson_source(&parsed, &storage).await?;
            let loop_svc = LessonLoopService::new(
                clock,
                catalog,
                questions,
                Arc::clone(&storage.reports),
                Arc::clone(&storage.progress),
            )
            .with_settings(parsed.settings)
            .with_shuffle(parsed.shuffle);

            let mut run = loop_svc.start_lesson(parsed.learner, parsed.lesson).await?;
            let mut input = tokio::io::BufReader::new(tokio::io::stdin());
            let mut out = std::io::stdout();
            let finish = play::play(&loop_svc, &mut run, &mut input, &mut out).await?;
            play::render_finish(&mut out, &finish)?;
            Ok(())
        }
        Command::Import => {
            let dir = parsed.lessons_dir.ok_or(ArgsError::MissingLessonsDir)?;
            let bank = JsonQuestionBank::new(dir);
            let lessons = bank.list_lessons().await?;
            for lesson in &lessons {
                let questions = bank.load_questions(*lesson).await?;
                storage.content.replace_questions(*lesson, &questions).await?;
                println!("imported {lesson}: {} questions", questions.len());
            }
            println!("{} lessons imported into {}", lessons.len(), parsed.db_url);
            Ok(())
        }
        Command::Progress => {
            let (_, catalog) = lesson_source(&parsed, &storage).await?;
            let svc = LearnerProgressService::new(clock, catalog, Arc::clone(&storage.progress));
            let progress = svc.progress(parsed.learner).await?;
            println!("XP: {}", progress.xp());
            println!("Streak: {} day(s)", svc.current_streak(parsed.learner).await?);
            for status in svc.lesson_map(parsed.learner).await? {
                let mark = if status.unlocked { "x" } else { " " };
                println!("  [{mark}] {}", status.lesson);
            }
            println!("Next: {}", svc.next_lesson(parsed.learner).await?);
            Ok(())
        }
    }
}

fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
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

    // The database file itself is created on connect.
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
