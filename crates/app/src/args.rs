use std::fmt;
use std::path::PathBuf;

use lesson_core::model::{LearnerId, LessonId, LessonSettings};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLesson { raw: String },
    InvalidLearner { raw: String },
    InvalidMaxLives { raw: String },
    InvalidDbUrl { raw: String },
    MissingLessonsDir,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLesson { raw } => {
                write!(f, "invalid --lesson value: {raw} (expected <chapter>-<set>)")
            }
            ArgsError::InvalidLearner { raw } => write!(f, "invalid --learner value: {raw}"),
            ArgsError::InvalidMaxLives { raw } => write!(f, "invalid --max-lives value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingLessonsDir => write!(f, "import requires --lessons <dir>"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Import,
    Progress,
}

impl Command {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "import" => Some(Self::Import),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: String,
    /// Directory of `<chapter>-<set>.json` lesson files.
    pub lessons_dir: Option<PathBuf>,
    pub lesson: LessonId,
    pub learner: LearnerId,
    pub settings: LessonSettings,
    pub shuffle: bool,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play     [--db <sqlite_url>] [--lessons <dir>] [--lesson <c-s>]");
    eprintln!("                               [--learner <id>] [--max-lives <n>] [--shuffle]");
    eprintln!("  cargo run -p app -- import   --lessons <dir> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>] [--lessons <dir>] [--learner <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:lessons.sqlite3");
    eprintln!("  --lesson 1-1");
    eprintln!("  --learner 1");
    eprintln!("  --max-lives 5");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LESSON_DB_URL, LESSON_DIR, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    /// Parse flags for `command`, starting from environment defaults.
    pub fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("LESSON_DB_URL")
            .map_or_else(|| normalize_sqlite_url("lessons.sqlite3".into()), normalize_sqlite_url);
        let mut lessons_dir = env("LESSON_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let mut lesson = LessonId::first();
        let mut learner = LearnerId::new(1);
        let mut settings = LessonSettings::default();
        let mut shuffle = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--lessons" => {
                    lessons_dir = Some(PathBuf::from(require_value(args, "--lessons")?));
                }
                "--lesson" => {
                    let value = require_value(args, "--lesson")?;
                    lesson = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLesson { raw: value.clone() })?;
                }
                "--learner" => {
                    let value = require_value(args, "--learner")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLearner { raw: value.clone() })?;
                    learner = LearnerId::new(parsed);
                }
                "--max-lives" => {
                    let value = require_value(args, "--max-lives")?;
                    settings = value
                        .parse::<u32>()
                        .ok()
                        .and_then(|n| LessonSettings::new(n).ok())
                        .ok_or_else(|| ArgsError::InvalidMaxLives { raw: value.clone() })?;
                }
                "--shuffle" => shuffle = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if command == Command::Import && lessons_dir.is_none() {
            return Err(ArgsError::MissingLessonsDir);
        }

        Ok(Self {
            db_url,
            lessons_dir,
            lesson,
            learner,
            settings,
            shuffle,
        })
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(command: Command, argv: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = argv.iter().map(|s| (*s).to_string());
        Args::parse(command, &mut iter, |_| None)
    }

    #[test]
    fn defaults_start_at_first_lesson() {
        let args = parse(Command::Play, &[]).unwrap();
        assert_eq!(args.lesson, LessonId::first());
        assert_eq!(args.learner, LearnerId::new(1));
        assert_eq!(args.settings.max_lives(), 5);
        assert!(args.db_url.starts_with("sqlite://"));
        assert!(args.db_url.ends_with("lessons.sqlite3"));
        assert!(!args.shuffle);
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(
            Command::Play,
            &[
                "--db",
                "sqlite:///tmp/x.db",
                "--lesson",
                "2-3",
                "--learner",
                "9",
                "--max-lives",
                "3",
                "--shuffle",
            ],
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite:///tmp/x.db");
        assert_eq!(args.lesson, LessonId::new(2, 3).unwrap());
        assert_eq!(args.learner, LearnerId::new(9));
        assert_eq!(args.settings.max_lives(), 3);
        assert!(args.shuffle);
    }

    #[test]
    fn environment_supplies_db_and_lessons_dir() {
        let mut iter = std::iter::empty::<String>();
        let args = Args::parse(Command::Import, &mut iter, |key| match key {
            "LESSON_DB_URL" => Some("sqlite::memory:".into()),
            "LESSON_DIR" => Some("content".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.lessons_dir, Some(PathBuf::from("content")));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_eq!(
            parse(Command::Play, &["--lesson", "0-1"]).unwrap_err(),
            ArgsError::InvalidLesson { raw: "0-1".into() }
        );
        assert_eq!(
            parse(Command::Play, &["--max-lives", "0"]).unwrap_err(),
            ArgsError::InvalidMaxLives { raw: "0".into() }
        );
        assert_eq!(
            parse(Command::Play, &["--lesson"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--lesson" }
        );
        assert_eq!(
            parse(Command::Play, &["--bogus"]).unwrap_err(),
            ArgsError::UnknownArg("--bogus".into())
        );
    }

    #[test]
    fn import_needs_a_lessons_dir() {
        assert_eq!(
            parse(Command::Import, &[]).unwrap_err(),
            ArgsError::MissingLessonsDir
        );
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/dev.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/dev.db"));
    }
}
