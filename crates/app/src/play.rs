//! Terminal front end for one lesson run.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use lesson_core::model::{LessonReport, Question, QuestionKind};
use services::{LessonError, LessonFinish, LessonLoopService, LessonRun};

/// Saves attempted for a finished lesson before giving up.
const SAVE_ATTEMPTS: u32 = 3;
const SAVE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// What one line of learner input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    /// Zero-based option indices in the order typed.
    Picks(Vec<usize>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    NotANumber(String),
    OutOfRange { number: usize, len: usize },
    SingleChoiceOnly,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::NotANumber(raw) => write!(f, "not an option number: {raw}"),
            InputError::OutOfRange { number, len } => {
                write!(f, "option {number} does not exist (1..={len})")
            }
            InputError::SingleChoiceOnly => write!(f, "pick exactly one option"),
        }
    }
}

impl std::error::Error for InputError {}

/// Interpret a typed line for `question`.
///
/// Options are typed 1-based, separated by spaces or commas. A blank line
/// submits an empty answer.
pub fn parse_input(question: &Question, line: &str) -> Result<Input, InputError> {
    let trimmed = line.trim();
    if matches!(trimmed, ":q" | ":quit") {
        return Ok(Input::Quit);
    }
    if question.kind() == QuestionKind::FreeText {
        return Ok(Input::Text(trimmed.to_owned()));
    }

    let len = question.options().len();
    let picks = trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let number: usize = part
                .parse()
                .map_err(|_| InputError::NotANumber(part.to_owned()))?;
            if number == 0 || number > len {
                return Err(InputError::OutOfRange { number, len });
            }
            Ok(number - 1)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if question.kind().is_single_choice() && picks.len() > 1 {
        return Err(InputError::SingleChoiceOnly);
    }
    Ok(Input::Picks(picks))
}

fn render_question<W: Write>(
    out: &mut W,
    run: &LessonRun,
    question: &Question,
) -> std::io::Result<()> {
    let progress = run.engine().progress();
    writeln!(out)?;
    writeln!(
        out,
        "[{}/{}] lives {}/{}  {}%",
        progress.current_index + 1,
        progress.total,
        progress.lives,
        progress.max_lives,
        progress.percent_complete()
    )?;
    if let Some(avatar) = question.avatar() {
        writeln!(out, "({avatar})")?;
    }
    writeln!(out, "{}", question.prompt())?;
    for (i, option) in question.options().iter().enumerate() {
        match &option.image {
            Some(image) => writeln!(out, "  {}) {} [{image}]", i + 1, option.text)?,
            None => writeln!(out, "  {}) {}", i + 1, option.text)?,
        }
    }
    let hint = match question.kind() {
        QuestionKind::SingleChoiceText | QuestionKind::SingleChoiceImage => "option number",
        QuestionKind::MultiSelectOrdered | QuestionKind::MultiSelectUnordered => {
            "option numbers in order"
        }
        QuestionKind::FreeText => "your answer",
    };
    write!(out, "{hint} (:q to quit)> ")?;
    out.flush()
}

pub fn render_finish<W: Write>(out: &mut W, finish: &LessonFinish) -> std::io::Result<()> {
    writeln!(out)?;
    match finish.report {
        LessonReport::Completed {
            correct_count,
            total_questions,
            score_percent,
        } => writeln!(
            out,
            "Lesson complete: {correct_count}/{total_questions} correct ({score_percent}%)"
        )?,
        LessonReport::Failed {
            correct_count,
            total_questions,
        } => writeln!(
            out,
            "Out of lives: {correct_count}/{total_questions} correct. Try again!"
        )?,
        LessonReport::Aborted {
            correct_count,
            questions_answered,
        } => writeln!(
            out,
            "Lesson stopped after {questions_answered} questions, {correct_count} correct."
        )?,
    }
    if let Some(effect) = finish.completion {
        writeln!(out, "+{} XP, streak {} day(s)", effect.xp_awarded, effect.streak)?;
        if let Some(next) = effect.newly_unlocked {
            writeln!(out, "Unlocked lesson {next}")?;
        }
    }
    Ok(())
}

/// Settle the outcome of a step that may have ended the lesson.
///
/// A storage failure after the lesson ended is retried through
/// [`LessonLoopService::finalize_report`], with a growing pause between tries.
async fn save_finish<W: Write>(
    svc: &LessonLoopService,
    run: &mut LessonRun,
    out: &mut W,
    mut result: Result<LessonFinish, LessonError>,
) -> Result<LessonFinish, Box<dyn std::error::Error>> {
    let mut attempt = 1;
    loop {
        match result {
            Ok(finish) => return Ok(finish),
            Err(LessonError::Storage(e))
                if run.engine().is_terminal() && attempt < SAVE_ATTEMPTS =>
            {
                warn!(
                    lesson = %run.lesson_id(),
                    attempt,
                    error = %e,
                    "saving lesson result failed"
                );
                writeln!(out, "Could not save your result ({e}), trying again...")?;
                tokio::time::sleep(SAVE_RETRY_DELAY * attempt).await;
                attempt += 1;
                result = svc.finalize_report(run).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Drive `run` from `input` until it ends. End of input aborts the lesson.
///
/// # Errors
///
/// Returns I/O errors from the terminal and service errors from the run.
pub async fn play<R, W>(
    svc: &LessonLoopService,
    run: &mut LessonRun,
    input: &mut R,
    out: &mut W,
) -> Result<LessonFinish, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        let Some(question) = run.engine().current_question().cloned() else {
            let result = svc.finalize_report(run).await;
            return save_finish(svc, run, out, result).await;
        };
        render_question(out, run, &question)?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            writeln!(out)?;
            let result = svc.abort(run).await;
            return save_finish(svc, run, out, result).await;
        }

        match parse_input(&question, &line) {
            Ok(Input::Quit) => {
                let result = svc.abort(run).await;
                return save_finish(svc, run, out, result).await;
            }
            Ok(Input::Picks(picks)) => {
                for index in picks {
                    run.select_option(index)?;
                }
            }
            Ok(Input::Text(text)) => run.set_free_text(text)?,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        }

        let feedback = run.submit_answer()?;
        if feedback.is_correct {
            writeln!(out, "Correct!")?;
        } else {
            writeln!(out, "Not quite. Lives left: {}", feedback.lives_remaining)?;
            if let Some(explanation) = &feedback.explanation {
                writeln!(out, "{explanation}")?;
            }
        }

        match svc.advance(run).await {
            Ok(None) => {}
            Ok(Some(finish)) => return Ok(finish),
            Err(e) => return save_finish(svc, run, out, Err(e)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use lesson_core::model::{
        AnswerKey, AnswerOption, LearnerId, LessonCatalog, LessonId, QuestionId,
    };
    use lesson_core::time::fixed_now;
    use services::Clock;
    use storage::repository::{
        InMemoryRepository, LessonContentRepository, LessonReportRecord, LessonReportRow,
        LessonReportSink, ProgressRepository, StorageError,
    };

    /// Report sink that refuses the first `failures` appends.
    struct FlakySink {
        inner: InMemoryRepository,
        failures: AtomicU32,
    }

    #[async_trait]
    impl LessonReportSink for FlakySink {
        async fn append_report(&self, record: &LessonReportRecord) -> Result<i64, StorageError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StorageError::Connection("database is locked".into()));
            }
            self.inner.append_report(record).await
        }

        async fn get_report(&self, id: i64) -> Result<LessonReportRecord, StorageError> {
            self.inner.get_report(id).await
        }

        async fn list_reports(
            &self,
            learner: LearnerId,
            lesson: LessonId,
            limit: u32,
        ) -> Result<Vec<LessonReportRow>, StorageError> {
            self.inner.list_reports(learner, lesson, limit).await
        }
    }

    fn ordered() -> Question {
        Question::new(
            QuestionId::new("order"),
            QuestionKind::MultiSelectOrdered,
            "Build: I am here",
            vec![
                AnswerOption::text("here"),
                AnswerOption::text("I"),
                AnswerOption::text("am"),
            ],
            AnswerKey::Sequence(vec![1, 2, 0]),
        )
        .unwrap()
    }

    fn free_text() -> Question {
        Question::new(
            QuestionId::new("thanks"),
            QuestionKind::FreeText,
            "Translate: شكرا",
            Vec::new(),
            AnswerKey::Text("thank you".into()),
        )
        .unwrap()
        .with_explanation("Polite thanks.")
    }

    #[test]
    fn parses_option_numbers() {
        let q = ordered();
        assert_eq!(parse_input(&q, "2 3,1\n").unwrap(), Input::Picks(vec![1, 2, 0]));
        assert_eq!(parse_input(&q, "   \n").unwrap(), Input::Picks(Vec::new()));
        assert_eq!(parse_input(&q, ":q\n").unwrap(), Input::Quit);
        assert_eq!(
            parse_input(&q, "4").unwrap_err(),
            InputError::OutOfRange { number: 4, len: 3 }
        );
        assert_eq!(
            parse_input(&q, "two").unwrap_err(),
            InputError::NotANumber("two".into())
        );
    }

    #[test]
    fn free_text_keeps_the_line() {
        assert_eq!(
            parse_input(&free_text(), "  Thank You \n").unwrap(),
            Input::Text("Thank You".into())
        );
    }

    async fn play_with_sink(
        input: &str,
        failures: u32,
    ) -> (
        InMemoryRepository,
        Result<LessonFinish, Box<dyn std::error::Error>>,
        String,
    ) {
        let repo = InMemoryRepository::new();
        repo.replace_questions(LessonId::first(), &[ordered(), free_text()])
            .await
            .unwrap();
        let sink = Arc::new(FlakySink {
            inner: repo.clone(),
            failures: AtomicU32::new(failures),
        });
        let svc = LessonLoopService::new(
            Clock::fixed(fixed_now()),
            LessonCatalog::new([(1, 2)]).unwrap(),
            Arc::new(repo.clone()),
            sink,
            Arc::new(repo.clone()),
        );
        let mut run = svc
            .start_lesson(LearnerId::new(1), LessonId::first())
            .await
            .unwrap();

        let mut reader = input.as_bytes();
        let mut out = Vec::new();
        let result = play(&svc, &mut run, &mut reader, &mut out).await;
        (repo, result, String::from_utf8(out).unwrap())
    }

    async fn run_with(input: &str) -> (LessonFinish, String) {
        let (_, result, out) = play_with_sink(input, 0).await;
        (result.unwrap(), out)
    }

    #[tokio::test]
    async fn plays_a_lesson_to_completion() {
        let (finish, out) = run_with("9\n2 3 1\nthanks\n").await;
        assert_eq!(finish.report, LessonReport::completed(1, 2));
        assert!(out.contains("option 9 does not exist"));
        assert!(out.contains("Polite thanks."));
        assert_eq!(
            finish.completion.and_then(|c| c.newly_unlocked),
            Some(LessonId::new(1, 2).unwrap())
        );
    }

    #[tokio::test]
    async fn end_of_input_aborts() {
        let (finish, _) = run_with("2 3 1\n").await;
        assert_eq!(
            finish.report,
            LessonReport::Aborted {
                correct_count: 1,
                questions_answered: 1,
            }
        );
    }

    #[tokio::test]
    async fn failed_save_is_retried_before_giving_up() {
        let (repo, result, out) = play_with_sink("2 3 1\nthank you\n", 2).await;
        let finish = result.unwrap();
        assert_eq!(finish.report, LessonReport::completed(2, 2));
        assert_eq!(out.matches("trying again").count(), 2);

        let stored = repo.get_report(finish.report_id).await.unwrap();
        assert_eq!(stored.report, finish.report);
        let progress = repo.get_progress(LearnerId::new(1)).await.unwrap().unwrap();
        assert_eq!(progress.xp(), 1);
    }

    #[tokio::test]
    async fn save_gives_up_after_bounded_attempts() {
        let (repo, result, _) = play_with_sink(":q\n", SAVE_ATTEMPTS).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("database is locked"));
        assert!(
            repo.list_reports(LearnerId::new(1), LessonId::first(), 5)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
