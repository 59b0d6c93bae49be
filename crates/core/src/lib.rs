#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod time;

pub use engine::{
    AnswerFeedback, EngineError, LessonEngine, LessonProgress, LessonState, Operation,
};
pub use error::Error;
pub use time::Clock;
