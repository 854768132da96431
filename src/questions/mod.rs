//! Question sources and normalization
//!
//! Two backends sit behind [`QuestionSource`]: the on-demand generator and a
//! pre-seeded pool. Both hand out normalized [`Question`] values.

pub mod generator;
pub mod model;
pub mod pool;
pub mod source;

// Re-export commonly used types
pub use generator::HttpQuestionGenerator;
pub use model::{normalize_questions, CorrectAnswer, Question, RawQuestion};
pub use pool::QuestionPool;
pub use source::{QuestionRequest, QuestionSource};
