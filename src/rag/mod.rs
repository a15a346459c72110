//! Retrieval-augmented recommendation generation.
//!
//! One turn: embed the input, fetch the nearest guideline records, fill the prompt
//! template, ask the model once.

mod assistant;
mod generation;
mod prompt;
mod retrieval;

pub use assistant::{Analysis, Assistant};
pub use generation::{Generator, OpenAIGenerator};
pub use prompt::{build_context, PromptAssembler, NOT_PROVIDED};
pub use retrieval::Retriever;
