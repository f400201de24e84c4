// src/chat/mod.rs
// Conversation core: classification, clarification, generation, turns

pub mod clarify;
pub mod classifier;
pub mod generator;
pub mod keywords;
pub mod orchestrator;
pub mod types;

pub use clarify::ClarificationEngine;
pub use generator::{AnswerStyle, ResponseGenerator};
pub use orchestrator::{Orchestrator, TurnRequest, TurnResult};
