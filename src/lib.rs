// src/lib.rs
// Conversational spreadsheet assistant backend

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod files;
pub mod llm;
pub mod persona;
pub mod prompt;
pub mod session;
pub mod state;
