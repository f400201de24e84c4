// src/session/mod.rs
// Session persistence layer

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::{MessageMeta, Session, SessionSummary, StoredMessage};
