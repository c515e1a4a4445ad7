pub mod client;
pub mod config;
pub mod error;
pub mod knowledge_base;
pub mod math;
pub mod session;
pub mod tactics;

// Re-export main types for convenience
pub use client::{
    HistoryEntry, HttpSubmissionClient, SubmissionClient, SubmissionRequest, SubmissionResponse,
};
pub use config::Config;
pub use error::CoreError;
pub use knowledge_base::{KnowledgeBase, KnowledgeBaseCatalog};
pub use math::normalize;
pub use session::{
    ChatExchange, ChatSession, ExchangeStatus, RejectReason, RenderedAnswer, SessionEvent,
    SUBMISSION_ERROR_TEXT,
};
pub use tactics::{Tactic, TacticTemplateRegistry, PLACEHOLDER};
