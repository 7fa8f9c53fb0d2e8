//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations: the index lifecycle, retrieval, and chat turns.

pub mod services;

pub use services::{ChatEvent, ChatPrompts, ChatService, IndexService, RagService};
