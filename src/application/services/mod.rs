mod chat;
mod index;
mod rag;

pub use chat::{error_reply, ChatEvent, ChatPrompts, ChatService, ERROR_INDICATOR};
pub use index::IndexService;
pub use rag::RagService;
