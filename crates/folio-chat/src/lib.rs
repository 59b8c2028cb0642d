//! Conversation layer: tool-calling chat engine, model client and sessions.

pub mod engine;
pub mod message;
pub mod model;
pub mod openai;
pub mod prompt;
pub mod session;
pub mod tools;

pub use engine::{ConversationEngine, EngineOptions};
pub use message::{Message, Role};
pub use model::{ChatModel, ChatRequest, ChatResponse};
pub use openai::OpenAiCompatibleClient;
pub use session::{SessionId, SessionStore};
pub use tools::{ToolInvoker, ToolResult};
