pub mod llm;
pub mod storage;

pub use llm::{ChatCompletion, ChatMessage, ChatRequest, HttpLlmGateway, LlmError, LlmGateway};
pub use storage::{HttpObjectStorage, ObjectStorage, StorageError};
