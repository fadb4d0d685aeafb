pub mod chat;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessageInput, CompletionRequest, Message,
    Role,
};
