//! LLM Service Module
//!
//! Provider access for the chat service.
//!
//! # Architecture
//! ```text
//! ┌─────────────────┐
//! │      Agent      │  ← system prompt + generation settings
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    LLMClient    │  ← Trait (generic interface)
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┐
//!    ▼           ▼
//! ┌──────┐  ┌──────────┐
//! │OpenAI│  │  Test    │
//! │Client│  │  doubles │
//! └──────┘  └──────────┘
//! ```

mod agent;
mod client;
mod models;

pub use agent::Agent;
pub use client::{LLMClient, OpenAIClient};
pub use models::*;

#[cfg(test)]
mod tests;
