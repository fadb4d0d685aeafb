//! Server-sent event framing for streaming completions
//!
//! Every frame is `data: <json>\n\n`. A stream ends with exactly one
//! terminator: the stop sentinel on success or an error frame on failure.

use futures::{Stream, StreamExt, stream};
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;

use super::llm::TextStream;

pub type SseStream = Pin<Box<dyn Stream<Item = Result<String, Infallible>> + Send>>;

pub fn chunk_frame(text: &str) -> String {
    format!("data: {}\n\n", json!({ "chunk": text }))
}

pub fn stop_frame() -> String {
    format!("data: {}\n\n", json!({ "chunk": "", "finish_reason": "stop" }))
}

pub fn error_frame(message: &str) -> String {
    format!("data: {}\n\n", json!({ "error": message }))
}

/// Frame provider fragments, ending with the stop sentinel or, on the first
/// provider error, a single error frame carrying `error_message`.
pub fn frame_stream(fragments: TextStream, error_message: &'static str) -> SseStream {
    let frames = stream::unfold(Some(fragments), move |state| async move {
        let mut fragments = state?;
        match fragments.next().await {
            Some(Ok(text)) => Some((chunk_frame(&text), Some(fragments))),
            Some(Err(e)) => {
                tracing::warn!(stage = "error-returned", "Streaming chat completion failed: {}", e);
                Some((error_frame(error_message), None))
            },
            None => {
                tracing::info!(stage = "completed", "Streaming chat completion finished");
                Some((stop_frame(), None))
            },
        }
    });

    Box::pin(frames.map(Ok::<String, Infallible>))
}

/// A stream made of one error frame.
pub fn error_stream(error_message: &str) -> SseStream {
    Box::pin(stream::iter([Ok::<String, Infallible>(error_frame(error_message))]))
}
