//! Mock implementations of core traits for testing.
//!
//! Used by unit and integration tests across the workspace; nothing here
//! touches the network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{
    events::{EventEnvelope, EventType},
    traits::{ChatMessage, EventEmitter, LlmClient, LlmResponse, LlmUsage},
    types::ReasoningTurn,
    Error, Result,
};

// =============================================================================
// Mock LLM Client
// =============================================================================

enum Scripted {
    Reply(String),
    Fail(String),
}

/// Scripted mock LLM that returns predefined responses in order.
///
/// The last scripted response repeats once the queue is drained.
pub struct MockLlm {
    responses: Mutex<VecDeque<Scripted>>,
    call_count: Mutex<usize>,
    transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlm {
    /// Create a new mock LLM with a queue of raw responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Scripted::Reply).collect()),
            call_count: Mutex::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock from structured turns.
    pub fn with_turns(turns: Vec<ReasoningTurn>) -> Self {
        Self::new(
            turns
                .iter()
                .map(|t| serde_json::to_string(t).unwrap_or_default())
                .collect(),
        )
    }

    /// Create a mock that always returns the same response.
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        let mock = Self::new(Vec::new());
        if let Ok(mut queue) = mock.responses.lock() {
            queue.push_back(Scripted::Fail(message.to_string()));
        }
        mock
    }

    /// Queue a failure after the already scripted responses.
    pub fn then_fail(self, message: &str) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Scripted::Fail(message.to_string()));
        }
        self
    }

    /// Get the number of calls made to this mock.
    pub fn call_count(&self) -> usize {
        self.call_count.lock().map(|c| *c).unwrap_or(0)
    }

    /// Messages received by each call, in order.
    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.transcripts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        if let Ok(mut count) = self.call_count.lock() {
            *count += 1;
        }
        if let Ok(mut transcripts) = self.transcripts.lock() {
            transcripts.push(messages.to_vec());
        }

        let mut queue = self
            .responses
            .lock()
            .map_err(|_| Error::internal("mock llm lock poisoned"))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|s| match s {
                Scripted::Reply(r) => Scripted::Reply(r.clone()),
                Scripted::Fail(m) => Scripted::Fail(m.clone()),
            })
        };

        match next {
            Some(Scripted::Reply(content)) => Ok(LlmResponse {
                content,
                finish_reason: "stop".to_string(),
                usage: LlmUsage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                },
            }),
            Some(Scripted::Fail(message)) => Err(Error::reasoning(message)),
            None => Err(Error::reasoning("mock llm has no scripted responses")),
        }
    }
}

// =============================================================================
// Recording Event Emitter
// =============================================================================

/// Event emitter that keeps every event in memory.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events of one type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventEmitter for RecordingEmitter {
    async fn emit(&self, event: EventEnvelope) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
