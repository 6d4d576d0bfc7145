// src/session.rs

use crate::llm::OllamaClient;
use crate::metrics::MetricTable;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl fmt::Display for ChatTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::User => write!(f, "You: {}", self.content),
            Role::Assistant => write!(f, "Assistant: {}", self.content),
        }
    }
}

/// Build the model prompt from the detected metrics and one question.
pub fn build_prompt(metrics: &MetricTable, question: &str) -> String {
    let context = format!("Financial metrics extracted:\n{}", metrics.to_context());
    format!("Document context:\n{context}\n\nUser question: {question}\nAssistant:")
}

/// Question/answer session over one document's metrics.
pub struct Session {
    metrics: MetricTable,
    client: OllamaClient,
    history: Vec<ChatTurn>,
}

impl Session {
    pub fn new(metrics: MetricTable, client: OllamaClient) -> Self {
        Self {
            metrics,
            client,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Ask the model one question. Both turns are appended to the history;
    /// the assistant turn is returned.
    pub async fn ask(&mut self, question: &str) -> &ChatTurn {
        let prompt = build_prompt(&self.metrics, question);
        let answer = self.client.ask(&prompt).await;

        info!(question = %question, "Question asked");
        info!(answer = %answer, "Answer received");

        self.history.push(ChatTurn {
            role: Role::User,
            content: question.to_string(),
        });
        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: answer,
        });
        &self.history[self.history.len() - 1]
    }

    /// The whole conversation, one turn per line, in submission order.
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
