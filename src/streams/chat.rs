//! Conversation log for the forex assistant.

use crate::core::assistant::{
    AssistantProvider, forex_question_prompt, forex_tips_prompt, pair_analysis_prompt,
};
use crate::core::error::FetchError;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn user(text: &str) -> Self {
        ChatMessage {
            text: text.to_string(),
            from_user: true,
            timestamp: Utc::now(),
        }
    }

    fn assistant(text: String) -> Self {
        ChatMessage {
            text,
            from_user: false,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ChatSession {
    assistant: Arc<dyn AssistantProvider>,
    state: watch::Sender<Arc<ChatSnapshot>>,
}

impl ChatSession {
    pub fn new(assistant: Arc<dyn AssistantProvider>) -> Self {
        let (state, _) = watch::channel(Arc::new(ChatSnapshot::default()));
        ChatSession { assistant, state }
    }

    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ChatSnapshot>> {
        self.state.subscribe()
    }

    fn update(&self, change: impl FnOnce(&mut ChatSnapshot)) {
        self.state.send_modify(|slot| {
            let mut next = (**slot).clone();
            change(&mut next);
            *slot = Arc::new(next);
        });
    }

    /// Asks a forex question. Blank input is ignored. Returns the reply, or
    /// `None` when nothing was added; failures land in the snapshot's `error`.
    pub async fn send_message(&self, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        self.update(|s| {
            s.messages.push(ChatMessage::user(text));
            s.loading = true;
            s.error = None;
        });
        let reply = self.assistant.ask(&forex_question_prompt(text)).await;
        self.finish(reply, String::new())
    }

    /// Like [`send_message`](Self::send_message) but grows the reply chunk by
    /// chunk as the assistant streams it.
    pub async fn stream_message(&self, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        self.update(|s| {
            s.messages.push(ChatMessage::user(text));
            s.messages.push(ChatMessage::assistant(String::new()));
            s.loading = true;
            s.error = None;
        });

        let mut chunks = self.assistant.ask_stream(&forex_question_prompt(text));
        while let Some(chunk) = chunks.next().await {
            self.update(|s| {
                if let Some(reply) = s.messages.last_mut() {
                    reply.text.push_str(&chunk);
                }
            });
        }

        self.update(|s| s.loading = false);
        self.snapshot().messages.last().cloned()
    }

    pub async fn analyze_pair(&self, from: &str, to: &str, rate: f64) -> Option<ChatMessage> {
        self.begin_request();
        let reply = self
            .assistant
            .ask(&pair_analysis_prompt(from, to, rate))
            .await;
        self.finish(reply, format!("📊 Analysis for {from}/{to}:\n\n"))
    }

    pub async fn forex_tips(&self) -> Option<ChatMessage> {
        self.begin_request();
        let reply = self.assistant.ask(&forex_tips_prompt()).await;
        self.finish(reply, "💡 Forex Tips:\n\n".to_string())
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    pub fn clear_messages(&self) {
        self.update(|s| *s = ChatSnapshot::default());
    }

    fn begin_request(&self) {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self, reply: Result<String, FetchError>, prefix: String) -> Option<ChatMessage> {
        match reply {
            Ok(text) => {
                debug!(chars = text.len(), "Assistant replied");
                let message = ChatMessage::assistant(prefix + &text);
                self.update(|s| {
                    s.messages.push(message.clone());
                    s.loading = false;
                });
                Some(message)
            }
            Err(e) => {
                warn!(error = %e, "Assistant request failed");
                self.update(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                None
            }
        }
    }
}
