use std::sync::Arc;

use futures::StreamExt;
use shared::{domain::ChatTurn, error::GatewayError, protocol::ChatMessageRequest};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{gateway::ChatGateway, notify::NotificationSink};

const APOLOGY_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    /// Dispatched, no fragment received yet.
    Sending,
    /// At least one fragment has been appended to the buffer.
    Streaming,
}

/// Change feed for a front end rendering the conversation live.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    UserTurn(ChatTurn),
    Fragment(String),
    TurnCommitted(ChatTurn),
    Cleared,
}

/// A conversational thread scoped to a single product. The transcript holds
/// only committed turns; an in-flight reply accumulates in a separate buffer
/// that is either committed whole or discarded.
pub struct ChatSession {
    gateway: Arc<dyn ChatGateway>,
    notifications: Arc<NotificationSink>,
    product_id: String,
    description: String,
    brand: String,
    inner: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
}

struct ChatState {
    transcript: Vec<ChatTurn>,
    buffer: Option<String>,
    phase: ChatPhase,
    /// Bumped by `abandon` and `clear_history`. A stream launched under an
    /// older epoch must not mutate the session when it resumes.
    epoch: u64,
}

impl ChatSession {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        notifications: Arc<NotificationSink>,
        product_id: impl Into<String>,
        description: impl Into<String>,
        brand: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            notifications,
            product_id: product_id.into(),
            description: description.into(),
            brand: brand.into(),
            inner: Mutex::new(ChatState {
                transcript: Vec::new(),
                buffer: None,
                phase: ChatPhase::Idle,
                epoch: 0,
            }),
            events,
        })
    }

    /// Sends the session-opening message built from the product description
    /// and brand. Bootstrap sends do not append a visible user turn.
    pub async fn initialize(&self) {
        let opening = format!(
            "Tell me more about this product: {} by {}",
            self.description, self.brand
        );
        self.send_inner(&opening, true).await;
    }

    /// Sends a user message and consumes the streamed reply to completion.
    /// Empty text and sends while a reply is in flight are silent no-ops.
    pub async fn send(&self, text: &str) {
        self.send_inner(text, false).await;
    }

    async fn send_inner(&self, text: &str, bootstrap: bool) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let epoch = {
            let mut guard = self.inner.lock().await;
            if guard.phase != ChatPhase::Idle {
                debug!(product_id = %self.product_id, "chat: send ignored while busy");
                return;
            }
            guard.phase = ChatPhase::Sending;
            guard.buffer = Some(String::new());
            if !bootstrap {
                // The transcript reflects what was asked before any network
                // activity is observable.
                let turn = ChatTurn::user(text);
                guard.transcript.push(turn.clone());
                let _ = self.events.send(ChatEvent::UserTurn(turn));
            }
            guard.epoch
        };

        let request = ChatMessageRequest {
            product_id: self.product_id.clone(),
            message: text.to_string(),
            description: self.description.clone(),
            brand: self.brand.clone(),
        };

        let outcome = self.consume_reply(epoch, &request).await;

        let committed = {
            let mut guard = self.inner.lock().await;
            if guard.epoch != epoch {
                // Session was abandoned or cleared while the stream was live.
                return;
            }
            let turn = match outcome {
                Ok(()) => {
                    let content = guard.buffer.take().unwrap_or_default();
                    ChatTurn::assistant(content)
                }
                Err(err) => {
                    warn!(product_id = %self.product_id, "chat: send failed: {err}");
                    guard.buffer = None;
                    ChatTurn::assistant(APOLOGY_REPLY)
                }
            };
            guard.transcript.push(turn.clone());
            guard.phase = ChatPhase::Idle;
            turn
        };
        let _ = self.events.send(ChatEvent::TurnCommitted(committed));
    }

    async fn consume_reply(
        &self,
        epoch: u64,
        request: &ChatMessageRequest,
    ) -> Result<(), GatewayError> {
        let mut fragments = self.gateway.send_message(request).await?;

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            {
                let mut guard = self.inner.lock().await;
                if guard.epoch != epoch {
                    // Dangling-update protection: stop pulling and leave the
                    // session untouched.
                    return Ok(());
                }
                if let Some(buffer) = guard.buffer.as_mut() {
                    buffer.push_str(&fragment);
                }
                guard.phase = ChatPhase::Streaming;
            }
            let _ = self.events.send(ChatEvent::Fragment(fragment));
        }

        Ok(())
    }

    /// Clears the server-side history and, on success, the local transcript
    /// and buffer. Failure leaves the transcript untouched. The explicit
    /// user confirmation happens in the presentation layer before this call.
    pub async fn clear_history(&self) {
        match self.gateway.clear_history(&self.product_id).await {
            Ok(()) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.epoch = guard.epoch.wrapping_add(1);
                    guard.transcript.clear();
                    guard.buffer = None;
                    guard.phase = ChatPhase::Idle;
                }
                info!(product_id = %self.product_id, "chat: history cleared");
                let _ = self.events.send(ChatEvent::Cleared);
                self.notifications
                    .success("Chat history cleared successfully")
                    .await;
            }
            Err(err) => {
                warn!(product_id = %self.product_id, "chat: clear history failed: {err}");
                self.notifications
                    .error("Failed to clear chat history")
                    .await;
            }
        }
    }

    /// Tears the session down: any in-flight reply is discarded and a later
    /// resumption of its stream becomes a no-op.
    pub async fn abandon(&self) {
        let mut guard = self.inner.lock().await;
        guard.epoch = guard.epoch.wrapping_add(1);
        guard.buffer = None;
        guard.phase = ChatPhase::Idle;
    }

    /// Committed turns only. Never includes the streaming buffer.
    pub async fn transcript(&self) -> Vec<ChatTurn> {
        self.inner.lock().await.transcript.clone()
    }

    /// The partially assembled reply, for live display. Not authoritative:
    /// it may still be discarded.
    pub async fn streaming_preview(&self) -> Option<String> {
        let guard = self.inner.lock().await;
        match guard.phase {
            ChatPhase::Streaming => guard.buffer.clone(),
            _ => None,
        }
    }

    pub async fn phase(&self) -> ChatPhase {
        self.inner.lock().await.phase
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
