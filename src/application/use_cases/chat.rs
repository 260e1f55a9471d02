use crate::application::use_cases::model_provider::ModelProvider;
use crate::application::use_cases::prompt_builder::build_chat_prompt;
use crate::application::use_cases::session_store::{SessionHandle, SessionStore};
use crate::domain::conversation::{ChatMessage, ChatReply, ChatRequest, ConversationTurn};
use crate::domain::error::{AppError, Result};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

pub struct ChatUseCase {
    provider: Arc<ModelProvider>,
    sessions: Arc<SessionStore>,
    max_history_turns: usize,
}

impl ChatUseCase {
    pub fn new(provider: Arc<ModelProvider>, sessions: Arc<SessionStore>, max_history_turns: usize) -> Self {
        Self {
            provider,
            sessions,
            max_history_turns,
        }
    }

    /// Rejects what `send` and `stream` would reject before any model call.
    pub fn check(&self, request: &ChatRequest) -> Result<()> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        if request.message.trim().is_empty() {
            return Err(AppError::ValidationError("Message is required.".to_string()));
        }
        self.provider.resolve(request.model).map(|_| ())
    }

    async fn prepare(&self, request: &ChatRequest) -> Result<(SessionHandle, Vec<ChatMessage>)> {
        self.check(request)?;
        let session = self.sessions.get_or_create(&request.session_id);
        let history = session.lock().await.turns().to_vec();
        let messages = build_chat_prompt(
            &history,
            &request.message,
            request.context.as_deref(),
            self.max_history_turns,
        );
        debug!(
            session_id = %request.session_id,
            history_turns = history.len(),
            model = %request.model,
            "Sending chat message"
        );
        Ok((session, messages))
    }

    async fn record(&self, session: SessionHandle, request: &ChatRequest, response: String) -> ChatReply {
        let mut guard = session.lock().await;
        guard.append(ConversationTurn::user(request.message.clone()));
        guard.append(ConversationTurn::assistant(response.clone()));
        ChatReply {
            response,
            session_id: request.session_id.clone(),
        }
    }

    /// The session is not locked while the model answers; turns are appended only on success.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        let (session, messages) = self.prepare(request).await?;
        let response = self.provider.complete(request.model, &messages).await?;
        Ok(self.record(session, request, response).await)
    }

    /// Same as `send`, with the answer handed to `on_chunk` as it arrives.
    pub async fn stream(
        &self,
        request: &ChatRequest,
        mut on_chunk: impl FnMut(String) + Send,
    ) -> Result<ChatReply> {
        let (session, messages) = self.prepare(request).await?;
        let response = self
            .provider
            .stream(request.model, &messages, &mut on_chunk)
            .await?;
        Ok(self.record(session, request, response).await)
    }

    /// Forgets the session. A send still in flight on the old handle cannot bring turns back.
    pub async fn clear(&self, session_id: &str) {
        if let Some(session) = self.sessions.remove(session_id) {
            session.lock().await.clear();
            info!(session_id = %session_id, "Chat history cleared");
        }
    }

    pub async fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        match self.sessions.get(session_id) {
            Some(session) => session.lock().await.turns().to_vec(),
            None => Vec::new(),
        }
    }
}
