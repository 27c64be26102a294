use crate::chat::prompt::{build_prompt, postprocess};
use crate::chat::ChatMessage;
use crate::config::Config;
use crate::error::Result;
use crate::hub::ModelHub;
use crate::models::discovery::list_candidates;
use crate::models::downloader::DownloadEvent;
use crate::models::manager::ModelManager;
use std::path::PathBuf;
use std::sync::Arc;

/// Token budget for a normal turn
const TURN_MAX_TOKENS: usize = 256;
/// Token budget for the single simplified retry
const RETRY_MAX_TOKENS: usize = 128;
/// Replies shorter than this trigger the retry
const MIN_REPLY_CHARS: usize = 2;

/// Fixed assistant reply when no model is loaded
pub const NO_MODEL_REPLY: &str = "Please select and load a model first.";
/// Fixed assistant reply when the model produced nothing twice
pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm still learning, bear with me. Could you try asking another way?";

/// Run one conversation turn: append the user message and an assistant
/// reply to `history`.
///
/// With no model loaded the reply is a fixed instruction and the engine
/// is never invoked. An empty or too-short reply triggers exactly one
/// retry with a simplified direct-instruction prompt and a smaller
/// budget; if that still yields nothing, a fixed friendly fallback is
/// substituted. Generation faults are flattened to display text here;
/// the transcript never carries a raw error.
pub async fn chat_turn(manager: &ModelManager, history: &mut Vec<ChatMessage>, message: &str) {
    if !manager.is_ready() {
        history.push(ChatMessage::user(message));
        history.push(ChatMessage::assistant(NO_MODEL_REPLY));
        return;
    }

    let prompt = build_prompt(history, message);
    let mut reply = match manager.generate(&prompt, TURN_MAX_TOKENS).await {
        Ok(raw) => postprocess(&raw),
        Err(e) => {
            tracing::error!("Generation failed: {e:?}");
            format!("Something went wrong while generating a reply: {e}")
        }
    };

    if reply.chars().count() < MIN_REPLY_CHARS {
        let simple = format!("Please reply to the user's message: {message}");
        reply = match manager.generate(&simple, RETRY_MAX_TOKENS).await {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                tracing::error!("Retry generation failed: {e:?}");
                format!("Something went wrong while generating a reply: {e}")
            }
        };

        if reply.is_empty() {
            reply = EMPTY_REPLY_FALLBACK.to_string();
        }
    }

    history.push(ChatMessage::user(message));
    history.push(ChatMessage::assistant(reply));
}

/// Wires discovery, the lifecycle manager and the conversation formatter
/// behind the operations a chat front-end needs
pub struct ChatSession {
    manager: ModelManager,
    hub: Arc<dyn ModelHub>,
    config: Config,
    candidates: Vec<String>,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    #[must_use]
    pub fn new(manager: ModelManager, hub: Arc<dyn ModelHub>, config: Config) -> Self {
        Self {
            manager,
            hub,
            config,
            candidates: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Re-run discovery and replace the candidate list
    pub async fn refresh_models(&mut self) -> &[String] {
        self.candidates = list_candidates(
            self.hub.as_ref(),
            &self.config.filter,
            self.config.download.scan_limit,
            self.config.download.max_results,
        )
        .await;
        &self.candidates
    }

    /// Candidate identifiers from the last discovery run
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Resolve a selection (1-based list index or identifier) against the
    /// candidate list
    #[must_use]
    pub fn resolve_selection(&self, input: &str) -> Option<String> {
        if let Ok(n) = input.parse::<usize>() {
            return self.candidates.get(n.checked_sub(1)?).cloned();
        }
        Some(input.to_string())
    }

    /// Download (if needed) and load a model, returning its path
    pub async fn download_and_load(
        &mut self,
        model_id: &str,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<PathBuf> {
        let path = self.manager.ensure_available(model_id, on_event).await?;
        self.manager.load(&path)?;
        Ok(path)
    }

    /// Run one turn against the current transcript, returning the
    /// assistant reply
    pub async fn send(&mut self, message: &str) -> String {
        chat_turn(&self.manager, &mut self.history, message).await;
        self.history
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Clear the transcript, keeping the loaded model
    pub fn clear(&mut self) {
        self.history.clear();
    }

    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    #[must_use]
    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// One-line status for the front-end
    #[must_use]
    pub fn status(&self) -> String {
        match self.manager.active_path() {
            Some(path) => format!("Ready: {}", path.display()),
            None => "No model loaded".to_string(),
        }
    }
}
