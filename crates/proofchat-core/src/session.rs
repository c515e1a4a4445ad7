//! UI-agnostic chat session state
//!
//! The session owns the exchange history, the text being edited, and the
//! single-flight submission guard. Front ends call the transition methods and
//! re-render from the returned state; every applied transition is also
//! broadcast as a [`SessionEvent`] to subscribers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{HistoryEntry, SubmissionClient, SubmissionRequest, SubmissionResponse};
use crate::error::CoreError;
use crate::knowledge_base::{KnowledgeBase, KnowledgeBaseCatalog};
use crate::math;
use crate::tactics::{Tactic, TacticTemplateRegistry};

/// Answer text stored for any failed submission.
pub const SUBMISSION_ERROR_TEXT: &str = "Error while processing the prompt.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeStatus {
    Ok,
    Error,
}

/// One prompt and the answer it produced. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub prompt: String,
    /// Raw backend text, before math normalization.
    pub answer: String,
    pub latex_macros: HashMap<String, String>,
    pub status: ExchangeStatus,
}

impl ChatExchange {
    fn ok(prompt: String, response: SubmissionResponse) -> Self {
        Self {
            prompt,
            answer: response.answer,
            latex_macros: response.latex_macros,
            status: ExchangeStatus::Ok,
        }
    }

    fn error(prompt: String) -> Self {
        Self {
            prompt,
            answer: SUBMISSION_ERROR_TEXT.to_string(),
            latex_macros: HashMap::new(),
            status: ExchangeStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ExchangeStatus::Error
    }

    /// The answer as a renderer should receive it.
    pub fn rendered(&self) -> RenderedAnswer {
        RenderedAnswer {
            text: math::normalize(&self.answer),
            latex_macros: self.latex_macros.clone(),
        }
    }
}

/// Normalized answer text paired with the macros it may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAnswer {
    pub text: String,
    pub latex_macros: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyPrompt,
    AlreadySubmitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PendingInputChanged,
    SubmissionStarted { prompt: String },
    SubmissionRejected(RejectReason),
    ExchangeAppended { index: usize, status: ExchangeStatus },
    KnowledgeBaseChanged { label: String },
    SessionReset,
}

pub struct ChatSession {
    history: Vec<ChatExchange>,
    // Normalized once per exchange, index-aligned with `history`.
    rendered: Vec<RenderedAnswer>,
    pending_input: String,
    // Prompt of the request in flight; `Some` is the submitting state.
    in_flight: Option<String>,
    catalog: KnowledgeBaseCatalog,
    registry: TacticTemplateRegistry,
    observers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl ChatSession {
    pub fn new(catalog: KnowledgeBaseCatalog) -> Self {
        Self {
            history: Vec::new(),
            rendered: Vec::new(),
            pending_input: String::new(),
            in_flight: None,
            catalog,
            registry: TacticTemplateRegistry::new(),
            observers: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatExchange] {
        &self.history
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Prompt of the submission currently awaiting a response.
    pub fn in_flight_prompt(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn catalog(&self) -> &KnowledgeBaseCatalog {
        &self.catalog
    }

    pub fn active_knowledge_base(&self) -> &KnowledgeBase {
        self.catalog.active()
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn notify(&mut self, event: SessionEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
        self.notify(SessionEvent::PendingInputChanged);
    }

    /// Edit the pending input in place (cursor-based editors).
    pub fn edit_pending_input<R>(&mut self, edit: impl FnOnce(&mut String) -> R) -> R {
        let result = edit(&mut self.pending_input);
        self.notify(SessionEvent::PendingInputChanged);
        result
    }

    /// Replace the pending input with the tactic's template, discarding what was there.
    pub fn apply_tactic(&mut self, tactic: Tactic) {
        debug!(tactic = tactic.as_str(), "tactic applied");
        self.set_pending_input(tactic.template());
    }

    pub fn apply_tactic_id(&mut self, tactic_id: &str) -> Result<(), CoreError> {
        let template = self.registry.resolve(tactic_id)?;
        debug!(tactic = tactic_id, "tactic applied");
        self.set_pending_input(template);
        Ok(())
    }

    /// Change the knowledge base sent with later requests. History and input are kept.
    pub fn select_knowledge_base(&mut self, label: &str) -> Result<(), CoreError> {
        self.catalog.select(label)?;
        self.notify(SessionEvent::KnowledgeBaseChanged {
            label: label.to_string(),
        });
        Ok(())
    }

    /// Start a new chat: clears history and pending input.
    ///
    /// A submission already in flight is not affected and still appends when it completes.
    pub fn reset(&mut self) {
        if self.is_submitting() {
            debug!("session reset while a submission is in flight");
        }
        self.history.clear();
        self.rendered.clear();
        self.pending_input.clear();
        self.notify(SessionEvent::SessionReset);
    }

    /// Move to the submitting state and build the request for the pending input.
    ///
    /// Returns `None`, leaving the state untouched, if the input is blank or a
    /// submission is already in flight.
    pub fn begin_submission(&mut self) -> Option<SubmissionRequest> {
        if self.is_submitting() {
            debug!("submission rejected: already submitting");
            self.notify(SessionEvent::SubmissionRejected(RejectReason::AlreadySubmitting));
            return None;
        }
        if self.pending_input.trim().is_empty() {
            debug!("submission rejected: empty prompt");
            self.notify(SessionEvent::SubmissionRejected(RejectReason::EmptyPrompt));
            return None;
        }

        let prompt = self.pending_input.clone();
        let request = SubmissionRequest {
            prompt: prompt.clone(),
            history: self
                .history
                .iter()
                .map(|exchange| HistoryEntry {
                    prompt: exchange.prompt.clone(),
                    answer: exchange.answer.clone(),
                })
                .collect(),
            kb_label: self.catalog.active().label.clone(),
        };

        info!(
            kb_label = %request.kb_label,
            history_len = request.history.len(),
            "submission started"
        );
        self.in_flight = Some(prompt.clone());
        self.notify(SessionEvent::SubmissionStarted { prompt });
        Some(request)
    }

    /// Apply the outcome of the in-flight submission and return to idle.
    ///
    /// Success appends an `Ok` exchange and clears the pending input. Failure
    /// appends an `Error` exchange and keeps the input so it can be resent.
    pub fn complete_submission(
        &mut self,
        result: Result<SubmissionResponse, CoreError>,
    ) -> Option<&ChatExchange> {
        let Some(prompt) = self.in_flight.take() else {
            warn!("submission result arrived with nothing in flight; dropped");
            return None;
        };

        let exchange = match result {
            Ok(response) => {
                self.pending_input.clear();
                ChatExchange::ok(prompt, response)
            }
            Err(e) => {
                warn!(error = %e, "submission failed");
                ChatExchange::error(prompt)
            }
        };

        let status = exchange.status;
        self.rendered.push(exchange.rendered());
        self.history.push(exchange);
        let index = self.history.len() - 1;
        info!(index, ?status, "exchange appended");

        if status == ExchangeStatus::Ok {
            self.notify(SessionEvent::PendingInputChanged);
        }
        self.notify(SessionEvent::ExchangeAppended { index, status });
        self.history.last()
    }

    /// Submit the pending input through `client` and wait for the outcome.
    ///
    /// Returns the status of the appended exchange, or `None` if the
    /// submission was rejected before any request was made.
    pub async fn submit<C>(&mut self, client: &C) -> Option<ExchangeStatus>
    where
        C: SubmissionClient + ?Sized,
    {
        let request = self.begin_submission()?;
        let result = client.submit(&request).await;
        self.complete_submission(result).map(|exchange| exchange.status)
    }

    /// Normalized answers in history order, ready for a renderer.
    ///
    /// Computed when each exchange is appended; the stored answers stay raw.
    pub fn rendered_history(&self) -> &[RenderedAnswer] {
        &self.rendered
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(KnowledgeBaseCatalog::default())
    }
}
