use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use proofchat_core::{
    ChatSession, Config, CoreError, KnowledgeBaseCatalog, RejectReason, SessionEvent,
    SubmissionClient, SubmissionResponse, Tactic,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    pub session: ChatSession,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,

    // Char index into the session's pending input
    pub input_cursor: usize,

    // Chat pane
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, set during render
    pub chat_width: u16,  // inner width, set during render
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Pickers
    pub show_tactic_picker: bool,
    pub tactic_picker_state: ListState,
    pub show_kb_picker: bool,
    pub kb_picker_state: ListState,

    /// One-line notice shown in the footer (e.g. "nothing to send").
    pub status_message: Option<String>,

    pub backend_url: String,
    client: Arc<dyn SubmissionClient>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    persist_selection: bool,
}

impl App {
    /// `requested` must name a catalog entry. A `remembered` label that the
    /// catalog no longer has is ignored in favor of the default entry.
    pub fn new(
        client: Arc<dyn SubmissionClient>,
        events_tx: mpsc::UnboundedSender<AppEvent>,
        backend_url: String,
        requested: Option<&str>,
        remembered: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut session = ChatSession::new(KnowledgeBaseCatalog::default());
        if let Some(label) = requested {
            session.select_knowledge_base(label)?;
        } else if let Some(label) = remembered {
            if session.catalog().get(label).is_some() {
                session.select_knowledge_base(label)?;
            } else {
                warn!(
                    label,
                    fallback = %session.active_knowledge_base().label,
                    "remembered knowledge base is no longer available"
                );
            }
        }
        let session_events = session.subscribe();

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session,
            session_events,

            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,

            show_tactic_picker: false,
            tactic_picker_state: ListState::default(),
            show_kb_picker: false,
            kb_picker_state: ListState::default(),

            status_message: None,

            backend_url,
            client,
            events_tx,
            persist_selection: false,
        })
    }

    /// Remember knowledge base changes in the config file.
    pub fn with_persisted_selection(mut self) -> Self {
        self.persist_selection = true;
        self
    }

    pub fn input_len(&self) -> usize {
        self.session.pending_input().chars().count()
    }

    /// Send the pending input on a background task.
    ///
    /// The result comes back through the event channel as
    /// [`AppEvent::SubmissionFinished`].
    pub fn start_submission(&mut self) {
        let Some(request) = self.session.begin_submission() else {
            return;
        };

        let client = Arc::clone(&self.client);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.submit(&request).await;
            if tx.send(AppEvent::SubmissionFinished(result)).is_err() {
                warn!("submission finished after the UI shut down");
            }
        });
    }

    pub fn finish_submission(&mut self, result: Result<SubmissionResponse, CoreError>) {
        self.session.complete_submission(result);
    }

    pub fn apply_tactic(&mut self, tactic: Tactic) {
        self.session.apply_tactic(tactic);
        self.input_mode = InputMode::Editing;
    }

    pub fn new_chat(&mut self) {
        self.session.reset();
    }

    /// React to everything the session reported since the last call.
    pub fn drain_session_events(&mut self) {
        while let Ok(event) = self.session_events.try_recv() {
            debug!(?event, "session event");
            match event {
                SessionEvent::PendingInputChanged => {
                    self.input_cursor = self.input_cursor.min(self.input_len());
                }
                SessionEvent::SubmissionStarted { .. } => {
                    self.status_message = None;
                    self.input_mode = InputMode::Normal;
                    self.scroll_chat_to_bottom();
                }
                SessionEvent::SubmissionRejected(reason) => {
                    self.status_message = Some(
                        match reason {
                            RejectReason::EmptyPrompt => "Nothing to send",
                            RejectReason::AlreadySubmitting => "Still waiting for the last answer",
                        }
                        .to_string(),
                    );
                }
                SessionEvent::ExchangeAppended { .. } => {
                    self.input_cursor = self.input_cursor.min(self.input_len());
                    self.input_mode = InputMode::Editing;
                    self.scroll_chat_to_bottom();
                }
                SessionEvent::KnowledgeBaseChanged { label } => {
                    if self.persist_selection {
                        if let Err(e) = Config::save_knowledge_base(&label) {
                            warn!(error = %e, "could not save knowledge base selection");
                        }
                    }
                }
                SessionEvent::SessionReset => {
                    self.input_cursor = 0;
                    self.chat_scroll = 0;
                    self.status_message = None;
                    self.input_mode = InputMode::Editing;
                }
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_submitting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest turn is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let wrapped = |text: &str| -> usize {
            text.lines()
                .map(|line| {
                    let char_count = line.chars().count();
                    if char_count == 0 {
                        1
                    } else {
                        (char_count / wrap_width) + 1
                    }
                })
                .sum()
        };

        let mut total_lines: usize = 0;
        for (exchange, rendered) in self
            .session
            .history()
            .iter()
            .zip(self.session.rendered_history())
        {
            total_lines += 1 + wrapped(&exchange.prompt) + 1; // "You:" + prompt + blank
            total_lines += 1 + wrapped(&rendered.text) + 1; // "AI:" + answer + blank
            if !rendered.latex_macros.is_empty() {
                total_lines += 1;
            }
        }

        if let Some(prompt) = self.session.in_flight_prompt() {
            total_lines += 1 + wrapped(prompt) + 1;
            total_lines += 2; // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        let max_scroll = total_lines.saturating_sub(visible_height as usize);
        self.chat_scroll = u16::try_from(max_scroll).unwrap_or(u16::MAX);
    }

    // Tactic picker
    pub fn open_tactic_picker(&mut self) {
        self.tactic_picker_state.select(Some(0));
        self.show_tactic_picker = true;
    }

    pub fn tactic_picker_nav_down(&mut self) {
        let len = Tactic::all().len();
        let i = self.tactic_picker_state.selected().unwrap_or(0);
        self.tactic_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn tactic_picker_nav_up(&mut self) {
        let i = self.tactic_picker_state.selected().unwrap_or(0);
        self.tactic_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_tactic(&mut self) {
        if let Some(i) = self.tactic_picker_state.selected() {
            if let Some(&tactic) = Tactic::all().get(i) {
                self.apply_tactic(tactic);
                self.input_cursor = self.input_len();
            }
        }
        self.show_tactic_picker = false;
    }

    // Knowledge base picker
    pub fn open_kb_picker(&mut self) {
        let current_idx = self.session.catalog().active_index();
        self.kb_picker_state.select(Some(current_idx));
        self.show_kb_picker = true;
    }

    pub fn kb_picker_nav_down(&mut self) {
        let len = self.session.catalog().list().len();
        if len > 0 {
            let i = self.kb_picker_state.selected().unwrap_or(0);
            self.kb_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn kb_picker_nav_up(&mut self) {
        let i = self.kb_picker_state.selected().unwrap_or(0);
        self.kb_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_knowledge_base(&mut self) -> Result<(), CoreError> {
        let label = self
            .kb_picker_state
            .selected()
            .and_then(|i| self.session.catalog().list().get(i))
            .map(|kb| kb.label.clone());
        self.show_kb_picker = false;
        match label {
            Some(label) => self.session.select_knowledge_base(&label),
            None => Ok(()),
        }
    }
}
