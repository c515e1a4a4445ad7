use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::warn;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::SubmissionFinished(result) => app.finish_submission(result),
    }
    app.drain_session_events();
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_tactic_picker {
        handle_tactic_picker(app, key);
        return;
    }
    if app.show_kb_picker {
        handle_kb_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_tactic_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_tactic_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.tactic_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.tactic_picker_nav_up(),
        KeyCode::Enter => app.select_tactic(),
        _ => {}
    }
}

fn handle_kb_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_kb_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.kb_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.kb_picker_nav_up(),
        KeyCode::Enter => {
            if let Err(e) = app.select_knowledge_base() {
                warn!(error = %e, "knowledge base selection failed");
            }
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Tab | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input_len();
        }

        // Half-page scroll (must be before plain 'd'/'u' would match)
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_add(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_sub(app.chat_height / 2);
        }

        KeyCode::Char('j') | KeyCode::Down => app.chat_scroll = app.chat_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.chat_scroll = app.chat_scroll.saturating_sub(1),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('T') => app.open_tactic_picker(),
        KeyCode::Char('K') => app.open_kb_picker(),
        KeyCode::Char('N') => app.new_chat(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Char('t') if ctrl => app.open_tactic_picker(),
        KeyCode::Char('k') if ctrl => app.open_kb_picker(),
        KeyCode::Char('n') if ctrl => app.new_chat(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => insert_char(app, '\n'),
        KeyCode::Enter => app.start_submission(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let cursor = app.input_cursor;
                app.session.edit_pending_input(|input| {
                    let byte_pos = char_to_byte_index(input, cursor);
                    input.remove(byte_pos);
                });
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input_len() {
                let cursor = app.input_cursor;
                app.session.edit_pending_input(|input| {
                    let byte_pos = char_to_byte_index(input, cursor);
                    input.remove(byte_pos);
                });
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input_len());
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input_len();
        }
        KeyCode::Char(c) => insert_char(app, c),
        _ => {}
    }
}

fn insert_char(app: &mut App, c: char) {
    let cursor = app.input_cursor;
    app.session.edit_pending_input(|input| {
        let byte_pos = char_to_byte_index(input, cursor);
        input.insert(byte_pos, c);
    });
    app.input_cursor += 1;
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.chat_scroll = app.chat_scroll.saturating_add(3),
        MouseEventKind::ScrollUp => app.chat_scroll = app.chat_scroll.saturating_sub(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proofchat_core::{
        CoreError, ExchangeStatus, SubmissionClient, SubmissionRequest, SubmissionResponse,
        SUBMISSION_ERROR_TEXT,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct EchoClient {
        fail: bool,
    }

    #[async_trait]
    impl SubmissionClient for EchoClient {
        async fn submit(
            &self,
            request: &SubmissionRequest,
        ) -> Result<SubmissionResponse, CoreError> {
            if self.fail {
                return Err(CoreError::SubmissionFailed("offline".to_string()));
            }
            Ok(SubmissionResponse {
                answer: format!("echo [{}]: {}", request.kb_label, request.prompt),
                latex_macros: HashMap::new(),
            })
        }
    }

    fn app(fail: bool) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            Arc::new(EchoClient { fail }),
            tx,
            "http://127.0.0.1:8000".to_string(),
            None,
            None,
        )
        .unwrap();
        (app, rx)
    }

    fn app_with_kb(requested: Option<&str>, remembered: Option<&str>) -> anyhow::Result<App> {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(
            Arc::new(EchoClient { fail: false }),
            tx,
            "http://127.0.0.1:8000".to_string(),
            requested,
            remembered,
        )
    }

    #[test]
    fn remembered_kb_is_restored() {
        let app = app_with_kb(None, Some("geometry")).unwrap();
        assert_eq!(app.session.active_knowledge_base().label, "geometry");
    }

    #[test]
    fn stale_remembered_kb_falls_back_to_default() {
        let app = app_with_kb(None, Some("topology")).unwrap();
        assert_eq!(app.session.active_knowledge_base().label, "lm_theory");
    }

    #[test]
    fn requested_kb_must_exist_and_wins() {
        assert!(app_with_kb(Some("topology"), None).is_err());
        let app = app_with_kb(Some("number_theory"), Some("geometry")).unwrap();
        assert_eq!(app.session.active_knowledge_base().label, "number_theory");
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))).unwrap();
    }

    fn press_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, modifiers))).unwrap();
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    async fn deliver_result(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, AppEvent::SubmissionFinished(_)));
        handle_event(app, event).unwrap();
    }

    #[test]
    fn typing_edits_at_cursor() {
        let (mut app, _rx) = app(false);
        type_str(&mut app, "p_i: 1=1");
        press(&mut app, KeyCode::Home);
        type_str(&mut app, "ß");
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "2");
        assert_eq!(app.session.pending_input(), "ßp_i: 1=2");
        assert_eq!(app.input_cursor, 9);
    }

    #[test]
    fn alt_enter_inserts_newline() {
        let (mut app, _rx) = app(false);
        type_str(&mut app, "Prove p_i.");
        press_with(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        type_str(&mut app, "p_i: x");
        assert_eq!(app.session.pending_input(), "Prove p_i.\np_i: x");
        assert!(!app.session.is_submitting());
    }

    #[test]
    fn tactic_picker_replaces_input() {
        let (mut app, _rx) = app(false);
        type_str(&mut app, "scratch");
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('T'));
        assert!(app.show_tactic_picker);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert!(!app.show_tactic_picker);
        assert_eq!(app.session.pending_input(), "Prove p_i.\n\np_i: UNDEFINED");
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.input_cursor, app.input_len());
    }

    #[test]
    fn kb_picker_changes_active_label() {
        let (mut app, _rx) = app(false);
        press_with(&mut app, KeyCode::Char('k'), KeyModifiers::CONTROL);
        assert!(app.show_kb_picker);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.active_knowledge_base().label, "geometry");
    }

    #[tokio::test]
    async fn enter_submits_and_clears_on_success() {
        let (mut app, mut rx) = app(false);
        type_str(&mut app, "Is p_i correct?");
        press(&mut app, KeyCode::Enter);
        assert!(app.session.is_submitting());
        assert_eq!(app.input_mode, InputMode::Normal);

        // single flight: a second Enter does nothing
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);

        deliver_result(&mut app, &mut rx).await;
        assert!(!app.session.is_submitting());
        assert_eq!(app.session.history().len(), 1);
        assert_eq!(app.session.history()[0].answer, "echo [lm_theory]: Is p_i correct?");
        assert_eq!(app.session.pending_input(), "");
        assert_eq!(app.input_cursor, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failure_keeps_input_for_retry() {
        let (mut app, mut rx) = app(true);
        type_str(&mut app, "Prove p_i.");
        press(&mut app, KeyCode::Enter);
        deliver_result(&mut app, &mut rx).await;

        let exchange = &app.session.history()[0];
        assert_eq!(exchange.status, ExchangeStatus::Error);
        assert_eq!(exchange.answer, SUBMISSION_ERROR_TEXT);
        assert_eq!(app.session.pending_input(), "Prove p_i.");
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn blank_input_reports_and_stays_idle() {
        let (mut app, _rx) = app(false);
        type_str(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert!(!app.session.is_submitting());
        assert_eq!(app.status_message.as_deref(), Some("Nothing to send"));
    }

    #[tokio::test]
    async fn new_chat_clears_history_and_input() {
        let (mut app, mut rx) = app(false);
        type_str(&mut app, "first");
        press(&mut app, KeyCode::Enter);
        deliver_result(&mut app, &mut rx).await;
        type_str(&mut app, "draft");

        press_with(&mut app, KeyCode::Char('n'), KeyModifiers::CONTROL);
        assert!(app.session.history().is_empty());
        assert_eq!(app.session.pending_input(), "");
        assert_eq!(app.input_cursor, 0);
    }

    #[test]
    fn q_quits_only_in_normal_mode() {
        let (mut app, _rx) = app(false);
        type_str(&mut app, "q");
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
