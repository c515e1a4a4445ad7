use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use proofchat_core::{RenderedAnswer, Tactic, TacticTemplateRegistry, PLACEHOLDER};
use crate::app::{App, InputMode};

const MATH_STYLE: Style = Style::new().fg(Color::Magenta);
const MAX_INPUT_LINES: u16 = 8;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current_text), base));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }
    spans
}

/// Style one line of normalized answer text.
///
/// `$$` toggles display math across lines; inside ordinary text, `$..$` pairs
/// are inline math. An odd `$` count on a line is shown as plain text.
fn answer_line(text: &str, in_block: &mut bool, base: Style) -> Line<'static> {
    let mut spans = Vec::new();

    if text.contains("$$") || *in_block {
        for (i, segment) in text.split("$$").enumerate() {
            if i > 0 {
                *in_block = !*in_block;
            }
            if segment.is_empty() {
                continue;
            }
            if *in_block {
                spans.push(Span::styled(segment.to_string(), MATH_STYLE));
            } else {
                spans.extend(inline_math_spans(segment, base));
            }
        }
    } else {
        spans.extend(inline_math_spans(text, base));
    }

    Line::from(spans)
}

fn inline_math_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    if text.matches('$').count() % 2 != 0 {
        return parse_markdown_spans(text, base);
    }
    let mut spans = Vec::new();
    for (i, segment) in text.split('$').enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i % 2 == 1 {
            spans.push(Span::styled(segment.to_string(), MATH_STYLE));
        } else {
            spans.extend(parse_markdown_spans(segment, base));
        }
    }
    spans
}

/// Lines for an answer plus its macro table, which always travel together.
fn answer_lines(rendered: &RenderedAnswer, is_error: bool) -> Vec<Line<'static>> {
    if is_error {
        return rendered
            .text
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Red))))
            .collect();
    }

    let mut in_block = false;
    let mut lines: Vec<Line<'static>> = rendered
        .text
        .lines()
        .map(|l| answer_line(l, &mut in_block, Style::default()))
        .collect();

    if !rendered.latex_macros.is_empty() {
        let mut macros: Vec<_> = rendered.latex_macros.iter().collect();
        macros.sort();
        let table = macros
            .iter()
            .map(|(name, expansion)| format!("{} := {}", name, expansion))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(Line::from(Span::styled(
            format!("macros: {}", table),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}

/// Highlight `UNDEFINED` slots the user still has to fill.
fn prompt_line(text: &str, base: Style) -> Line<'static> {
    let placeholder_style = Style::default().fg(Color::Black).bg(Color::Yellow);
    let mut spans = Vec::new();
    for (i, part) in text.split(PLACEHOLDER).enumerate() {
        if i > 0 {
            spans.push(Span::styled(PLACEHOLDER, placeholder_style));
        }
        if !part.is_empty() {
            spans.push(Span::styled(part.to_string(), base));
        }
    }
    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat_screen(app, frame, body_area);
    render_footer(app, frame, footer_area);

    if app.show_tactic_picker {
        render_tactic_picker(app, frame, area);
    } else if app.show_kb_picker {
        render_kb_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let kb = app.session.active_knowledge_base();
    let title = Line::from(vec![
        Span::styled(
            " Informal Interactive Proof Assistant ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(format!("[{}]", kb.display_name), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("{} v{}", app.backend_url, env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => " i:edit  T:tactics  K:knowledge base  N:new chat  j/k:scroll  q:quit ",
        InputMode::Editing => " Enter:send  Alt+Enter:newline  ^T:tactics  ^K:knowledge base  ^N:new chat  Esc:done ",
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ];

    let open_slots = TacticTemplateRegistry::placeholder_count(app.session.pending_input());
    if open_slots > 0 {
        spans.push(Span::styled(
            format!(" {} {} to fill ", open_slots, PLACEHOLDER),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(message) = &app.status_message {
        spans.push(Span::styled(format!(" {} ", message), Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let input_lines =
        (app.session.pending_input().split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
    ])
    .areas(area);

    // Store area for mouse hit-testing and inner size for scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_focused = app.input_mode == InputMode::Normal;
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if chat_focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Dialogue ");

    let you_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let ai_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let history = app.session.history();
    let chat_text = if history.is_empty() && !app.session.is_submitting() {
        Text::from(Span::styled(
            "Pick a tactic with T, fill in the UNDEFINED slots, and press Enter to send.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for (exchange, rendered) in history.iter().zip(app.session.rendered_history()) {
            lines.push(Line::from(Span::styled("You:", you_style)));
            lines.extend(exchange.prompt.lines().map(|l| prompt_line(l, Style::default())));
            lines.push(Line::default());

            lines.push(Line::from(Span::styled("AI:", ai_style)));
            lines.extend(answer_lines(rendered, exchange.is_error()));
            lines.push(Line::default());
        }

        if let Some(prompt) = app.session.in_flight_prompt() {
            lines.push(Line::from(Span::styled("You:", you_style)));
            lines.extend(prompt.lines().map(|l| prompt_line(l, Style::default())));
            lines.push(Line::default());

            lines.push(Line::from(Span::styled("AI:", ai_style)));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.session.is_submitting() {
        " Prompt (waiting for answer) "
    } else {
        " Prompt "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Cursor position as (line, column) in chars
    let input = app.session.pending_input();
    let before_cursor: String = input.chars().take(app.input_cursor).collect();
    let cursor_line = before_cursor.matches('\n').count();
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count())
        .unwrap_or(0);

    // Scroll so the cursor stays inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let row_offset = (cursor_line + 1).saturating_sub(inner_height.max(1));
    let col_offset = if inner_width > 0 && cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };

    let base = Style::default().fg(Color::Cyan);
    let lines: Vec<Line> = input.split('\n').map(|l| prompt_line(l, base)).collect();

    let paragraph = Paragraph::new(Text::from(lines))
        .block(input_block)
        .scroll((row_offset as u16, col_offset as u16));
    frame.render_widget(paragraph, area);

    if editing {
        frame.set_cursor_position((
            area.x + 1 + (cursor_col - col_offset) as u16,
            area.y + 1 + (cursor_line - row_offset) as u16,
        ));
    }
}

/// Centered popup rectangle
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn render_tactic_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let tactics = Tactic::all();
    let popup = popup_area(area, 70, tactics.len() as u16 + 9);
    frame.render_widget(Clear, popup);

    let [list_area, preview_area] = Layout::vertical([
        Constraint::Length(tactics.len() as u16 + 2),
        Constraint::Min(0),
    ])
    .areas(popup);

    let items: Vec<ListItem> = tactics
        .iter()
        .map(|t| ListItem::new(format!(" {} ", t.display_name())))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Tactics (Enter replaces the prompt) "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.tactic_picker_state);

    let template = app
        .tactic_picker_state
        .selected()
        .and_then(|i| tactics.get(i))
        .map(|t| t.template())
        .unwrap_or_default();
    let preview = Paragraph::new(Text::from(
        template.lines().map(|l| prompt_line(l, Style::default())).collect::<Vec<_>>(),
    ))
    .block(Block::default().borders(Borders::ALL).title(" Template "))
    .wrap(Wrap { trim: false });
    frame.render_widget(preview, preview_area);
}

fn render_kb_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let entries = app.session.catalog().list().to_vec();
    let active = app.session.catalog().active_index();
    let popup = popup_area(area, 70, entries.len() as u16 + 9);
    frame.render_widget(Clear, popup);

    let [list_area, detail_area] = Layout::vertical([
        Constraint::Length(entries.len() as u16 + 2),
        Constraint::Min(0),
    ])
    .areas(popup);

    let items: Vec<ListItem> = entries
        .iter()
        .enumerate()
        .map(|(i, kb)| {
            let marker = if i == active { " (active)" } else { "" };
            ListItem::new(format!(" {}{} ", kb.display_name, marker))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(" Knowledge Base "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.kb_picker_state);

    let mut detail = Vec::new();
    if let Some(kb) = app.kb_picker_state.selected().and_then(|i| entries.get(i)) {
        detail.push(Line::from(kb.description.clone()));
        if let Some(link) = &kb.external_link {
            detail.push(Line::default());
            detail.push(Line::from(vec![
                Span::styled("Contribute: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    link.clone(),
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                ),
            ]));
        }
    }
    let details = Paragraph::new(Text::from(detail))
        .block(Block::default().borders(Borders::ALL).title(" About "))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, detail_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn span_texts(line: &Line) -> Vec<(String, bool)> {
        line.spans
            .iter()
            .map(|s| (s.content.to_string(), s.style.fg == Some(Color::Magenta)))
            .collect()
    }

    #[test]
    fn inline_math_is_highlighted() {
        let mut in_block = false;
        let line = answer_line("Let $c=d$ hold.", &mut in_block, Style::default());
        assert_eq!(
            span_texts(&line),
            vec![
                ("Let ".to_string(), false),
                ("c=d".to_string(), true),
                (" hold.".to_string(), false),
            ]
        );
        assert!(!in_block);
    }

    #[test]
    fn display_math_spans_lines() {
        let rendered = RenderedAnswer {
            text: proofchat_core::normalize("So \\[\n a \\\\\n b \\] end"),
            latex_macros: HashMap::new(),
        };
        let lines = answer_lines(&rendered, false);
        let flags: Vec<Vec<(String, bool)>> = lines.iter().map(span_texts).collect();
        assert_eq!(
            flags,
            vec![
                vec![("So ".to_string(), false)],
                vec![("a \\\\".to_string(), true)],
                vec![(" b".to_string(), true)],
                vec![(" end".to_string(), false)],
            ]
        );
    }

    #[test]
    fn odd_dollar_is_plain_text() {
        let mut in_block = false;
        let line = answer_line("costs $5", &mut in_block, Style::default());
        assert_eq!(span_texts(&line), vec![("costs $5".to_string(), false)]);
    }

    #[test]
    fn macros_follow_the_answer() {
        let mut latex_macros = HashMap::new();
        latex_macros.insert("\\R".to_string(), "\\mathbb{R}".to_string());
        let rendered = RenderedAnswer {
            text: "Take $x \\in \\R$.".to_string(),
            latex_macros,
        };
        let lines = answer_lines(&rendered, false);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].spans[0].content, "macros: \\R := \\mathbb{R}");
    }

    #[test]
    fn error_answers_are_red_and_unparsed() {
        let rendered = RenderedAnswer {
            text: "Error with $x$".to_string(),
            latex_macros: HashMap::new(),
        };
        let lines = answer_lines(&rendered, true);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 1);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn bold_markdown_survives() {
        let spans = parse_markdown_spans("a **key** step", Style::default());
        assert_eq!(spans.len(), 3);
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn placeholders_are_marked() {
        let line = prompt_line("p_i: UNDEFINED", Style::default());
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[1].content, PLACEHOLDER);
        assert_eq!(line.spans[1].style.bg, Some(Color::Yellow));
    }
}
