use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, FocusPane, InputMode, SettingsField};
use crate::session::{NoticeKind, Sender, SYSTEM_PROMPT_MAX};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    if app.minimized {
        render_minimized_bar(frame, area);
        return;
    }

    let widget_area = widget_rect(
        area,
        app.session.settings.width_percent,
        app.session.settings.height_percent,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" Chat ")
        .title_bottom(Line::from(" m minimize · s settings · c clear · q quit ").right_aligned());
    let inner = block.inner(widget_area);
    frame.render_widget(block, widget_area);

    // Quick replies collapse to nothing when the list is empty
    let qr_len = app.session.quick_replies.len() as u16;
    let qr_height = if qr_len == 0 { 0 } else { qr_len.min(4) + 2 };

    let [messages_area, qr_area, input_area, footer_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(qr_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(inner);

    render_messages(app, frame, messages_area);
    if qr_height > 0 {
        render_quick_replies(app, frame, qr_area);
    } else {
        app.quick_replies_area = None;
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_settings {
        render_settings_modal(app, frame, area);
    }
    if let Some(action) = app.confirm {
        render_confirm_dialog(action.prompt(), frame, area);
    }
}

/// The widget occupies the configured percentage of the terminal, centered,
/// the TUI analog of the resizable floating panel.
fn widget_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let width = (area.width as u32 * width_percent as u32 / 100) as u16;
    let height = (area.height as u32 * height_percent as u32 / 100) as u16;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.max(20), height.max(8))
}

fn render_minimized_bar(frame: &mut Frame, area: Rect) {
    let bar_area = Rect::new(
        area.x,
        area.y + area.height.saturating_sub(1),
        area.width,
        1,
    );
    let bar = Paragraph::new(Line::from(vec![
        Span::styled(" Chat ", Style::default().fg(Color::White).bg(Color::Blue).bold()),
        Span::styled(" minimized — press m to restore ", Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(bar, bar_area);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Messages;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Messages ");

    app.messages_area = Some(area);
    app.messages_height = area.height.saturating_sub(2);
    app.messages_width = area.width.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.session.messages {
        let label_style = match msg.sender {
            Sender::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            Sender::Bot => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        };

        if msg.pending {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(vec![
                Span::styled(msg.sender.label(), label_style),
                Span::styled(
                    format!(" typing{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ),
            ]));
        } else {
            let text_style = if msg.error {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::styled(msg.sender.label(), label_style),
                Span::styled(format!(" {}", msg.text), text_style),
            ]));
        }
    }

    let messages = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.messages_scroll, 0));

    frame.render_widget(messages, area);
}

fn render_quick_replies(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::QuickReplies;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Quick replies ");

    app.quick_replies_area = Some(area);

    let items: Vec<ListItem> = app
        .session
        .quick_replies
        .iter()
        .map(|qr| {
            let style = if qr.selected {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", qr.label)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.quick_reply_state);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.focus == FocusPane::Input && app.input_mode == InputMode::Editing;
    let (border_color, title) = if app.session.is_loading {
        (Color::DarkGray, " Sending... ")
    } else if editing {
        (Color::Yellow, " Message (Enter to send) ")
    } else {
        (Color::DarkGray, " Message (i to type) ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    app.input_area = Some(area);

    // Horizontal scroll keeps the cursor visible in a single-line field
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing && !app.show_settings && app.confirm.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Tooltip analog: the footer shows the untruncated text of the
    // highlighted quick reply
    let line = if app.focus == FocusPane::QuickReplies {
        let full = app
            .quick_reply_state
            .selected()
            .and_then(|i| app.session.quick_replies.get(i))
            .map(|qr| qr.full_text.as_str())
            .unwrap_or("");
        Line::from(Span::styled(
            format!(" {} ", full),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else {
        let hint = match (app.focus, app.input_mode) {
            (FocusPane::Input, InputMode::Editing) => " Enter send · Tab replies · Esc browse ",
            _ => " Tab focus · j/k scroll · Enter pick reply · i type ",
        };
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_settings_modal(app: &App, frame: &mut Frame, area: Rect) {
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 12.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Settings ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [width_area, height_area, _gap, prompt_label_area, prompt_area, notice_area, hints_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(inner);

    let form = &app.settings_form;

    let field_style = |field: SettingsField| {
        if form.field == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };

    // Sliders with a live value readout
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" Width  ", field_style(SettingsField::Width)),
            Span::raw(slider_bar(form.width)),
            Span::styled(format!(" {}% ", form.width), field_style(SettingsField::Width)),
        ])),
        width_area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" Height ", field_style(SettingsField::Height)),
            Span::raw(slider_bar(form.height)),
            Span::styled(format!(" {}% ", form.height), field_style(SettingsField::Height)),
        ])),
        height_area,
    );

    // System prompt with character count, warning color near the limit
    let count = form.prompt.chars().count();
    let count_style = if count > 450 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" System prompt ", field_style(SettingsField::Prompt)),
            Span::styled(format!("{}/{}", count, SYSTEM_PROMPT_MAX), count_style),
        ])),
        prompt_label_area,
    );

    let prompt_editing = form.field == SettingsField::Prompt;
    let prompt_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if prompt_editing {
            Color::Yellow
        } else {
            Color::DarkGray
        }));
    let prompt_inner_width = prompt_area.width.saturating_sub(2) as usize;
    let scroll_offset = if prompt_inner_width == 0 {
        0
    } else if form.prompt_cursor >= prompt_inner_width {
        form.prompt_cursor - prompt_inner_width + 1
    } else {
        0
    };
    let visible_prompt: String = form
        .prompt
        .chars()
        .skip(scroll_offset)
        .take(prompt_inner_width)
        .collect();
    frame.render_widget(Paragraph::new(visible_prompt).block(prompt_block), prompt_area);
    if prompt_editing {
        let cursor_x = (form.prompt_cursor - scroll_offset) as u16;
        frame.set_cursor_position((prompt_area.x + cursor_x + 1, prompt_area.y + 1));
    }

    // Transient validation/success notice
    if let Some(notice) = app.session.notice() {
        let style = match notice.kind {
            NoticeKind::Error => Style::default().fg(Color::White).bg(Color::Red),
            NoticeKind::Success => Style::default().fg(Color::Black).bg(Color::Green),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {} ", notice.text), style)),
            notice_area,
        );
    }

    frame.render_widget(
        Paragraph::new(Span::styled(
            " Enter apply · Esc close · Ctrl-R reset · Ctrl-L clear chat ",
            Style::default().fg(Color::DarkGray),
        )),
        hints_area,
    );
}

/// Fixed-width bar for the 50-100% range, the slider analog. Saturates on
/// out-of-range values rather than trusting its input.
fn slider_bar(value: u16) -> String {
    const BAR_LEN: usize = 20;
    let clamped = value.clamp(50, 100) as usize;
    let filled = ((clamped - 50) * BAR_LEN) / 50;
    format!(
        "[{}{}]",
        "=".repeat(filled),
        " ".repeat(BAR_LEN - filled)
    )
}

fn render_confirm_dialog(prompt: &str, frame: &mut Frame, area: Rect) {
    let popup_width = ((prompt.chars().count() + 4) as u16).min(area.width.saturating_sub(4));
    let popup_height = 4.min(area.height.saturating_sub(2));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Confirm ");

    let text = Text::from(vec![
        Line::from(Span::raw(prompt)),
        Line::from(Span::styled(
            "y confirm · n cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup_area,
    );
}

#[cfg(test)]
mod tests {
    use super::slider_bar;

    #[test]
    fn slider_bar_saturates_outside_the_valid_range() {
        assert_eq!(slider_bar(200), format!("[{}]", "=".repeat(20)));
        assert_eq!(slider_bar(10), format!("[{}]", " ".repeat(20)));
    }

    #[test]
    fn slider_bar_fills_proportionally() {
        assert_eq!(slider_bar(50), format!("[{}]", " ".repeat(20)));
        assert_eq!(slider_bar(75), format!("[{}{}]", "=".repeat(10), " ".repeat(10)));
        assert_eq!(slider_bar(100), format!("[{}]", "=".repeat(20)));
    }
}
