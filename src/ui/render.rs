//! 界面渲染
//!
//! 根据 UiState 与输入缓冲绘制：左侧对话区（按块类型着色、`<br>` 还原为换行、按宽度换行），
//! 右侧总结面板或历史总结列表，底部为输入框（标题显示提示 / 待确认操作）与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::chat::{from_line_breaks, BlockKind, SummaryPanel};
use crate::chat::surface::SUMMARY_PLACEHOLDER;
use crate::core::{RenderedBlock, SessionPhase, UiState};
use crate::memory::Summary;

/// 输入区的一次性提示：本地提示优先于 UiState.alert
#[derive(Debug, Default, Clone, Copy)]
pub struct Prompt<'a> {
    pub confirm: Option<&'a str>,
    pub hint: Option<&'a str>,
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

/// 块前缀：角色名 + 对话编号（供 /edit 使用）
fn block_prefix(rendered: &RenderedBlock) -> (String, Color) {
    let id = rendered
        .block
        .turn
        .map(|t| t.to_string())
        .unwrap_or_default();
    match rendered.block.kind {
        BlockKind::Welcome => ("心语 ".to_string(), Color::Yellow),
        BlockKind::User => (format!("你{id} "), Color::Cyan),
        BlockKind::Assistant => (format!("心语{id} "), Color::Green),
        BlockKind::Notice => ("系统 ".to_string(), Color::Red),
        BlockKind::Pending => ("心语 ".to_string(), Color::DarkGray),
    }
}

fn conversation_lines(state: &UiState, width: usize) -> Vec<Line<'static>> {
    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, rendered) in state.blocks.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = block_prefix(rendered);
        let indent = " ".repeat(prefix.chars().count());
        let body = match rendered.block.kind {
            BlockKind::Pending => "正在思考…".to_string(),
            _ => from_line_breaks(&rendered.block.content),
        };
        let body_style = match rendered.block.kind {
            BlockKind::Notice => Style::default().fg(Color::Red),
            BlockKind::Pending => Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            _ => Style::default(),
        };
        for (i, line) in wrap_text(&body, width.max(20)).into_iter().enumerate() {
            let pref = if i == 0 { prefix.clone() } else { indent.clone() };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(line, body_style),
            ]));
        }
    }
    text_lines
}

fn summary_view(panel: &SummaryPanel) -> (String, Text<'static>) {
    let (title, body, style) = match panel {
        SummaryPanel::Placeholder => (
            " 咨询总结 ".to_string(),
            SUMMARY_PLACEHOLDER.to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        SummaryPanel::Busy(text) => (
            " 咨询总结 (生成中) ".to_string(),
            from_line_breaks(text),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ),
        SummaryPanel::Content { text, index, editable } => {
            let title = match (index, editable) {
                (Some(i), true) => format!(" 咨询总结 #{} (/edit-summary {} 编辑) ", i + 1, i + 1),
                (Some(i), false) => format!(" 咨询总结 #{} ", i + 1),
                (None, _) => " 本地总结 ".to_string(),
            };
            (title, from_line_breaks(text), Style::default())
        }
        SummaryPanel::Error(text) => (
            " 咨询总结 ".to_string(),
            from_line_breaks(text),
            Style::default().fg(Color::Red),
        ),
    };
    let lines: Vec<Line> = body
        .split('\n')
        .map(|l| Line::from(Span::styled(l.to_string(), style)))
        .collect();
    (title, Text::from(lines))
}

fn history_view(history: &[Summary]) -> (String, Text<'static>) {
    let title = format!(" 历史总结 ({}) │ /load n 加载 · /close 关闭 ", history.len());
    if history.is_empty() {
        return (
            title,
            Text::from(Span::styled(
                "暂无历史总结",
                Style::default().fg(Color::DarkGray),
            )),
        );
    }
    let mut lines: Vec<Line> = Vec::new();
    for (i, summary) in history.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", i + 1),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(summary.timestamp.clone(), Style::default().fg(Color::DarkGray)),
        ]));
        for l in from_line_breaks(&summary.content).split('\n') {
            lines.push(Line::from(format!("  {l}")));
        }
    }
    (title, Text::from(lines))
}

fn draw_side_panel(f: &mut Frame, state: &UiState, area: Rect) {
    let (title, text, color) = match &state.history {
        Some(history) => {
            let (title, text) = history_view(history);
            (title, text, Color::Magenta)
        }
        None => {
            let (title, text) = summary_view(&state.summary);
            let color = if state.summary_enabled {
                Color::Yellow
            } else {
                Color::DarkGray
            };
            (title, text, color)
        }
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

/// 绘制一帧：左上对话区（标题 + 对话 + 滚动条），右上总结区，下方输入区；
/// 将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    state: &UiState,
    input_buffer: &str,
    conversation_scroll: usize,
    prompt: Prompt<'_>,
    out: &mut (usize, usize),
) {
    let input_height = 5u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(input_height)])
        .split(f.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
        .split(chunks[0]);

    let conv_area = top[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let phase_str = match state.phase() {
        SessionPhase::Idle => "空闲",
        SessionPhase::Waiting => "等待回复…",
        SessionPhase::Summarizing => "总结中…",
    };
    let block = Block::default()
        .title(format!(" 心语 │ {} ", phase_str))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let text_lines = conversation_lines(state, content_width);
    let content_height = conv_area.height.saturating_sub(2) as usize; // 边框
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    f.render_widget(block, conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    draw_side_panel(f, state, top[1]);

    let (input_title, border_color) = if let Some(question) = prompt.confirm {
        (format!(" {question} (y/n) "), Color::Red)
    } else if let Some(hint) = prompt.hint {
        (format!(" {hint} "), Color::Magenta)
    } else if let Some(alert) = &state.alert {
        (format!(" {alert} "), Color::Green)
    } else if !state.send_enabled {
        (" 等待回复… ".to_string(), Color::DarkGray)
    } else {
        (" 输入 ".to_string(), Color::Blue)
    };

    let hint = " Enter 发送 │ Ctrl+S 总结 │ Esc 取消 │ Ctrl+T 检测 │ /help │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(input_title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .wrap(Wrap { trim: false })
        .style(if state.send_enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        });
    f.render_widget(input, chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}
