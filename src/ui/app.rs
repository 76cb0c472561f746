//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将输入行与快捷键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState 与输入缓冲。清除 / 删除类命令先在输入框标题处请求 y/n 确认。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, UiState};
use crate::ui::event::{parse_input, AppEvent, EventHandler, Input, Shortcut, CLEAR_CONFIRM, HELP_TEXT};
use crate::ui::render::{draw, Prompt};

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, state_rx, &cmd_tx).await;
    let _ = cmd_tx.send(Command::Quit);

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: watch::Receiver<UiState>,
    cmd_tx: &mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::new();
    let mut input_buffer = String::new();
    let mut conversation_scroll = 0usize;
    let mut last_block_count = 0usize;
    let mut last_epoch = state_rx.borrow().input_epoch;
    let mut pending_confirm: Option<(Command, &'static str)> = None;
    let mut hint: Option<String> = None;

    loop {
        let state = state_rx.borrow().clone();

        if state.blocks.len() != last_block_count {
            last_block_count = state.blocks.len();
            conversation_scroll = usize::MAX;
        }
        if state.input_epoch != last_epoch {
            last_epoch = state.input_epoch;
            input_buffer.clear();
        }

        if let Some(ev) = event_handler.poll()? {
            if let Some((cmd, _)) = pending_confirm.take() {
                // 待确认时只接受 y / n
                match ev {
                    AppEvent::Key(key) if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    AppEvent::Shortcut(Shortcut::Quit) => break,
                    _ => hint = Some("已取消".to_string()),
                }
            } else {
                match ev {
                    AppEvent::Shortcut(Shortcut::Quit) => break,
                    AppEvent::Shortcut(Shortcut::Cancel) => {
                        hint = None;
                        let _ = cmd_tx.send(Command::CancelSummary);
                        if state.history.is_some() {
                            let _ = cmd_tx.send(Command::CloseHistory);
                        }
                    }
                    AppEvent::Shortcut(Shortcut::Summary) => {
                        let _ = cmd_tx.send(Command::GenerateSummary);
                    }
                    AppEvent::Shortcut(Shortcut::Probe) => {
                        let _ = cmd_tx.send(Command::Probe);
                    }
                    AppEvent::Shortcut(Shortcut::Clear) => {
                        pending_confirm = Some((Command::ClearHistory, CLEAR_CONFIRM));
                    }
                    AppEvent::Key(key) => match key.code {
                        KeyCode::PageUp => {
                            conversation_scroll = conversation_scroll.saturating_sub(10);
                        }
                        KeyCode::PageDown => {
                            conversation_scroll = conversation_scroll.saturating_add(10);
                        }
                        KeyCode::Up => {
                            conversation_scroll = conversation_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            conversation_scroll = conversation_scroll.saturating_add(1);
                        }
                        KeyCode::Home => conversation_scroll = 0,
                        KeyCode::End => conversation_scroll = usize::MAX,
                        // 等待回复时输入框锁定
                        _ if !state.send_enabled => {}
                        KeyCode::Enter => {
                            hint = None;
                            match parse_input(&input_buffer) {
                                None => {}
                                Some(Input::Quit) => break,
                                Some(Input::Help) => {
                                    hint = Some(HELP_TEXT.to_string());
                                    input_buffer.clear();
                                }
                                Some(Input::Invalid(msg)) => hint = Some(msg),
                                Some(Input::Confirm(cmd, question)) => {
                                    pending_confirm = Some((cmd, question));
                                    input_buffer.clear();
                                }
                                Some(Input::Command(cmd)) => {
                                    // 发送消息由会话清空输入框；其他命令本地清空
                                    if !matches!(cmd, Command::Submit(_)) {
                                        input_buffer.clear();
                                    }
                                    let _ = cmd_tx.send(cmd);
                                }
                            }
                        }
                        KeyCode::Backspace => {
                            input_buffer.pop();
                        }
                        KeyCode::Char(c) => input_buffer.push(c),
                        _ => {}
                    },
                }
            }
        }

        let prompt = Prompt {
            confirm: pending_confirm.as_ref().map(|(_, q)| *q),
            hint: hint.as_deref(),
        };
        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| {
            draw(
                f,
                &state,
                &input_buffer,
                conversation_scroll,
                prompt,
                &mut scroll_info,
            );
        })?;
        let (total_lines, viewport_height) = scroll_info;
        let max_scroll = total_lines.saturating_sub(viewport_height);
        conversation_scroll = conversation_scroll.min(max_scroll);

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
