//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+S/Ctrl+T/Esc/Ctrl+C/Ctrl+L/Ctrl+Q 转为快捷命令，其余按键交给 run_app 拼输入缓冲；
//! Enter 时由 parse_input 把输入行解析为发送消息或斜杠命令。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::chat::ClearScope;
use crate::core::Command;
use crate::memory::TurnId;

/// 清除前的确认语
pub const CLEAR_CONFIRM: &str = "确定要清除所有对话记录吗？此操作不可恢复！";
const DELETE_CONFIRM: &str = "确定要删除所选内容吗？此操作不可恢复！";

pub const HELP_TEXT: &str = "/summary 生成总结 · /cancel 取消 · /local 本地总结 · /history 历史 · /load n · \
/edit #id 内容 · /edit-summary n 内容 · /clear · /delete turns|summaries|all · /probe · /quit";

/// 应用事件：快捷键或原始按键
#[derive(Debug, Clone)]
pub enum AppEvent {
    Shortcut(Shortcut),
    Key(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Esc / Ctrl+C：取消总结（或放弃待确认操作）
    Cancel,
    Summary,
    Probe,
    /// Ctrl+L：清除全部对话（需确认）
    Clear,
    Quit,
}

/// 一行输入的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    /// 需用户确认（y/n）后才执行
    Confirm(Command, &'static str),
    Help,
    Quit,
    Invalid(String),
}

/// 解析输入行；空行返回 None
pub fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Input::Command(Command::Submit(line.to_string())));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let input = match name {
        "/quit" | "/exit" => Input::Quit,
        "/help" => Input::Help,
        "/summary" => Input::Command(Command::GenerateSummary),
        "/cancel" => Input::Command(Command::CancelSummary),
        "/local" => Input::Command(Command::LocalSummary),
        "/history" => Input::Command(Command::ShowHistory),
        "/close" => Input::Command(Command::CloseHistory),
        "/probe" => Input::Command(Command::Probe),
        "/clear" => Input::Confirm(Command::ClearHistory, CLEAR_CONFIRM),
        "/load" => match parse_ordinal(rest) {
            Some(index) => Input::Command(Command::LoadSummary(index)),
            None => Input::Invalid("用法：/load <序号>".to_string()),
        },
        "/edit" => match split_target(rest) {
            Some((target, content)) => match target.trim_start_matches('#').parse::<u64>() {
                Ok(id) => Input::Command(Command::EditTurn {
                    id: TurnId(id),
                    content: content.to_string(),
                }),
                Err(_) => Input::Invalid("用法：/edit #<对话编号> <新内容>".to_string()),
            },
            None => Input::Invalid("用法：/edit #<对话编号> <新内容>".to_string()),
        },
        "/edit-summary" => match split_target(rest) {
            Some((target, content)) => match parse_ordinal(target) {
                Some(index) => Input::Command(Command::EditSummary {
                    index,
                    content: content.to_string(),
                }),
                None => Input::Invalid("用法：/edit-summary <序号> <新内容>".to_string()),
            },
            None => Input::Invalid("用法：/edit-summary <序号> <新内容>".to_string()),
        },
        "/delete" => {
            let scope = match rest {
                "" | "turns" => Some(ClearScope::TURNS),
                "summaries" => Some(ClearScope::SUMMARIES),
                "all" => Some(ClearScope::ALL),
                _ => None,
            };
            match scope {
                Some(scope) => Input::Confirm(Command::ClearAll(scope), DELETE_CONFIRM),
                None => Input::Invalid("用法：/delete turns|summaries|all".to_string()),
            }
        }
        other => Input::Invalid(format!("未知命令：{other}（/help 查看帮助）")),
    };
    Some(input)
}

/// 1 起始的序号转为下标
fn parse_ordinal(s: &str) -> Option<usize> {
    s.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn split_target(rest: &str) -> Option<(&str, &str)> {
    let (target, content) = rest.split_once(char::is_whitespace)?;
    let content = content.trim();
    if content.is_empty() {
        None
    } else {
        Some((target, content))
    }
}

/// 事件处理器：poll 时读键盘并返回 AppEvent
#[derive(Debug, Default)]
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(self.handle_key(key)));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> AppEvent {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => AppEvent::Shortcut(Shortcut::Cancel),
            KeyCode::Char('c') if ctrl => AppEvent::Shortcut(Shortcut::Cancel),
            KeyCode::Char('s') if ctrl => AppEvent::Shortcut(Shortcut::Summary),
            KeyCode::Char('t') if ctrl => AppEvent::Shortcut(Shortcut::Probe),
            KeyCode::Char('l') if ctrl => AppEvent::Shortcut(Shortcut::Clear),
            KeyCode::Char('q') if ctrl => AppEvent::Shortcut(Shortcut::Quit),
            _ => AppEvent::Key(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_submit() {
        assert_eq!(
            parse_input("  我最近很焦虑 "),
            Some(Input::Command(Command::Submit("我最近很焦虑".to_string())))
        );
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn test_load_is_one_based() {
        assert_eq!(
            parse_input("/load 2"),
            Some(Input::Command(Command::LoadSummary(1)))
        );
        assert!(matches!(parse_input("/load 0"), Some(Input::Invalid(_))));
        assert!(matches!(parse_input("/load x"), Some(Input::Invalid(_))));
    }

    #[test]
    fn test_edit_targets_turn_id() {
        assert_eq!(
            parse_input("/edit #3 其实是昨天的事"),
            Some(Input::Command(Command::EditTurn {
                id: TurnId(3),
                content: "其实是昨天的事".to_string(),
            }))
        );
        assert!(matches!(parse_input("/edit #3"), Some(Input::Invalid(_))));
    }

    #[test]
    fn test_edit_summary() {
        assert_eq!(
            parse_input("/edit-summary 1 • 压力来自工作"),
            Some(Input::Command(Command::EditSummary {
                index: 0,
                content: "• 压力来自工作".to_string(),
            }))
        );
    }

    #[test]
    fn test_destructive_commands_need_confirmation() {
        assert_eq!(
            parse_input("/clear"),
            Some(Input::Confirm(Command::ClearHistory, CLEAR_CONFIRM))
        );
        assert!(matches!(
            parse_input("/delete summaries"),
            Some(Input::Confirm(Command::ClearAll(ClearScope { turns: false, summaries: true }), _))
        ));
        assert!(matches!(parse_input("/delete everything"), Some(Input::Invalid(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(parse_input("/foo"), Some(Input::Invalid(msg)) if msg.contains("/foo")));
        assert_eq!(parse_input("/quit"), Some(Input::Quit));
    }
}
