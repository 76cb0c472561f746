//! 对话会话集成测试：Mock 补全 + 内存存储 + watch 渲染面

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use xinyu::chat::{BlockKind, ChatSession, ClearScope, SubmitOutcome, SummaryPanel, UiSurface};
use xinyu::core::{spawn_session, ChatError, Command, RetryPolicy, SessionParts, UiState, FALLBACK_REPLIES};
use xinyu::llm::{MockCompletionClient, OnlineFlag};
use xinyu::memory::{
    load_json, MemoryStore, Role, Summary, SummaryBook, Turn, TurnId, CHAT_HISTORY_KEY,
};

struct Harness {
    llm: Arc<MockCompletionClient>,
    store: Arc<MemoryStore>,
    summaries: Arc<SummaryBook>,
    surface: Arc<UiSurface>,
}

impl Harness {
    fn new(llm: MockCompletionClient) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(llm, store)
    }

    fn with_store(llm: MockCompletionClient, store: Arc<MemoryStore>) -> Self {
        let (surface, _rx) = UiSurface::new();
        Self {
            llm: Arc::new(llm),
            summaries: Arc::new(SummaryBook::load(store.clone())),
            store,
            surface: Arc::new(surface),
        }
    }

    fn session(&self) -> ChatSession {
        ChatSession::new(
            self.llm.clone(),
            self.store.clone(),
            self.summaries.clone(),
            self.surface.clone(),
            0.7,
        )
    }

    fn blocks_of(&self, kind: BlockKind) -> Vec<String> {
        self.surface
            .snapshot()
            .blocks
            .into_iter()
            .filter(|b| b.block.kind == kind)
            .map(|b| b.block.content)
            .collect()
    }
}

#[tokio::test]
async fn test_submit_appends_user_and_reply() {
    let h = Harness::new(MockCompletionClient::with_replies([Ok(
        "Tell me more.\nBreathe slowly.".to_string(),
    )]));
    let mut session = h.session();
    assert_eq!(session.transcript().len(), 1);

    let outcome = session.submit("I feel anxious").await;
    assert!(matches!(outcome, SubmitOutcome::Replied(_)));

    let turns = session.turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1], Turn::user("I feel anxious"));
    assert_eq!(turns[2], Turn::assistant("Tell me more.<br>Breathe slowly."));

    // 请求上下文包含系统提示与用户消息
    let requests = h.llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.len(), 2);
    assert_eq!(requests[0].1, 0.7);

    let stored: Vec<Turn> = load_json(h.store.as_ref(), CHAT_HISTORY_KEY).unwrap();
    assert_eq!(stored, turns);

    let state = h.surface.snapshot();
    assert!(state.send_enabled);
    assert!(h.blocks_of(BlockKind::Pending).is_empty());
    assert_eq!(h.blocks_of(BlockKind::User), vec!["I feel anxious"]);
    assert_eq!(state.input_epoch, 1);
}

#[tokio::test]
async fn test_rate_limited_submit_uses_fallback() {
    let h = Harness::new(MockCompletionClient::with_replies([Err(ChatError::Api {
        status: 429,
        message: "Rate limit".to_string(),
    })]));
    let mut session = h.session();

    let outcome = session.submit("睡不着怎么办").await;
    match outcome {
        SubmitOutcome::Fallback { error, .. } => assert_eq!(error.status(), Some(429)),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.llm.calls(), 1);

    assert_eq!(
        h.blocks_of(BlockKind::Notice),
        vec!["系统提示：请求过于频繁，请稍后再试"]
    );
    let turns = session.turns();
    assert_eq!(turns.len(), 3);
    let last = turns.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(FALLBACK_REPLIES.contains(&last.content.as_str()));
    // 系统提示只显示，不进入记录
    assert!(turns.iter().all(|t| !t.content.starts_with("系统提示")));
    assert!(h.blocks_of(BlockKind::Pending).is_empty());
    assert!(h.surface.snapshot().send_enabled);
}

#[tokio::test]
async fn test_pending_block_while_waiting() {
    let h = Harness::new(MockCompletionClient::new().with_delay(Duration::from_millis(200)));
    let mut session = h.session();

    let (outcome, mid) = tokio::join!(session.submit("心里很乱"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.surface.snapshot()
    });

    assert!(matches!(outcome, SubmitOutcome::Replied(_)));
    assert!(!mid.send_enabled);
    assert_eq!(
        mid.blocks
            .iter()
            .filter(|b| b.block.kind == BlockKind::Pending)
            .count(),
        1
    );

    assert!(h.surface.snapshot().send_enabled);
    assert!(h.blocks_of(BlockKind::Pending).is_empty());
    assert_eq!(
        h.blocks_of(BlockKind::Assistant),
        vec!["（模拟回复）我听到了：心里很乱"]
    );
}

#[tokio::test]
async fn test_empty_input_is_ignored() {
    let h = Harness::new(MockCompletionClient::new());
    let mut session = h.session();
    let before = h.surface.snapshot();

    assert_eq!(session.submit("   ").await, SubmitOutcome::Ignored);
    assert_eq!(h.llm.calls(), 0);
    assert_eq!(session.transcript().len(), 1);

    let after = h.surface.snapshot();
    assert_eq!(after.blocks, before.blocks);
    assert_eq!(after.input_epoch, before.input_epoch);
}

#[tokio::test]
async fn test_reload_restores_persisted_transcript() {
    let store = Arc::new(MemoryStore::new());
    let h = Harness::with_store(MockCompletionClient::new(), store.clone());
    let mut session = h.session();
    session.submit("你好").await;
    let turns = session.turns();

    let h2 = Harness::with_store(MockCompletionClient::new(), store);
    let mut restored = h2.session();
    restored.reload();
    assert_eq!(restored.turns(), turns);
    // 欢迎语 + 用户 + 助手
    assert_eq!(h2.surface.snapshot().blocks.len(), 3);
}

#[tokio::test]
async fn test_edit_turn_updates_block_and_store() {
    let h = Harness::new(MockCompletionClient::new());
    let mut session = h.session();
    session.submit("工作压力大").await;
    session.render_all();

    let user_id = session
        .transcript()
        .entries()
        .find(|(_, t)| t.role == Role::User)
        .map(|(id, _)| id)
        .unwrap();
    session.edit_turn(user_id, "学习压力大").unwrap();

    assert_eq!(session.transcript().get(user_id).unwrap().content, "学习压力大");
    assert_eq!(h.blocks_of(BlockKind::User), vec!["学习压力大"]);
    let stored: Vec<Turn> = load_json(h.store.as_ref(), CHAT_HISTORY_KEY).unwrap();
    assert_eq!(stored[1].content, "学习压力大");

    // 空内容保留原文
    session.edit_turn(user_id, "  ").unwrap();
    assert_eq!(session.transcript().get(user_id).unwrap().content, "学习压力大");

    assert_eq!(
        session.edit_turn(TurnId(999), "x"),
        Err(ChatError::UnknownTurn(TurnId(999)))
    );
}

#[tokio::test]
async fn test_load_summary_replaces_transcript() {
    let h = Harness::new(MockCompletionClient::new());
    let snapshot = vec![
        Turn::system("旧的系统提示"),
        Turn::user("失眠"),
        Turn::assistant("能说说最近的作息吗？"),
    ];
    h.summaries.push(Summary::new("• 失眠", snapshot.clone()));

    let mut session = h.session();
    session.submit("今天的新问题").await;
    session.load_summary(0).unwrap();

    assert_eq!(session.turns(), snapshot);
    let stored: Vec<Turn> = load_json(h.store.as_ref(), CHAT_HISTORY_KEY).unwrap();
    assert_eq!(stored, snapshot);
    assert_eq!(h.blocks_of(BlockKind::User), vec!["失眠"]);

    assert_eq!(session.load_summary(5), Err(ChatError::UnknownSummary(5)));
}

#[tokio::test]
async fn test_clear_all_turns_reseeds_preamble() {
    let h = Harness::new(MockCompletionClient::new());
    h.summaries.push(Summary::new("• 焦虑来自考试", Vec::new()));
    let mut session = h.session();
    session.submit("考试快到了").await;

    session.clear_all(ClearScope::TURNS);
    let turns = session.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::System);
    assert!(turns[0].content.contains("根据上次咨询总结：• 焦虑来自考试"));
    assert_eq!(h.summaries.len(), 1);

    session.clear_all(ClearScope::SUMMARIES);
    assert!(h.summaries.is_empty());
    assert_eq!(h.surface.snapshot().summary, SummaryPanel::Placeholder);
}

#[tokio::test]
async fn test_clear_history_resets_surface() {
    let h = Harness::new(MockCompletionClient::new());
    let mut session = h.session();
    session.submit("你好").await;

    session.clear_history();
    assert_eq!(session.transcript().len(), 1);
    assert!(!h.store.contains(CHAT_HISTORY_KEY));
    let state = h.surface.snapshot();
    assert_eq!(state.blocks.len(), 1);
    assert_eq!(state.blocks[0].block.kind, BlockKind::Welcome);
    assert_eq!(state.alert.as_deref(), Some("已清除所有对话记录"));
}

async fn wait_for(rx: &mut watch::Receiver<UiState>, pred: impl Fn(&UiState) -> bool) -> UiState {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    })
    .await
    .expect("state never matched")
}

#[tokio::test]
async fn test_orchestrator_routes_commands() {
    let llm = Arc::new(MockCompletionClient::with_replies([
        Ok("我在听。".to_string()),
        Ok("• 最近压力较大".to_string()),
    ]));
    let (cmd_tx, mut state_rx) = spawn_session(SessionParts {
        llm: llm.clone(),
        store: Arc::new(MemoryStore::new()),
        connectivity: Arc::new(OnlineFlag::new()),
        chat_temperature: 0.7,
        summary_temperature: 0.5,
        retry: RetryPolicy::new(0, Duration::from_millis(10)),
    });

    cmd_tx.send(Command::Submit("最近压力很大".to_string())).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        s.blocks.iter().any(|b| b.block.kind == BlockKind::Assistant) && s.send_enabled
    })
    .await;
    assert_eq!(state.blocks[0].block.kind, BlockKind::Welcome);

    cmd_tx.send(Command::GenerateSummary).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        matches!(s.summary, SummaryPanel::Content { index: Some(0), .. })
    })
    .await;
    assert!(state.summary_enabled);
    // 总结请求温度
    assert_eq!(llm.requests()[1].1, 0.5);

    cmd_tx.send(Command::LocalSummary).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        matches!(s.summary, SummaryPanel::Content { index: None, .. })
    })
    .await;
    match state.summary {
        SummaryPanel::Content { text, .. } => assert!(text.starts_with("用户主要问题 (1个)")),
        other => panic!("unexpected panel {other:?}"),
    }

    cmd_tx.send(Command::ShowHistory).unwrap();
    let state = wait_for(&mut state_rx, |s| s.history.is_some()).await;
    assert_eq!(state.history.map(|h| h.len()), Some(1));

    cmd_tx.send(Command::Probe).unwrap();
    let state = wait_for(&mut state_rx, |s| s.alert.is_some()).await;
    assert_eq!(state.alert.as_deref(), Some("API连通正常，状态码：200"));

    cmd_tx.send(Command::Quit).unwrap();
}

fn delayed_session(llm: Arc<MockCompletionClient>) -> (
    tokio::sync::mpsc::UnboundedSender<Command>,
    watch::Receiver<UiState>,
) {
    spawn_session(SessionParts {
        llm,
        store: Arc::new(MemoryStore::new()),
        connectivity: Arc::new(OnlineFlag::new()),
        chat_temperature: 0.7,
        summary_temperature: 0.5,
        retry: RetryPolicy::new(0, Duration::from_millis(10)),
    })
}

#[tokio::test]
async fn test_back_to_back_summary_runs_once() {
    let llm = Arc::new(MockCompletionClient::new().with_delay(Duration::from_millis(100)));
    let (cmd_tx, mut state_rx) = delayed_session(llm.clone());

    cmd_tx.send(Command::GenerateSummary).unwrap();
    cmd_tx.send(Command::GenerateSummary).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        s.summary_enabled && matches!(s.summary, SummaryPanel::Content { index: Some(0), .. })
    })
    .await;
    assert!(state.summary_enabled);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(llm.calls(), 1);

    cmd_tx.send(Command::ShowHistory).unwrap();
    let state = wait_for(&mut state_rx, |s| s.history.is_some()).await;
    assert_eq!(state.history.map(|h| h.len()), Some(1));

    cmd_tx.send(Command::Quit).unwrap();
}

#[tokio::test]
async fn test_back_to_back_submit_sends_once() {
    let llm = Arc::new(MockCompletionClient::new().with_delay(Duration::from_millis(100)));
    let (cmd_tx, mut state_rx) = delayed_session(llm.clone());

    cmd_tx.send(Command::Submit("第一句".to_string())).unwrap();
    cmd_tx.send(Command::Submit("第二句".to_string())).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        s.send_enabled && s.blocks.iter().any(|b| b.block.kind == BlockKind::Assistant)
    })
    .await;

    let users: Vec<_> = state
        .blocks
        .iter()
        .filter(|b| b.block.kind == BlockKind::User)
        .map(|b| b.block.content.clone())
        .collect();
    assert_eq!(users, vec!["第一句"]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(llm.calls(), 1);

    cmd_tx.send(Command::Quit).unwrap();
}

#[tokio::test]
async fn test_cancel_right_after_summary_request() {
    let llm = Arc::new(MockCompletionClient::new().with_delay(Duration::from_millis(100)));
    let (cmd_tx, mut state_rx) = delayed_session(llm.clone());

    cmd_tx.send(Command::GenerateSummary).unwrap();
    cmd_tx.send(Command::CancelSummary).unwrap();
    let state = wait_for(&mut state_rx, |s| {
        s.summary_enabled && matches!(s.summary, SummaryPanel::Error(_))
    })
    .await;
    assert_eq!(state.summary, SummaryPanel::Error("请求已取消".to_string()));

    cmd_tx.send(Command::ShowHistory).unwrap();
    let state = wait_for(&mut state_rx, |s| s.history.is_some()).await;
    assert_eq!(state.history.map(|h| h.len()), Some(0));

    cmd_tx.send(Command::Quit).unwrap();
}
