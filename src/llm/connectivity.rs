//! 网络连通状态
//!
//! HTTP 客户端在连接失败时标记离线、收到任何响应时标记在线。
//! 总结生成前先查询；标记为离线时先探测一次端点，探测成功即恢复在线。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    fn set_online(&self, online: bool);
}

/// 可共享的在线标记，默认在线
#[derive(Clone, Debug)]
pub struct OnlineFlag(Arc<AtomicBool>);

impl OnlineFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Default for OnlineFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity for OnlineFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set_online(&self, online: bool) {
        let was = self.0.swap(online, Ordering::Relaxed);
        if was != online {
            tracing::info!(online, "Connectivity changed");
        }
    }
}
