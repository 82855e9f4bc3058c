use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// 固定窗口限流器
///
/// 每个标识（通常是客户端 IP）单独计数。窗口到期后从 1 重新开始，
/// 因此在两个窗口交界处最多可能放行 `2 * limit` 次，这是固定窗口的固有误差。
///
/// 计数表只存在于当前进程，多实例部署时实际上限会乘以实例数。
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    /// 表中条目超过该数量时清理已过期条目
    max_entries: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl RateLimiter {
    pub fn new(max_entries: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// 检查并消耗一次配额，返回是否放行
    ///
    /// - 无记录或窗口已过期：开启新窗口，计数为 1，放行
    /// - 计数小于 `limit`：计数加一，放行
    /// - 否则拒绝，计数不变
    pub fn check_and_consume(&self, identifier: &str, limit: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() >= self.max_entries && !windows.contains_key(identifier) {
            let before = windows.len();
            windows.retain(|_, w| now < w.reset_at);
            tracing::debug!(removed = before - windows.len(), "purged expired rate limit entries");
        }

        match windows.get_mut(identifier) {
            Some(w) if now < w.reset_at => {
                if w.count < limit {
                    w.count += 1;
                    true
                } else {
                    false
                }
            }
            _ => {
                windows.insert(
                    identifier.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                true
            }
        }
    }

    /// 删除所有已过期的窗口，返回删除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, w| now < w.reset_at);
        before - windows.len()
    }

    /// 当前记录的标识数量
    pub fn len(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
