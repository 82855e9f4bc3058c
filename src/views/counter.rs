use std::collections::BTreeMap;

use chrono::Utc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::store::ViewStore;
use crate::error::{Error, Result};

const CHANNEL_CAPACITY: usize = 256;

enum Command {
    Increment {
        post_id: u64,
        reply: oneshot::Sender<Result<u64>>,
    },
    GetAll {
        reply: oneshot::Sender<Result<BTreeMap<u64, u64>>>,
    },
    GetOne {
        post_id: u64,
        reply: oneshot::Sender<Result<u64>>,
    },
}

/// 浏览量计数器
///
/// 所有操作经由同一个 actor 任务串行执行，该任务独占底层 [`ViewStore`]。
/// 同一进程内的并发自增因此不会丢失更新；多个进程共享同一个文件时不作保证。
#[derive(Clone)]
pub struct ViewCounter {
    tx: mpsc::Sender<Command>,
}

impl ViewCounter {
    /// 启动计数 actor，必须在 tokio 运行时内调用
    pub fn spawn<S: ViewStore>(store: S) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(CounterActor { store, rx }.run());
        Self { tx }
    }

    /// 浏览量加一并返回新值
    ///
    /// 持久化失败时计数保持不变并返回错误。
    pub async fn increment(&self, post_id: u64) -> Result<u64> {
        self.request(|reply| Command::Increment { post_id, reply })
            .await
    }

    /// 所有文章的浏览量，读取失败时返回空表
    pub async fn get_all(&self) -> BTreeMap<u64, u64> {
        self.request(|reply| Command::GetAll { reply })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to read view counts");
                BTreeMap::new()
            })
    }

    /// 单篇文章的浏览量，不存在或读取失败时为 0
    pub async fn get_one(&self, post_id: u64) -> u64 {
        self.request(|reply| Command::GetOne { post_id, reply })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(post_id, error = %e, "failed to read view count");
                0
            })
    }

    /// 后台记录一次浏览，失败只记日志，不影响调用方
    pub fn track(&self, post_id: u64) -> JoinHandle<()> {
        let counter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = counter.increment(post_id).await {
                tracing::warn!(post_id, error = %e, "view tracking failed");
            }
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| Error::CounterStopped)?;
        rx.await.map_err(|_| Error::CounterStopped)?
    }
}

struct CounterActor<S> {
    store: S,
    rx: mpsc::Receiver<Command>,
}

impl<S: ViewStore> CounterActor<S> {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Increment { post_id, reply } => {
                    let result = self.increment(post_id).await;
                    if let Err(e) = &result {
                        tracing::warn!(post_id, error = %e, "failed to persist view count");
                    }
                    let _ = reply.send(result);
                }
                Command::GetAll { reply } => {
                    let _ = reply.send(self.store.load().await.map(|r| r.counts()));
                }
                Command::GetOne { post_id, reply } => {
                    let _ = reply.send(self.store.load().await.map(|r| r.get(post_id)));
                }
            }
        }
        tracing::debug!("view counter stopped");
    }

    async fn increment(&self, post_id: u64) -> Result<u64> {
        let mut record = self.store.load().await?;
        let count = record.increment(post_id);
        record.last_updated = Some(Utc::now());
        self.store.save(&record).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::views::store::{JsonFileStore, MemoryStore, ViewRecord};

    /// 可以切换为写入失败的存储
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        fail_writes: Arc<AtomicBool>,
    }

    impl ViewStore for FlakyStore {
        async fn load(&self) -> Result<ViewRecord> {
            self.inner.load().await
        }

        async fn save(&self, record: &ViewRecord) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(record).await
        }
    }

    #[tokio::test]
    async fn test_sequential_increments() {
        let counter = ViewCounter::spawn(MemoryStore::default());

        assert_eq!(counter.increment(42).await.unwrap(), 1);
        assert_eq!(counter.increment(42).await.unwrap(), 2);
        assert_eq!(counter.increment(42).await.unwrap(), 3);

        assert_eq!(counter.get_one(42).await, 3);
        assert_eq!(counter.get_one(43).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let counter = ViewCounter::spawn(JsonFileStore::new(dir.path().join("views.json")));

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment(if i % 2 == 0 { 1 } else { 2 }).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().expect("自增失败");
        }

        let all = counter.get_all().await;
        assert_eq!(all.get(&1), Some(&25));
        assert_eq!(all.get(&2), Some(&25));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_count_unchanged() {
        let store = FlakyStore::default();
        let counter = ViewCounter::spawn(store.clone());

        assert_eq!(counter.increment(9).await.unwrap(), 1);

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(counter.increment(9).await.is_err());
        assert_eq!(counter.get_one(9).await, 1);

        store.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(counter.increment(9).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_track_is_fire_and_forget() {
        let store = FlakyStore::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        let counter = ViewCounter::spawn(store.clone());

        // 失败不会 panic，也不会传播给调用方
        counter.track(3).await.expect("任务 panic");
        assert_eq!(counter.get_one(3).await, 0);

        store.fail_writes.store(false, Ordering::SeqCst);
        counter.track(3).await.expect("任务 panic");
        assert_eq!(counter.get_one(3).await, 1);
    }

    #[tokio::test]
    async fn test_file_backed_counts_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.json");

        let counter = ViewCounter::spawn(JsonFileStore::new(&path));
        counter.increment(7).await.unwrap();
        counter.increment(7).await.unwrap();

        let counter = ViewCounter::spawn(JsonFileStore::new(&path));
        assert_eq!(counter.get_one(7).await, 2);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["7"], 2);
        assert!(raw["lastUpdated"].is_string());
    }
}
