use std::{
    collections::BTreeMap,
    future::Future,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 浏览量记录
///
/// 落盘格式为单个 JSON 对象，文章 id 作为字符串键，`lastUpdated` 与计数并列：
///
/// ```json
/// { "42": 3, "7": 1, "lastUpdated": "2026-10-16T07:00:00Z" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    #[serde(
        rename = "lastUpdated",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(flatten)]
    counts: BTreeMap<String, u64>,
}

impl ViewRecord {
    pub fn get(&self, post_id: u64) -> u64 {
        self.counts.get(&post_id.to_string()).copied().unwrap_or(0)
    }

    /// 计数加一，不存在时从 1 开始，返回新值
    pub fn increment(&mut self, post_id: u64) -> u64 {
        let count = self.counts.entry(post_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// 所有计数，忽略无法解析为 id 的键
    pub fn counts(&self) -> BTreeMap<u64, u64> {
        self.counts
            .iter()
            .filter_map(|(k, v)| k.parse().ok().map(|id| (id, *v)))
            .collect()
    }
}

/// 浏览量的持久化后端
///
/// 每次读写都针对完整记录，没有增量写入。
pub trait ViewStore: Send + Sync + 'static {
    /// 读取完整记录，尚未创建时返回空记录
    fn load(&self) -> impl Future<Output = Result<ViewRecord>> + Send;

    /// 覆盖写入完整记录
    fn save(&self, record: &ViewRecord) -> impl Future<Output = Result<()>> + Send;
}

/// 单个 JSON 文件存储
///
/// 写入时先写同目录下的临时文件，再重命名覆盖，读者不会看到写了一半的文件。
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ViewStore for JsonFileStore {
    async fn load(&self) -> Result<ViewRecord> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(ViewRecord::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ViewRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, record: &ViewRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(io::Error::other)?
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// 内存存储，进程退出后数据丢失
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<ViewRecord>,
}

impl ViewStore for MemoryStore {
    async fn load(&self) -> Result<ViewRecord> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    async fn save(&self, record: &ViewRecord) -> Result<()> {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = record.clone();
        Ok(())
    }
}
