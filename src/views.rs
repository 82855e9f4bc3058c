mod counter;
mod store;

pub use self::{
    counter::ViewCounter,
    store::{JsonFileStore, MemoryStore, ViewRecord, ViewStore},
};

use crate::config::{Config, ViewsBackend};

/// 按配置选择存储后端并启动计数器
pub fn spawn_from_config(config: &Config) -> ViewCounter {
    match config.views_backend {
        ViewsBackend::Json => {
            tracing::info!(path = %config.views_file.display(), "view counts stored in json file");
            ViewCounter::spawn(JsonFileStore::new(&config.views_file))
        }
        ViewsBackend::Memory => {
            tracing::info!("view counts kept in memory");
            ViewCounter::spawn(MemoryStore::default())
        }
    }
}
