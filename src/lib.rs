pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod storage;

pub use crate::core::{
    Direction, PendingOperation, Reason, SyncConfig, SyncEngine, SyncPlan, SyncReport,
    SyncSession,
};
pub use error::{SettingsError, SyncError};
pub use state::{SyncSettings, SyncedRecord, SyncedStateStore};

/// 平台目录（不依赖 dirs crate）
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux: 优先 XDG_CONFIG_HOME
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }

    /// 应用配置目录（config.json 与日志文件所在位置）
    pub fn app_config_dir() -> PathBuf {
        config_dir()
            .map(|p| p.join("s3sync"))
            .unwrap_or_else(|| PathBuf::from(".s3sync"))
    }
}
