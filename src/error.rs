//! 错误类型
//!
//! 配置类错误在任何 I/O 变更之前返回；单个文件的传输错误不会出现在这里，
//! 而是记录在 `SyncReport::errors` 中。

use std::path::PathBuf;
use thiserror::Error;

/// 工作区配置文件（`.s3sync.json`）错误
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("配置文件不存在: {0}")]
    NotFound(PathBuf),

    #[error("配置文件已存在: {0}")]
    AlreadyExists(PathBuf),

    #[error("读写配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置文件格式错误: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profile 不能为空")]
    MissingProfile,

    #[error("bucket 不能为空")]
    MissingBucket,

    #[error("folder 不能以 '/' 开头或结尾: {0}")]
    InvalidFolder(String),

    #[error("第 {index} 条同步记录无效: {reason}")]
    InvalidSyncedRecord { index: usize, reason: String },
}

/// 同步运行错误（在执行任何文件操作之前）
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("存储 {storage} 不可访问（bucket 可能不存在或没有权限）: {message}")]
    StorageUnavailable { storage: String, message: String },

    #[error("无法读写回收站占位文件（可能没有读写权限）: {0}")]
    TrashNotWritable(String),

    #[error("扫描{side}文件失败: {message}")]
    Scan { side: &'static str, message: String },

    #[error("无效的匹配规则: {0}")]
    Pattern(String),
}
