pub mod local;
pub mod s3;

#[cfg(test)]
pub(crate) mod testing;

use crate::state::SyncSettings;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use local::LocalStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 文件信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub modified_time: i64,
    pub is_dir: bool,
}

/// 文件元数据（head）
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub size: u64,
    pub modified_time: i64,
    pub is_dir: bool,
}

/// 存储抽象接口
///
/// 本地目录与远程 bucket 都实现这个接口。路径一律是相对根目录、以 `/` 分隔的名称。
/// 上传即 `local.read` + `remote.write`，下载反之。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 递归列出所有文件
    async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<FileInfo>>;

    /// 获取文件元数据，不存在时返回 None
    async fn stat(&self, path: &str) -> Result<Option<FileMeta>>;

    /// 读取整个文件
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// 写入整个文件（覆盖）
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// 删除文件
    async fn delete(&self, path: &str) -> Result<()>;

    /// 检查文件是否存在
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    /// 复制文件（同一存储内）
    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let data = self.read(from).await?;
        self.write(to, data).await
    }

    /// 移动文件，目标已存在时覆盖
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }

    /// 检查存储是否可访问
    async fn check(&self) -> Result<()> {
        self.list_files(None).await.map(|_| ())
    }

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据工作区配置创建远程存储
pub fn create_remote_storage(settings: &SyncSettings) -> Result<Arc<dyn Storage>> {
    tracing::info!(
        "初始化S3存储: bucket={}, folder={:?}, profile={}",
        settings.bucket,
        settings.folder(),
        settings.profile
    );
    Ok(Arc::new(S3Storage::new(
        &settings.bucket,
        settings.folder(),
        settings.region.as_deref(),
        settings.endpoint.as_deref(),
    )?) as Arc<dyn Storage>)
}
