//! 回收站：删除和覆盖前先把文件移到带时间戳的目录，而不是直接删除

use crate::storage::Storage;
use anyhow::Result;
use chrono::{Local, TimeZone};
use std::path::Path;
use tracing::{debug, info};

/// 两侧的回收站目录（相对根目录）
pub const TRASH_FOLDER: &str = ".s3sync.trash";
/// 远程回收站占位文件
pub const TRASH_KEEP_FILE: &str = ".s3sync.trash/.keep";
pub const TRASH_KEEP_DATA: &str =
    "This folder holds files moved aside by s3sync before they were deleted or overwritten.\n";

const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// 一次运行共用一个时间戳目录
#[derive(Debug, Clone)]
pub struct TrashArchiver {
    run_stamp: String,
}

impl TrashArchiver {
    pub fn new() -> Self {
        Self {
            run_stamp: Local::now().format(STAMP_FORMAT).to_string(),
        }
    }

    pub fn with_stamp(run_stamp: impl Into<String>) -> Self {
        Self {
            run_stamp: run_stamp.into(),
        }
    }

    pub fn run_stamp(&self) -> &str {
        &self.run_stamp
    }

    /// 秒级时间戳转为本地时间的目录/文件名格式
    pub fn format_stamp(seconds: i64) -> String {
        Local
            .timestamp_opt(seconds, 0)
            .single()
            .map(|t| t.format(STAMP_FORMAT).to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// `<trash>/<run>/<name>.<文件修改时间><扩展名>`
    pub fn archive_path(&self, name: &str, modified_seconds: i64) -> String {
        format!(
            "{}/{}/{}.{}{}",
            TRASH_FOLDER,
            self.run_stamp,
            name,
            Self::format_stamp(modified_seconds),
            extension(name)
        )
    }

    /// 移入回收站，返回回收站中的路径
    pub async fn archive(
        &self,
        storage: &dyn Storage,
        name: &str,
        modified_seconds: i64,
    ) -> Result<String> {
        let target = self.archive_path(name, modified_seconds);
        storage.rename(name, &target).await?;
        debug!("已移入回收站: {} -> {} ({})", name, target, storage.name());
        Ok(target)
    }

    /// 确保回收站占位文件存在且可读
    pub async fn ensure_keep_file(storage: &dyn Storage) -> Result<()> {
        if !storage.exists(TRASH_KEEP_FILE).await? {
            storage
                .write(TRASH_KEEP_FILE, TRASH_KEEP_DATA.as_bytes().to_vec())
                .await?;
            info!("已创建回收站占位文件: {}", storage.name());
        }
        storage.read(TRASH_KEEP_FILE).await?;
        Ok(())
    }
}

impl Default for TrashArchiver {
    fn default() -> Self {
        Self::new()
    }
}

/// 含前导 `.` 的扩展名；没有扩展名或点文件返回空串
fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;

    fn local_seconds(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .timestamp()
    }

    #[test]
    fn test_archive_path_layout() {
        let trash = TrashArchiver::with_stamp("2024-05-06_07-08-09");
        let modified = local_seconds(2024, 1, 2, 3, 4, 5);

        assert_eq!(
            trash.archive_path("docs/a.txt", modified),
            ".s3sync.trash/2024-05-06_07-08-09/docs/a.txt.2024-01-02_03-04-05.txt"
        );
        assert_eq!(
            trash.archive_path("Makefile", modified),
            ".s3sync.trash/2024-05-06_07-08-09/Makefile.2024-01-02_03-04-05"
        );
        assert_eq!(
            trash.archive_path("home/.bashrc", modified),
            ".s3sync.trash/2024-05-06_07-08-09/home/.bashrc.2024-01-02_03-04-05"
        );
    }

    #[test]
    fn test_run_stamp_format() {
        let stamp = TrashArchiver::new().run_stamp().to_string();
        assert_eq!(stamp.len(), "2024-05-06_07-08-09".len());
        assert_eq!(&stamp[10..11], "_");
    }

    #[tokio::test]
    async fn test_archive_moves_file() {
        let storage = MemoryStorage::new("mem", 1).with_file("a.txt", "old", 100);
        let trash = TrashArchiver::with_stamp("run");

        let target = trash.archive(&storage, "a.txt", 100).await.unwrap();

        assert!(target.starts_with(".s3sync.trash/run/a.txt."));
        assert!(target.ends_with(".txt"));
        assert_eq!(storage.content(&target).as_deref(), Some("old"));
        assert!(storage.content("a.txt").is_none());
    }

    #[tokio::test]
    async fn test_ensure_keep_file_is_created_once() {
        let storage = MemoryStorage::new("mem", 10);

        TrashArchiver::ensure_keep_file(&storage).await.unwrap();
        assert_eq!(storage.content(TRASH_KEEP_FILE).as_deref(), Some(TRASH_KEEP_DATA));
        let created = storage.mtime(TRASH_KEEP_FILE);

        TrashArchiver::ensure_keep_file(&storage).await.unwrap();
        assert_eq!(storage.mtime(TRASH_KEEP_FILE), created);
    }

    #[tokio::test]
    async fn test_ensure_keep_file_reports_access_error() {
        let storage = MemoryStorage::new("mem", 10);
        storage.fail_on(TRASH_KEEP_FILE);
        assert!(TrashArchiver::ensure_keep_file(&storage).await.is_err());
    }
}
