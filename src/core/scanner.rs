use crate::core::matcher::NameMatcher;
use crate::storage::{FileInfo, Storage};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// 某一侧在某个时刻的文件快照项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// 相对根目录、以 `/` 分隔的名称
    pub name: String,
    /// 修改时间（秒，截断）
    pub modified_seconds: i64,
    pub size: Option<u64>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, modified_seconds: i64) -> Self {
        Self {
            name: name.into(),
            modified_seconds,
            size: None,
        }
    }
}

impl From<FileInfo> for FileRecord {
    fn from(info: FileInfo) -> Self {
        Self {
            name: info.path,
            modified_seconds: info.modified_time,
            size: Some(info.size),
        }
    }
}

/// 按名称索引的快照
pub type Snapshot = HashMap<String, FileRecord>;

/// 构建快照（测试和报告用）
pub fn snapshot(records: impl IntoIterator<Item = FileRecord>) -> Snapshot {
    records.into_iter().map(|r| (r.name.clone(), r)).collect()
}

/// 文件扫描器
pub struct FileScanner {
    matcher: NameMatcher,
}

impl FileScanner {
    pub fn new(matcher: NameMatcher) -> Self {
        Self { matcher }
    }

    /// 扫描存储，跳过目录与不匹配 include/exclude 的文件
    pub async fn scan_storage(&self, storage: &dyn Storage) -> Result<Snapshot> {
        info!("开始扫描存储: {}", storage.name());

        let files = storage.list_files(None).await?;
        debug!("list_files 返回 {} 个条目", files.len());

        let mut tree = Snapshot::with_capacity(files.len());
        let mut excluded_count = 0;
        let mut dir_count = 0;

        for file in files {
            if file.is_dir {
                dir_count += 1;
                continue;
            }

            if !self.matcher.is_match(&file.path) {
                debug!("排除文件: {}", file.path);
                excluded_count += 1;
                continue;
            }

            tree.insert(file.path.clone(), file.into());
        }

        info!(
            "扫描完成: {} - {} 个文件, {} 个目录, {} 个被排除",
            storage.name(),
            tree.len(),
            dir_count,
            excluded_count
        );

        Ok(tree)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(NameMatcher::all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;

    #[tokio::test]
    async fn test_scan_applies_matcher() {
        let storage = MemoryStorage::new("mem", 1)
            .with_file("a.txt", "a", 10)
            .with_file(".s3sync.trash/.keep", "keep", 11)
            .with_file("node_modules/x/index.js", "x", 12);

        let matcher = NameMatcher::new(
            &["**/**".to_string()],
            &[
                "**/node_modules/**".to_string(),
                "**/.s3sync.trash/**".to_string(),
            ],
            false,
        )
        .unwrap();

        let tree = FileScanner::new(matcher).scan_storage(&storage).await.unwrap();
        assert_eq!(tree.len(), 1);
        let record = &tree["a.txt"];
        assert_eq!(record.modified_seconds, 10);
        assert_eq!(record.size, Some(1));
    }
}
