use super::{FileInfo, FileMeta, Storage};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use walkdir::WalkDir;

/// 本地工作区目录
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        let name = format!("local:{}", base_path.display());
        Ok(Self { base_path, name })
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = path.trim_start_matches('/').trim_start_matches('\\');
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    fn modified_seconds(metadata: &std::fs::Metadata) -> Result<i64> {
        Ok(metadata.modified()?.duration_since(UNIX_EPOCH)?.as_secs() as i64)
    }

    /// 同目录下的临时文件名，避免与工作区内的其他文件冲突
    fn temp_path(full_path: &Path) -> PathBuf {
        let mut name = full_path.file_name().unwrap_or_default().to_os_string();
        name.push(".s3sync-partial");
        full_path.with_file_name(name)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<FileInfo>> {
        let base = prefix.map_or_else(|| self.base_path.clone(), |p| self.resolve_path(p));

        if !base.exists() {
            return Ok(Vec::new());
        }

        let base_path = self.base_path.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|entry| {
                    let metadata = entry.metadata().ok()?;
                    let relative_path = entry.path().strip_prefix(&base_path).ok()?.to_str()?;

                    // 跳过根目录本身
                    if relative_path.is_empty() {
                        return None;
                    }

                    Some(FileInfo {
                        path: Self::normalize_path(relative_path),
                        size: if metadata.is_dir() { 0 } else { metadata.len() },
                        modified_time: Self::modified_seconds(&metadata).ok()?,
                        is_dir: metadata.is_dir(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(files)
    }

    async fn stat(&self, path: &str) -> Result<Option<FileMeta>> {
        match fs::metadata(self.resolve_path(path)).await {
            Ok(metadata) => Ok(Some(FileMeta {
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified_time: Self::modified_seconds(&metadata)?,
                is_dir: metadata.is_dir(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve_path(path)).await?)
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let full_path = self.resolve_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let temp_path = Self::temp_path(&full_path);
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        fs::rename(&temp_path, &full_path).await?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve_path(from);
        let target = self.resolve_path(to);

        if fs::metadata(&source).await.is_err() {
            anyhow::bail!("文件不存在: {}", source.display());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&source, &target).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
