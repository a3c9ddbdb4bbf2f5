//! 测试用内存存储：可控的修改时间、可注入失败

use super::{FileInfo, FileMeta, Storage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub(crate) struct MemoryStorage {
    name: String,
    files: Mutex<BTreeMap<String, (Vec<u8>, i64)>>,
    /// 写入时使用的"存储时钟"，每次写入递增
    clock: AtomicI64,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    pub fn new(name: &str, clock_start: i64) -> Self {
        Self {
            name: name.to_string(),
            files: Mutex::new(BTreeMap::new()),
            clock: AtomicI64::new(clock_start),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_file(self, path: &str, data: &str, modified: i64) -> Self {
        self.put(path, data, modified);
        self
    }

    pub fn put(&self, path: &str, data: &str, modified: i64) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.as_bytes().to_vec(), modified));
    }

    /// 对该路径的读写都返回错误
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn mtime(&self, path: &str) -> Option<i64> {
        self.files.lock().unwrap().get(path).map(|(_, m)| *m)
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(d, _)| String::from_utf8_lossy(d).into_owned())
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    fn check_failing(&self, path: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            anyhow::bail!("injected failure: {}", path);
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_files(&self, _prefix: Option<&str>) -> Result<Vec<FileInfo>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(path, (data, modified))| FileInfo {
                path: path.clone(),
                size: data.len() as u64,
                modified_time: *modified,
                is_dir: false,
            })
            .collect())
    }

    async fn stat(&self, path: &str) -> Result<Option<FileMeta>> {
        Ok(self.files.lock().unwrap().get(path).map(|(data, modified)| FileMeta {
            size: data.len() as u64,
            modified_time: *modified,
            is_dir: false,
        }))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.check_failing(path)?;
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(d, _)| d.clone())
            .ok_or_else(|| anyhow::anyhow!("not found: {}", path))
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.check_failing(path)?;
        let modified = self.clock.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (data, modified));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.check_failing(from)?;
        let mut files = self.files.lock().unwrap();
        let entry = files
            .remove(from)
            .ok_or_else(|| anyhow::anyhow!("not found: {}", from))?;
        files.insert(to.to_string(), entry);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
