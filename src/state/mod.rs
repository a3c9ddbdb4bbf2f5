pub mod models;
pub use models::*;

use crate::core::trash::TRASH_FOLDER;
use crate::error::SettingsError;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

impl SyncSettings {
    /// 从文件加载并校验；任何一条同步记录无效都会导致整个文件加载失败
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let settings = Self::from_json(&content)?;
        debug!("已加载配置文件 {:?} ({} 条同步记录)", path, settings.synced.len());
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        let settings: SyncSettings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.profile.is_empty() {
            return Err(SettingsError::MissingProfile);
        }
        if self.bucket.is_empty() {
            return Err(SettingsError::MissingBucket);
        }
        if let Some(folder) = &self.folder {
            if folder.starts_with('/') || folder.ends_with('/') {
                return Err(SettingsError::InvalidFolder(folder.clone()));
            }
        }

        let mut names = HashSet::new();
        for (index, record) in self.synced.iter().enumerate() {
            let reason = if record.name.is_empty() {
                Some("name 不能为空".to_string())
            } else if record.local_time <= 0 {
                Some(format!("{}: localTime 必须为正数", record.name))
            } else if record.remote_time <= 0 {
                Some(format!("{}: remoteTime 必须为正数", record.name))
            } else if !names.insert(record.name.as_str()) {
                Some(format!("{}: 文件名重复", record.name))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(SettingsError::InvalidSyncedRecord { index, reason });
            }
        }

        Ok(())
    }

    /// 新建配置文件模板（bucket 需要用户填写）
    pub fn template() -> Self {
        Self {
            folder: Some(String::new()),
            include: vec!["**/**".to_string()],
            exclude: [
                "**/.DS_Store",
                "**/.git/**",
                "**/bin/**",
                "**/bower_components/**",
                "**/desktop.ini",
                "**/node_modules/**",
                "**/obj/**",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ..Default::default()
        }
    }

    /// 写出模板；文件已存在且未指定 force 时拒绝覆盖
    pub fn create(path: &Path, force: bool) -> Result<Self, SettingsError> {
        if path.exists() && !force {
            return Err(SettingsError::AlreadyExists(path.to_path_buf()));
        }
        let settings = Self::template();
        settings.save(path)?;
        info!("已创建配置文件: {:?}", path);
        Ok(settings)
    }

    /// 整体替换写入：先写临时文件再重命名，中途失败不会留下半个文件
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let content = serde_json::to_string_pretty(self)?;
        if let Err(e) = fs::write(&temp_path, content).and_then(|_| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// 远程目录（空字符串视为未设置）
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref().filter(|f| !f.is_empty())
    }

    /// 排除规则，总是包含配置文件自身和回收站
    pub fn exclude_patterns(&self) -> Vec<String> {
        let mut patterns = self.exclude.clone();
        patterns.push(format!("**/{}", SETTINGS_FILE));
        patterns.push(format!("**/{}/**", TRASH_FOLDER));
        patterns
    }

    pub fn include_patterns(&self) -> Vec<String> {
        self.include.clone()
    }

    pub fn store(&self) -> SyncedStateStore {
        SyncedStateStore::from_records(self.synced.iter().cloned())
    }

    pub fn summary(&self) -> String {
        let patterns = |p: &[String]| {
            if p.is_empty() {
                "(空)".to_string()
            } else {
                p.join(", ")
            }
        };
        format!(
            "S3 同步配置:\n  - AWS Profile: {}\n  - S3 Bucket: {}\n  - Bucket 目录: {}\n  - 包含规则: {}\n  - 排除规则: {}",
            self.profile,
            self.bucket,
            self.folder().unwrap_or("(无)"),
            patterns(&self.include_patterns()),
            patterns(&self.exclude_patterns()),
        )
    }
}

/// 已同步状态：按文件名索引，在内存中修改，运行结束时整体写回
#[derive(Debug, Clone, Default)]
pub struct SyncedStateStore {
    records: BTreeMap<String, SyncedRecord>,
    changed: bool,
}

impl SyncedStateStore {
    pub fn from_records(records: impl IntoIterator<Item = SyncedRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
            changed: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&SyncedRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<SyncedRecord> {
        let removed = self.records.remove(name);
        if removed.is_some() {
            self.changed = true;
        }
        removed
    }

    pub fn upsert(&mut self, record: SyncedRecord) {
        if self.records.get(&record.name) != Some(&record) {
            self.records.insert(record.name.clone(), record);
            self.changed = true;
        }
    }

    /// 单向同步后用本次传输结果整体替换
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = SyncedRecord>) {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        if records != self.records {
            self.records = records;
            self.changed = true;
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn to_records(&self) -> Vec<SyncedRecord> {
        self.records.values().cloned().collect()
    }
}
