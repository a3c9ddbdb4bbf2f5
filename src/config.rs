//! 应用配置模块
//!
//! 所有配置保存在同一个 `config.json` 中，每个模块占用一个顶层键
//! （`sync`、`log`），读写时不影响其他键。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

const CONFIG_FILE: &str = "config.json";

/// 传输配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// 最大并发传输数
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,
    /// 匹配 include/exclude 规则时是否区分大小写
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_max_concurrent_transfers() -> usize {
    4
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: default_max_concurrent_transfers(),
            case_sensitive: false,
        }
    }
}

impl TransferConfig {
    /// 从配置文件加载传输配置
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "sync").unwrap_or_default()
    }

    /// 保存传输配置
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        save_section(config_dir, "sync", self)
    }
}

/// 读取 config.json 中的某个顶层键，文件缺失或格式错误时返回 None
pub(crate) fn load_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let mut config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    let section = config.get_mut(key)?.take();
    serde_json::from_value(section).ok()
}

/// 更新 config.json 中的某个顶层键
pub(crate) fn save_section<T: Serialize>(config_dir: &Path, key: &str, value: &T) -> io::Result<()> {
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    // 读取现有配置
    let mut config: serde_json::Value = if config_file.exists() {
        let content = fs::read_to_string(&config_file)?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };
    if !config.is_object() {
        config = serde_json::json!({});
    }

    config[key] = serde_json::to_value(value)?;

    fs::write(&config_file, serde_json::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransferConfig::load(dir.path());
        assert_eq!(config, TransferConfig::default());
        assert_eq!(config.max_concurrent_transfers, 4);
        assert!(!config.case_sensitive);
    }

    #[test]
    fn test_save_keeps_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"log":{"level":"debug"},"sync":{"maxConcurrentTransfers":2}}"#,
        )
        .unwrap();

        let mut config = TransferConfig::load(dir.path());
        assert_eq!(config.max_concurrent_transfers, 2);

        config.case_sensitive = true;
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw["log"]["level"], "debug");
        assert_eq!(raw["sync"]["caseSensitive"], true);
        assert_eq!(TransferConfig::load(dir.path()), config);
    }
}
