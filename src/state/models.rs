use serde::{Deserialize, Serialize};

/// 工作区配置文件名
pub const SETTINGS_FILE: &str = ".s3sync.json";

/// 上一次确认同步成功时的时间戳对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedRecord {
    pub name: String,
    /// 本地文件修改时间（秒）
    pub local_time: i64,
    /// 远程对象修改时间（秒）
    pub remote_time: i64,
}

impl SyncedRecord {
    pub fn new(name: impl Into<String>, local_time: i64, remote_time: i64) -> Self {
        Self {
            name: name.into(),
            local_time,
            remote_time,
        }
    }
}

/// 工作区配置文件，同时保存已同步状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub synced: Vec<SyncedRecord>,
}

fn default_profile() -> String {
    "default".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            bucket: String::new(),
            folder: None,
            region: None,
            endpoint: None,
            include: Vec::new(),
            exclude: Vec::new(),
            synced: Vec::new(),
        }
    }
}
