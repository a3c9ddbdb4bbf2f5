use crate::core::comparator::{Direction, PendingOperation, Reason, SyncPlan};
use serde::Serialize;
use std::collections::HashMap;

/// 同一文件同时需要上传和下载时无法自动解决的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// 两侧原因不同
    DifferentReasons,
    /// 两侧修改时间相同，无法判断哪一侧更新
    AmbiguousTimestamps,
    /// 两侧都从未同步过
    NeverSynced,
}

impl ConflictKind {
    pub fn description(&self) -> &'static str {
        match self {
            ConflictKind::DifferentReasons => "上传和下载的原因不同",
            ConflictKind::AmbiguousTimestamps => "两侧修改时间相同",
            ConflictKind::NeverSynced => "两侧都有文件但从未同步",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// 冲突记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub name: String,
    pub kind: ConflictKind,
    pub upload: PendingOperation,
    pub download: PendingOperation,
}

/// 冲突解决结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Upload,
    Download,
    Ignore(ConflictKind),
}

/// 单个名称的冲突判定：原因相同且为 newer / doesNotExist 时以修改时间较晚的一侧为准
pub fn resolve(upload: &PendingOperation, download: &PendingOperation) -> ConflictResolution {
    if upload.reason != download.reason {
        return ConflictResolution::Ignore(ConflictKind::DifferentReasons);
    }

    match upload.reason {
        Reason::Newer | Reason::DoesNotExist => {
            match upload.modified_seconds.cmp(&download.modified_seconds) {
                std::cmp::Ordering::Greater => ConflictResolution::Upload,
                std::cmp::Ordering::Less => ConflictResolution::Download,
                std::cmp::Ordering::Equal => {
                    ConflictResolution::Ignore(ConflictKind::AmbiguousTimestamps)
                }
            }
        }
        Reason::HasNotBeenSynced => ConflictResolution::Ignore(ConflictKind::NeverSynced),
        _ => ConflictResolution::Ignore(ConflictKind::AmbiguousTimestamps),
    }
}

/// 处理双向同步中同时出现在上传和下载里的名称，返回新的计划
///
/// 解决后同一名称不会同时出现在上传和下载中；无法解决的两侧都被丢弃并记入 `conflicts`。
pub fn resolve_conflicts(plan: SyncPlan) -> SyncPlan {
    if plan.direction != Direction::Both {
        return plan;
    }

    let SyncPlan {
        direction,
        uploads,
        downloads,
        local_deletes,
        remote_deletes,
        records_to_remove,
        records_ignored,
        mut uploads_ignored,
        mut downloads_ignored,
        mut conflicts,
        unsynced_overlap,
    } = plan;

    let download_index: HashMap<&str, &PendingOperation> =
        downloads.iter().map(|op| (op.name.as_str(), op)).collect();

    let mut kept_uploads = Vec::with_capacity(uploads.len());
    let mut dropped_downloads = HashMap::new();

    for upload in &uploads {
        let Some(download) = download_index.get(upload.name.as_str()) else {
            kept_uploads.push(upload.clone());
            continue;
        };

        match resolve(upload, download) {
            ConflictResolution::Upload => {
                tracing::debug!("冲突: {} 本地较新，上传", upload.name);
                kept_uploads.push(upload.clone());
                dropped_downloads.insert(upload.name.as_str(), false);
            }
            ConflictResolution::Download => {
                tracing::debug!("冲突: {} 远程较新，下载", upload.name);
            }
            ConflictResolution::Ignore(kind) => {
                tracing::warn!("冲突无法解决，跳过: {} ({})", upload.name, kind);
                uploads_ignored.push(upload.clone());
                dropped_downloads.insert(upload.name.as_str(), true);
                conflicts.push(ConflictRecord {
                    name: upload.name.clone(),
                    kind,
                    upload: upload.clone(),
                    download: (*download).clone(),
                });
            }
        }
    }

    let mut kept_downloads = Vec::with_capacity(downloads.len());
    for download in &downloads {
        match dropped_downloads.get(download.name.as_str()) {
            Some(true) => downloads_ignored.push(download.clone()),
            Some(false) => {}
            None => kept_downloads.push(download.clone()),
        }
    }

    SyncPlan {
        direction,
        uploads: kept_uploads,
        downloads: kept_downloads,
        local_deletes,
        remote_deletes,
        records_to_remove,
        records_ignored,
        uploads_ignored,
        downloads_ignored,
        conflicts,
        unsynced_overlap,
    }
}
