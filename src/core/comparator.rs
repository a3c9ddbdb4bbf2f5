use crate::core::conflict::ConflictRecord;
use crate::core::scanner::{FileRecord, Snapshot};
use crate::state::{SyncedRecord, SyncedStateStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 本地覆盖远程
    Upload,
    /// 远程覆盖本地
    Download,
    /// 双向同步
    Both,
}

impl Direction {
    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Upload => "上传",
            Direction::Download => "下载",
            Direction::Both => "同步",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// 安排某个动作的原因，冲突判定时按原因比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reason {
    None,
    DoesNotExist,
    HasNotBeenSynced,
    Newer,
    Uploading,
    Downloading,
}

impl Reason {
    pub fn text(&self) -> &'static str {
        match self {
            Reason::None => "",
            Reason::DoesNotExist => "does not exist",
            Reason::HasNotBeenSynced => "has not been synced",
            Reason::Newer => "is newer",
            Reason::Uploading => "uploading",
            Reason::Downloading => "downloading",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// 待执行的上传或下载
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub name: String,
    /// 源端的修改时间
    pub modified_seconds: i64,
    pub size: Option<u64>,
    pub direction: Direction,
    pub reason: Reason,
    pub local_time: Option<i64>,
    pub remote_time: Option<i64>,
}

impl PendingOperation {
    pub fn upload(file: &FileRecord, reason: Reason) -> Self {
        Self {
            name: file.name.clone(),
            modified_seconds: file.modified_seconds,
            size: file.size,
            direction: Direction::Upload,
            reason,
            local_time: Some(file.modified_seconds),
            remote_time: None,
        }
    }

    pub fn download(file: &FileRecord, reason: Reason) -> Self {
        Self {
            name: file.name.clone(),
            modified_seconds: file.modified_seconds,
            size: file.size,
            direction: Direction::Download,
            reason,
            local_time: None,
            remote_time: Some(file.modified_seconds),
        }
    }

    /// 两端时间都已知（传输完成后）才能生成同步记录
    pub fn to_synced_record(&self) -> Option<SyncedRecord> {
        match (self.local_time, self.remote_time) {
            (Some(local), Some(remote)) => Some(SyncedRecord::new(&self.name, local, remote)),
            _ => None,
        }
    }
}

/// 一次分析的结果：要删除的、要传输的、被忽略的
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub direction: Direction,
    pub uploads: Vec<PendingOperation>,
    pub downloads: Vec<PendingOperation>,
    /// 移入本地回收站
    pub local_deletes: Vec<FileRecord>,
    /// 移入远程回收站
    pub remote_deletes: Vec<FileRecord>,
    pub records_to_remove: Vec<SyncedRecord>,
    /// 记录时间晚于文件时间，无法判断，整个名称跳过
    pub records_ignored: Vec<SyncedRecord>,
    pub uploads_ignored: Vec<PendingOperation>,
    pub downloads_ignored: Vec<PendingOperation>,
    pub conflicts: Vec<ConflictRecord>,
    /// 没有任何同步记录但两端都有文件
    pub unsynced_overlap: bool,
}

impl SyncPlan {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            uploads: Vec::new(),
            downloads: Vec::new(),
            local_deletes: Vec::new(),
            remote_deletes: Vec::new(),
            records_to_remove: Vec::new(),
            records_ignored: Vec::new(),
            uploads_ignored: Vec::new(),
            downloads_ignored: Vec::new(),
            conflicts: Vec::new(),
            unsynced_overlap: false,
        }
    }

    /// 需要执行的动作数
    pub fn todo_count(&self) -> usize {
        let mut count = self.local_deletes.len()
            + self.remote_deletes.len()
            + self.uploads.len()
            + self.downloads.len();
        if self.direction == Direction::Both {
            count += self.records_to_remove.len();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.todo_count() == 0
    }

    pub fn summary(&self) -> ActionSummary {
        let bytes = |ops: &[PendingOperation]| ops.iter().filter_map(|op| op.size).sum();

        ActionSummary {
            upload_count: self.uploads.len(),
            upload_bytes: bytes(&self.uploads),
            download_count: self.downloads.len(),
            download_bytes: bytes(&self.downloads),
            local_delete_count: self.local_deletes.len(),
            remote_delete_count: self.remote_deletes.len(),
            record_remove_count: self.records_to_remove.len(),
            ignored_count: self.records_ignored.len()
                + self.uploads_ignored.len()
                + self.downloads_ignored.len(),
            conflict_count: self.conflicts.len(),
        }
    }
}

/// 三方对比：本地快照、远程快照、同步记录
pub struct Reconciler;

impl Reconciler {
    /// 生成同步计划。双向同步时返回的是冲突处理前的计划，
    /// 同一名称可能同时出现在上传和下载中，需要再经过 `resolve_conflicts`。
    pub fn plan(
        local: &Snapshot,
        remote: &Snapshot,
        store: &SyncedStateStore,
        direction: Direction,
    ) -> SyncPlan {
        let plan = match direction {
            Direction::Upload => Self::plan_upload(local, remote, store),
            Direction::Download => Self::plan_download(local, remote, store),
            Direction::Both => Self::plan_both(local, remote, store),
        };

        tracing::debug!(
            "同步计划 ({}): 上传 {}, 下载 {}, 删除本地 {}, 删除远程 {}, 移除记录 {}, 忽略记录 {}",
            direction,
            plan.uploads.len(),
            plan.downloads.len(),
            plan.local_deletes.len(),
            plan.remote_deletes.len(),
            plan.records_to_remove.len(),
            plan.records_ignored.len()
        );

        plan
    }

    /// 上传：远程整体替换为本地内容
    fn plan_upload(local: &Snapshot, remote: &Snapshot, store: &SyncedStateStore) -> SyncPlan {
        let mut plan = SyncPlan::new(Direction::Upload);
        plan.uploads = sorted(local)
            .map(|f| PendingOperation::upload(f, Reason::Uploading))
            .collect();
        plan.remote_deletes = sorted(remote).cloned().collect();
        plan.records_to_remove = store.to_records();
        plan
    }

    /// 下载：本地整体替换为远程内容
    fn plan_download(local: &Snapshot, remote: &Snapshot, store: &SyncedStateStore) -> SyncPlan {
        let mut plan = SyncPlan::new(Direction::Download);
        plan.downloads = sorted(remote)
            .map(|f| PendingOperation::download(f, Reason::Downloading))
            .collect();
        plan.local_deletes = sorted(local).cloned().collect();
        plan.records_to_remove = store.to_records();
        plan
    }

    fn plan_both(local: &Snapshot, remote: &Snapshot, store: &SyncedStateStore) -> SyncPlan {
        let mut plan = SyncPlan::new(Direction::Both);
        plan.unsynced_overlap = store.is_empty() && !local.is_empty() && !remote.is_empty();

        let names: BTreeSet<&str> = local
            .keys()
            .chain(remote.keys())
            .map(String::as_str)
            .chain(store.names())
            .collect();

        for name in names {
            let local_file = local.get(name);
            let remote_file = remote.get(name);
            let record = store.get(name);

            if let Some(record) = record {
                let stale = local_file.is_some_and(|f| record.local_time > f.modified_seconds)
                    || remote_file.is_some_and(|f| record.remote_time > f.modified_seconds);
                if stale {
                    plan.records_ignored.push(record.clone());
                    continue;
                }

                // 删除传播先于上传/下载判定
                match (local_file, remote_file) {
                    (Some(f), None) if record.local_time == f.modified_seconds => {
                        plan.local_deletes.push(f.clone());
                        continue;
                    }
                    (None, Some(f)) if record.remote_time == f.modified_seconds => {
                        plan.remote_deletes.push(f.clone());
                        continue;
                    }
                    (None, None) => {
                        plan.records_to_remove.push(record.clone());
                        continue;
                    }
                    _ => {}
                }
            }

            if let Some(f) = local_file {
                let reason = match record {
                    None => Reason::HasNotBeenSynced,
                    Some(r) if r.local_time < f.modified_seconds => Reason::Newer,
                    Some(_) if remote_file.is_none() => Reason::DoesNotExist,
                    Some(_) => Reason::None,
                };
                if reason != Reason::None {
                    plan.uploads.push(PendingOperation::upload(f, reason));
                }
            }

            if let Some(f) = remote_file {
                let reason = match record {
                    None => Reason::HasNotBeenSynced,
                    Some(r) if r.remote_time < f.modified_seconds => Reason::Newer,
                    Some(_) if local_file.is_none() => Reason::DoesNotExist,
                    Some(_) => Reason::None,
                };
                if reason != Reason::None {
                    plan.downloads.push(PendingOperation::download(f, reason));
                }
            }
        }

        plan
    }
}

fn sorted(snapshot: &Snapshot) -> impl Iterator<Item = &FileRecord> {
    let mut files: Vec<&FileRecord> = snapshot.values().collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files.into_iter()
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub upload_count: usize,
    pub upload_bytes: u64,
    pub download_count: usize,
    pub download_bytes: u64,
    pub local_delete_count: usize,
    pub remote_delete_count: usize,
    pub record_remove_count: usize,
    pub ignored_count: usize,
    pub conflict_count: usize,
}

impl ActionSummary {
    pub fn total_files(&self) -> usize {
        self.upload_count + self.download_count + self.local_delete_count + self.remote_delete_count
    }

    pub fn total_transfer_bytes(&self) -> u64 {
        self.upload_bytes + self.download_bytes
    }
}
