use crate::config::TransferConfig;
use crate::core::comparator::{Direction, PendingOperation, Reconciler, SyncPlan};
use crate::core::conflict::resolve_conflicts;
use crate::core::matcher::NameMatcher;
use crate::core::scanner::{FileRecord, FileScanner};
use crate::core::trash::TrashArchiver;
use crate::error::SyncError;
use crate::state::{SyncSettings, SyncedStateStore};
use crate::storage::Storage;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 最大并发传输数
    pub max_concurrent_transfers: usize,
    /// 匹配规则是否区分大小写
    pub case_sensitive: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl From<&TransferConfig> for SyncConfig {
    fn from(config: &TransferConfig) -> Self {
        Self {
            max_concurrent_transfers: config.max_concurrent_transfers.max(1),
            case_sensitive: config.case_sensitive,
        }
    }
}

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Deleting,
    Syncing,
    Completed,
    Failed,
}

/// 同步进度
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub status: SyncStatus,
    pub phase: String,
    pub current_file: String,
    pub files_to_sync: u32,
    pub files_completed: u32,
    pub files_failed: u32,
    pub start_time: i64,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: Direction,
    pub start_time: i64,
    pub end_time: i64,
    pub status: SyncStatus,
    pub files_deleted: u32,
    pub files_uploaded: u32,
    pub files_downloaded: u32,
    pub files_failed: u32,
    pub records_removed: u32,
    pub records_added: u32,
    pub bytes_transferred: u64,
    pub duration: u64,
    pub errors: Vec<String>,
}

/// 分析阶段的结果，确认后交给 `SyncEngine::execute`
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub settings: SyncSettings,
    pub store: SyncedStateStore,
    pub plan: SyncPlan,
    pub local_files: usize,
    pub remote_files: usize,
}

/// 传输统计
#[derive(Debug, Default)]
struct TransferStats {
    files_completed: AtomicU64,
    files_failed: AtomicU64,
    bytes_transferred: AtomicU64,
}

/// 删除所在的一侧
#[derive(Debug, Clone, Copy)]
enum Side {
    Local,
    Remote,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Side::Local => "本地",
            Side::Remote => "远程",
        }
    }
}

/// 同步引擎
pub struct SyncEngine {
    local: Arc<dyn Storage>,
    remote: Arc<dyn Storage>,
    settings_path: PathBuf,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn Storage>,
        remote: Arc<dyn Storage>,
        settings_path: impl Into<PathBuf>,
        mut config: SyncConfig,
    ) -> Self {
        // 0 个许可会让 acquire 永远等待，超过上限会让 Semaphore::new panic
        config.max_concurrent_transfers = config
            .max_concurrent_transfers
            .clamp(1, Semaphore::MAX_PERMITS);
        Self {
            local,
            remote,
            settings_path: settings_path.into(),
            config,
        }
    }

    /// 检查远程可访问，并确保回收站占位文件可读写
    pub async fn prepare(&self) -> Result<(), SyncError> {
        self.remote
            .check()
            .await
            .map_err(|e| SyncError::StorageUnavailable {
                storage: self.remote.name().to_string(),
                message: format!("{:#}", e),
            })?;

        TrashArchiver::ensure_keep_file(self.remote.as_ref())
            .await
            .map_err(|e| SyncError::TrashNotWritable(format!("{:#}", e)))?;

        Ok(())
    }

    /// 扫描两侧并生成同步计划，不修改任何文件
    pub async fn analyze(
        &self,
        settings: SyncSettings,
        direction: Direction,
    ) -> Result<SyncSession, SyncError> {
        settings.validate()?;
        self.prepare().await?;

        let matcher = NameMatcher::new(
            &settings.include_patterns(),
            &settings.exclude_patterns(),
            self.config.case_sensitive,
        )
        .map_err(|e| SyncError::Pattern(e.to_string()))?;
        let scanner = FileScanner::new(matcher);

        let (local_files, remote_files) = tokio::join!(
            scanner.scan_storage(self.local.as_ref()),
            scanner.scan_storage(self.remote.as_ref())
        );
        let local_files = local_files.map_err(|e| SyncError::Scan {
            side: Side::Local.label(),
            message: format!("{:#}", e),
        })?;
        let remote_files = remote_files.map_err(|e| SyncError::Scan {
            side: Side::Remote.label(),
            message: format!("{:#}", e),
        })?;

        let store = settings.store();
        let plan = resolve_conflicts(Reconciler::plan(
            &local_files,
            &remote_files,
            &store,
            direction,
        ));

        info!(
            "分析完成 ({}): 本地 {} 个文件, 远程 {} 个文件, 同步记录 {} 条, 待执行 {} 项",
            direction,
            local_files.len(),
            remote_files.len(),
            store.len(),
            plan.todo_count()
        );

        Ok(SyncSession {
            settings,
            store,
            plan,
            local_files: local_files.len(),
            remote_files: remote_files.len(),
        })
    }

    /// 执行同步计划：先删除（移入回收站），再并行传输，最后更新并保存同步记录
    pub async fn execute(
        &self,
        session: SyncSession,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> SyncReport {
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();

        let SyncSession {
            mut settings,
            mut store,
            plan,
            ..
        } = session;
        let direction = plan.direction;

        let trash = Arc::new(TrashArchiver::new());
        let stats = Arc::new(TransferStats::default());
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));
        let files_to_sync = (plan.local_deletes.len()
            + plan.remote_deletes.len()
            + plan.uploads.len()
            + plan.downloads.len()) as u32;

        info!(
            "开始{}: 回收站目录 {}, 共 {} 项",
            direction.verb(),
            trash.run_stamp(),
            files_to_sync
        );

        let progress = ProgressReporter {
            tx: progress_tx,
            stats: stats.clone(),
            files_to_sync,
            start_time,
        };

        // 删除先于传输
        progress.send(SyncStatus::Deleting, "移入回收站", "").await;
        let mut deleted_names = self
            .execute_deletes(Side::Local, plan.local_deletes.clone(), &trash, &stats, &errors, &progress)
            .await;
        deleted_names.extend(
            self.execute_deletes(
                Side::Remote,
                plan.remote_deletes.clone(),
                &trash,
                &stats,
                &errors,
                &progress,
            )
            .await,
        );

        progress.send(SyncStatus::Syncing, "传输文件", "").await;
        let operations: Vec<PendingOperation> = plan
            .uploads
            .iter()
            .chain(plan.downloads.iter())
            .cloned()
            .collect();
        let transferred = self
            .execute_transfers(operations, &trash, &stats, &errors, &progress)
            .await;

        // 更新同步记录
        let records_removed;
        let mut records_added = 0u32;
        match direction {
            Direction::Both => {
                let mut removed = 0u32;
                for record in &plan.records_to_remove {
                    removed += store.remove(&record.name).is_some() as u32;
                }
                for name in &deleted_names {
                    removed += store.remove(name).is_some() as u32;
                }
                for op in &transferred {
                    if let Some(record) = op.to_synced_record() {
                        store.upsert(record);
                        records_added += 1;
                    }
                }
                records_removed = removed;
            }
            Direction::Upload | Direction::Download => {
                records_removed = store.len() as u32;
                let records: Vec<_> = transferred
                    .iter()
                    .filter_map(PendingOperation::to_synced_record)
                    .collect();
                records_added = records.len() as u32;
                store.replace_all(records);
            }
        }

        let mut errors = errors.lock().await.clone();

        if store.is_changed() {
            settings.synced = store.to_records();
            let path = self.settings_path.clone();
            let saved = tokio::task::spawn_blocking(move || {
                settings.save(&path).map(|()| settings.synced.len())
            })
            .await;
            match saved {
                Ok(Ok(count)) => info!("已保存 {} 条同步记录", count),
                Ok(Err(e)) => {
                    error!("保存同步记录失败: {}", e);
                    errors.push(format!("保存同步记录失败: {}", e));
                }
                Err(e) => {
                    error!("保存同步记录任务异常结束: {}", e);
                    errors.push(format!("保存同步记录任务异常结束: {}", e));
                }
            }
        } else {
            debug!("同步记录无变化，不写入配置文件");
        }

        let uploaded = transferred
            .iter()
            .filter(|op| op.direction == Direction::Upload)
            .count() as u32;
        let end_time = chrono::Utc::now().timestamp();
        let status = if errors.is_empty() {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed
        };

        progress
            .send(status, if errors.is_empty() { "完成" } else { "完成（有错误）" }, "")
            .await;

        let report = SyncReport {
            direction,
            start_time,
            end_time,
            status,
            files_deleted: deleted_names.len() as u32,
            files_uploaded: uploaded,
            files_downloaded: transferred.len() as u32 - uploaded,
            files_failed: stats.files_failed.load(Ordering::Relaxed) as u32,
            records_removed,
            records_added,
            bytes_transferred: stats.bytes_transferred.load(Ordering::Relaxed),
            duration: started.elapsed().as_secs(),
            errors,
        };

        info!(
            "{}结束: 删除 {}, 上传 {}, 下载 {}, 失败 {}, 耗时 {}s",
            direction.verb(),
            report.files_deleted,
            report.files_uploaded,
            report.files_downloaded,
            report.files_failed,
            report.duration
        );

        report
    }

    /// 并行把文件移入回收站，返回成功的名称
    async fn execute_deletes(
        &self,
        side: Side,
        files: Vec<FileRecord>,
        trash: &Arc<TrashArchiver>,
        stats: &Arc<TransferStats>,
        errors: &Arc<Mutex<Vec<String>>>,
        progress: &ProgressReporter,
    ) -> Vec<String> {
        if files.is_empty() {
            return Vec::new();
        }

        let storage = match side {
            Side::Local => self.local.clone(),
            Side::Remote => self.remote.clone(),
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let storage = storage.clone();
            let trash = trash.clone();
            let stats = stats.clone();
            let errors = errors.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let result = trash
                    .archive(storage.as_ref(), &file.name, file.modified_seconds)
                    .await;
                drop(permit);

                match result {
                    Ok(_) => {
                        stats.files_completed.fetch_add(1, Ordering::Relaxed);
                        progress.send(SyncStatus::Deleting, "移入回收站", &file.name).await;
                        Some(file.name)
                    }
                    Err(e) => {
                        stats.files_failed.fetch_add(1, Ordering::Relaxed);
                        let message = format!("删除{}文件 {} 失败: {:#}", side.label(), file.name, e);
                        error!("{}", message);
                        errors.lock().await.push(message);
                        None
                    }
                }
            }));
        }

        let mut deleted = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(name)) => deleted.push(name),
                Ok(None) => {}
                Err(e) => {
                    stats.files_failed.fetch_add(1, Ordering::Relaxed);
                    warn!("删除任务异常结束: {}", e);
                    errors.lock().await.push(format!("删除任务异常结束: {}", e));
                }
            }
        }
        deleted
    }

    /// 并行传输，返回成功的操作（已填入两侧时间）
    async fn execute_transfers(
        &self,
        operations: Vec<PendingOperation>,
        trash: &Arc<TrashArchiver>,
        stats: &Arc<TransferStats>,
        errors: &Arc<Mutex<Vec<String>>>,
        progress: &ProgressReporter,
    ) -> Vec<PendingOperation> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers));
        let mut handles = Vec::with_capacity(operations.len());

        for op in operations {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let local = self.local.clone();
            let remote = self.remote.clone();
            let trash = trash.clone();
            let stats = stats.clone();
            let errors = errors.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let name = op.name.clone();
                let verb = op.direction.verb();
                let result = Self::transfer(op, local.as_ref(), remote.as_ref(), &trash).await;
                drop(permit);

                match result {
                    Ok((op, bytes)) => {
                        stats.files_completed.fetch_add(1, Ordering::Relaxed);
                        stats.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
                        progress.send(SyncStatus::Syncing, verb, &name).await;
                        Some(op)
                    }
                    Err(e) => {
                        stats.files_failed.fetch_add(1, Ordering::Relaxed);
                        let message = format!("{} {} 失败: {:#}", verb, name, e);
                        error!("{}", message);
                        errors.lock().await.push(message);
                        None
                    }
                }
            }));
        }

        let mut transferred = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(op)) => transferred.push(op),
                Ok(None) => {}
                Err(e) => {
                    stats.files_failed.fetch_add(1, Ordering::Relaxed);
                    warn!("传输任务异常结束: {}", e);
                    errors.lock().await.push(format!("传输任务异常结束: {}", e));
                }
            }
        }
        transferred.sort_by(|a, b| a.name.cmp(&b.name));
        transferred
    }

    /// 单个文件传输：目标已存在时先移入回收站，写入后以目标存储报告的时间作为同步时间
    async fn transfer(
        mut op: PendingOperation,
        local: &dyn Storage,
        remote: &dyn Storage,
        trash: &TrashArchiver,
    ) -> Result<(PendingOperation, u64)> {
        let (source, target) = match op.direction {
            Direction::Download => (remote, local),
            _ => (local, remote),
        };

        if let Some(existing) = target.stat(&op.name).await? {
            trash
                .archive(target, &op.name, existing.modified_time)
                .await
                .context("移入回收站失败，跳过传输")?;
        }

        let data = source.read(&op.name).await.context("读取失败")?;
        let bytes = data.len() as u64;
        target.write(&op.name, data).await.context("写入失败")?;

        let written = target
            .stat(&op.name)
            .await?
            .context("写入后无法获取文件信息")?;
        if written.modified_time <= 0 {
            anyhow::bail!("写入后修改时间无效: {}", written.modified_time);
        }

        match op.direction {
            Direction::Download => op.local_time = Some(written.modified_time),
            _ => op.remote_time = Some(written.modified_time),
        }

        debug!("{} 完成: {} ({} 字节)", op.direction.verb(), op.name, bytes);
        Ok((op, bytes))
    }
}

/// 进度发送（没有接收方时为空操作）
#[derive(Clone)]
struct ProgressReporter {
    tx: Option<mpsc::Sender<SyncProgress>>,
    stats: Arc<TransferStats>,
    files_to_sync: u32,
    start_time: i64,
}

impl ProgressReporter {
    async fn send(&self, status: SyncStatus, phase: &str, current_file: &str) {
        let Some(tx) = &self.tx else {
            return;
        };
        let completed = self.stats.files_completed.load(Ordering::Relaxed) as u32;
        let failed = self.stats.files_failed.load(Ordering::Relaxed) as u32;
        let _ = tx
            .send(SyncProgress {
                status,
                phase: phase.to_string(),
                current_file: current_file.to_string(),
                files_to_sync: self.files_to_sync,
                files_completed: completed + failed,
                files_failed: failed,
                start_time: self.start_time,
            })
            .await;
    }
}
