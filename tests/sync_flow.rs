//! 两个本地目录分别充当工作区和 bucket 目录的完整同步流程

use s3sync_lib::core::SyncStatus;
use s3sync_lib::state::SETTINGS_FILE;
use s3sync_lib::storage::{LocalStorage, Storage};
use s3sync_lib::{Direction, SyncConfig, SyncEngine, SyncSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct Workspace {
    local_dir: TempDir,
    remote_dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            local_dir: tempfile::tempdir().unwrap(),
            remote_dir: tempfile::tempdir().unwrap(),
        };
        let mut settings = SyncSettings::template();
        settings.bucket = "test-bucket".to_string();
        settings.save(&ws.settings_path()).unwrap();
        ws
    }

    fn settings_path(&self) -> PathBuf {
        self.local_dir.path().join(SETTINGS_FILE)
    }

    fn engine(&self) -> SyncEngine {
        let local: Arc<dyn Storage> = Arc::new(LocalStorage::new(self.local_dir.path()).unwrap());
        let remote: Arc<dyn Storage> = Arc::new(LocalStorage::new(self.remote_dir.path()).unwrap());
        SyncEngine::new(local, remote, self.settings_path(), SyncConfig::default())
    }

    async fn sync(&self, direction: Direction) -> (usize, s3sync_lib::SyncReport) {
        let settings = SyncSettings::load(&self.settings_path()).unwrap();
        let engine = self.engine();
        let session = engine.analyze(settings, direction).await.unwrap();
        let todo = session.plan.todo_count();
        (todo, engine.execute(session, None).await)
    }

    fn settings(&self) -> SyncSettings {
        SyncSettings::load(&self.settings_path()).unwrap()
    }
}

fn write_file(path: &Path, content: &str, age: Duration) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn trash_entries(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root.join(".s3sync.trash"))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() != ".keep")
        .map(|e| e.into_path())
        .collect()
}

#[tokio::test]
async fn test_full_sync_cycle() {
    let ws = Workspace::new();
    let local = ws.local_dir.path();
    let remote = ws.remote_dir.path();

    write_file(&local.join("a.txt"), "a", Duration::from_secs(3600));
    write_file(&local.join("docs/b.md"), "b", Duration::from_secs(3600));
    write_file(&local.join("node_modules/x.js"), "x", Duration::from_secs(3600));

    // 首次同步：两个文件上传，node_modules 被排除
    let (todo, report) = ws.sync(Direction::Both).await;
    assert_eq!(todo, 2);
    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.files_uploaded, 2);
    assert_eq!(fs::read_to_string(remote.join("docs/b.md")).unwrap(), "b");
    assert!(!remote.join("node_modules").exists());
    assert!(remote.join(".s3sync.trash/.keep").exists());
    assert_eq!(ws.settings().synced.len(), 2);

    // 没有变化时再次同步不做任何事
    let before = fs::read_to_string(ws.settings_path()).unwrap();
    let (todo, report) = ws.sync(Direction::Both).await;
    assert_eq!(todo, 0);
    assert_eq!(report.records_added + report.records_removed, 0);
    assert_eq!(fs::read_to_string(ws.settings_path()).unwrap(), before);

    // bucket 中删除 a.txt：本地 a.txt 移入回收站
    fs::remove_file(remote.join("a.txt")).unwrap();
    let (todo, report) = ws.sync(Direction::Both).await;
    assert_eq!(todo, 1);
    assert_eq!(report.files_deleted, 1);
    assert!(!local.join("a.txt").exists());
    let trashed = trash_entries(local);
    assert_eq!(trashed.len(), 1);
    assert_eq!(fs::read_to_string(&trashed[0]).unwrap(), "a");
    let names: Vec<_> = ws.settings().synced.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["docs/b.md"]);

    // 本地修改 b.md：上传，bucket 中的旧版本移入回收站
    write_file(&local.join("docs/b.md"), "b2", Duration::from_secs(0));
    let (todo, report) = ws.sync(Direction::Both).await;
    assert_eq!(todo, 1);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(fs::read_to_string(remote.join("docs/b.md")).unwrap(), "b2");
    let trashed = trash_entries(remote);
    assert_eq!(trashed.len(), 1);
    assert_eq!(fs::read_to_string(&trashed[0]).unwrap(), "b");
    assert!(trashed[0].to_string_lossy().ends_with(".md"));
}

#[tokio::test]
async fn test_download_replaces_local_tree() {
    let ws = Workspace::new();
    let local = ws.local_dir.path();
    let remote = ws.remote_dir.path();

    write_file(&local.join("only-local.txt"), "l", Duration::from_secs(60));
    write_file(&remote.join("r1.txt"), "r1", Duration::from_secs(60));
    write_file(&remote.join("sub/r2.txt"), "r2", Duration::from_secs(60));

    let (todo, report) = ws.sync(Direction::Download).await;
    assert_eq!(todo, 3);
    assert_eq!(report.files_downloaded, 2);
    assert_eq!(report.files_deleted, 1);
    assert!(!local.join("only-local.txt").exists());
    assert_eq!(fs::read_to_string(local.join("sub/r2.txt")).unwrap(), "r2");
    assert_eq!(trash_entries(local).len(), 1);

    // 下载后双向同步应无事可做
    let (todo, _) = ws.sync(Direction::Both).await;
    assert_eq!(todo, 0);
}

#[tokio::test]
async fn test_invalid_settings_fail_before_any_change() {
    let ws = Workspace::new();
    write_file(&ws.local_dir.path().join("a.txt"), "a", Duration::from_secs(60));

    let mut settings = ws.settings();
    settings.folder = Some("/bad".to_string());

    let result = ws.engine().analyze(settings, Direction::Both).await;
    assert!(result.is_err());
    assert!(!ws.remote_dir.path().join(".s3sync.trash").exists());
}
