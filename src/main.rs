use anyhow::Result;
use clap::{Parser, Subcommand};
use s3sync_lib::config::TransferConfig;
use s3sync_lib::core::{ConflictKind, SyncProgress, SyncStatus};
use s3sync_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use s3sync_lib::state::SETTINGS_FILE;
use s3sync_lib::storage::{create_remote_storage, LocalStorage, Storage};
use s3sync_lib::{Direction, SyncConfig, SyncEngine, SyncReport, SyncSession, SyncSettings};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "s3sync", version, about = "本地目录与 S3 bucket 目录之间的同步工具")]
struct Cli {
    /// 工作区目录（默认为当前目录）
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// 在控制台输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 在工作区创建配置文件模板
    Init {
        /// 覆盖已有的配置文件（同步记录会丢失）
        #[arg(long)]
        force: bool,
    },
    /// 显示工作区配置
    Status,
    /// 双向同步
    Sync {
        /// 不询问直接执行
        #[arg(short, long)]
        yes: bool,
    },
    /// 用本地文件覆盖 bucket 目录
    Upload {
        #[arg(short, long)]
        yes: bool,
    },
    /// 用 bucket 目录覆盖本地文件
    Download {
        #[arg(short, long)]
        yes: bool,
    },
}

/// 初始化日志系统
fn init_logging(verbose: bool) {
    let log_dir = get_log_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    let config = LogConfig::load(&log_dir);

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let mut env_filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "opendal=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    // 文件日志层
    let file_layer = config
        .enabled
        .then(|| SizeRotatingWriter::new(&log_dir, config.max_size_mb).ok())
        .flatten()
        .map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
        });

    // debug 构建或 --verbose 时也输出到控制台
    let console_layer = (cfg!(debug_assertions) || verbose).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    if let Err(e) = run() {
        eprintln!("错误: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let settings_path = workspace.join(SETTINGS_FILE);

    match cli.command {
        Commands::Init { force } => {
            SyncSettings::create(&settings_path, force)?;
            println!("已创建 {}，请填写 bucket 后再同步。", settings_path.display());
            Ok(())
        }
        Commands::Status => {
            let settings = SyncSettings::load(&settings_path)?;
            println!("{}", settings.summary());
            println!("  - 同步记录: {}", settings.synced.len());
            Ok(())
        }
        Commands::Sync { yes } => run_sync(&workspace, &settings_path, Direction::Both, yes),
        Commands::Upload { yes } => run_sync(&workspace, &settings_path, Direction::Upload, yes),
        Commands::Download { yes } => {
            run_sync(&workspace, &settings_path, Direction::Download, yes)
        }
    }
}

fn run_sync(workspace: &Path, settings_path: &Path, direction: Direction, yes: bool) -> Result<()> {
    let settings = SyncSettings::load(settings_path)?;

    // 凭证和 region 从该 profile 的 AWS 共享配置读取，必须在启动运行时之前设置
    std::env::set_var("AWS_PROFILE", &settings.profile);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _guard = runtime.enter();

    let local: Arc<dyn Storage> = Arc::new(LocalStorage::new(workspace)?);
    let remote = create_remote_storage(&settings)?;
    let config = TransferConfig::load(&s3sync_lib::dirs::app_config_dir());
    let engine = SyncEngine::new(local, remote, settings_path, SyncConfig::from(&config));

    println!("{}\n", settings.summary());
    let session = runtime.block_on(engine.analyze(settings, direction))?;
    print_plan(&session);

    if session.plan.is_empty() {
        println!("\n没有需要{}的文件。", direction.verb());
        return Ok(());
    }

    if direction != Direction::Both {
        println!(
            "\n注意: 这将覆盖{}的所有文件（被覆盖和删除的文件会移入 .s3sync.trash）。",
            if direction == Direction::Upload { "bucket 目录" } else { "本地目录" }
        );
    }

    if !yes && !confirm(&format!("{} {} 项？", direction.verb(), session.plan.todo_count()))? {
        println!("已取消。");
        return Ok(());
    }

    let report = runtime.block_on(async {
        let (tx, rx) = mpsc::channel(100);
        let printer = tokio::spawn(print_progress(rx));
        let report = engine.execute(session, Some(tx)).await;
        let _ = printer.await;
        report
    });

    print_report(&report);
    if report.status == SyncStatus::Failed {
        anyhow::bail!("{} 个错误，详见日志", report.errors.len());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("\n{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_list<T>(title: &str, items: &[T], line: impl Fn(&T) -> String) {
    if items.is_empty() {
        return;
    }
    println!("\n{} ({}):", title, items.len());
    for item in items {
        println!("  - {}", line(item));
    }
}

fn print_plan(session: &SyncSession) {
    let plan = &session.plan;
    println!(
        "本地文件: {}, bucket 文件: {}, 同步记录: {}",
        session.local_files,
        session.remote_files,
        session.store.len()
    );

    if plan.direction == Direction::Both {
        print_list(
            "同步记录无效（记录时间晚于文件修改时间），这些文件不会同步",
            &plan.records_ignored,
            |r| r.name.clone(),
        );
        print_list(
            "两侧文件都不存在，移除同步记录",
            &plan.records_to_remove,
            |r| r.name.clone(),
        );
    }

    let (local_why, remote_why) = match plan.direction {
        Direction::Both => ("bucket 中已删除", "本地已删除"),
        _ => ("将被 bucket 覆盖", "将被本地覆盖"),
    };
    print_list(&format!("删除本地文件（{}）", local_why), &plan.local_deletes, |f| {
        f.name.clone()
    });
    print_list(&format!("删除 bucket 文件（{}）", remote_why), &plan.remote_deletes, |f| {
        f.name.clone()
    });

    for kind in [
        ConflictKind::DifferentReasons,
        ConflictKind::AmbiguousTimestamps,
        ConflictKind::NeverSynced,
    ] {
        let conflicts: Vec<_> = plan.conflicts.iter().filter(|c| c.kind == kind).collect();
        print_list(&format!("冲突，不会同步: {}", kind), &conflicts, |c| {
            format!("{} (本地 {}, bucket {})", c.name, c.upload.reason, c.download.reason)
        });
    }

    if plan.unsynced_overlap {
        println!("\n提示: 没有任何同步记录，而本地和 bucket 都有文件。建议先执行一次 upload 或 download。");
    }

    print_list("上传", &plan.uploads, |op| format!("{} ({})", op.name, op.reason));
    print_list("下载", &plan.downloads, |op| format!("{} ({})", op.name, op.reason));

    let summary = plan.summary();
    println!(
        "\n合计: 上传 {}, 下载 {}, 删除 {}, 忽略 {}, 传输 {} 字节",
        summary.upload_count,
        summary.download_count,
        summary.local_delete_count + summary.remote_delete_count,
        summary.ignored_count,
        summary.total_transfer_bytes()
    );
}

async fn print_progress(mut rx: mpsc::Receiver<SyncProgress>) {
    while let Some(progress) = rx.recv().await {
        if progress.current_file.is_empty() {
            continue;
        }
        println!(
            "  [{}/{}] {} {}",
            progress.files_completed, progress.files_to_sync, progress.phase, progress.current_file
        );
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "\n{}完成: 删除 {}, 上传 {}, 下载 {}, 失败 {}, 移除记录 {}, 新增记录 {}, 耗时 {}s",
        report.direction.verb(),
        report.files_deleted,
        report.files_uploaded,
        report.files_downloaded,
        report.files_failed,
        report.records_removed,
        report.records_added,
        report.duration
    );
    for error in &report.errors {
        println!("  - {}", error);
    }
}
