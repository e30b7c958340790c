use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mobile_project_edit::{MobileProject, Operation, ProjectConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mobile-project-edit")]
#[command(about = "对 iOS / Android 原生工程文件做结构化修改")]
#[command(version)]
struct Cli {
    /// 工程根目录
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// 配置文件（JSON，可覆盖 iosPath / androidPath）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 只显示将要修改的文件，不写盘
    #[arg(long)]
    dry_run: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    /// 静默模式(仅输出错误)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 显示工程信息（target、构建配置、包名、版本）
    Info,
    /// 应用操作列表（JSON 数组）
    Apply {
        /// 操作文件
        operations: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = ProjectConfig::load(&cli.project, cli.config.as_deref())
        .with_context(|| format!("failed to load project config for {}", cli.project.display()))?;
    let mut project = MobileProject::new(config);
    project.load().context("failed to load project")?;

    match &cli.command {
        Command::Info => handle_info(&mut project),
        Command::Apply { operations } => handle_apply(&cli, &mut project, operations),
    }
}

/// 日志级别：--verbose / --quiet 优先，其次 RUST_LOG，默认 info
fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 处理信息显示
fn handle_info(project: &mut MobileProject) -> Result<()> {
    if let Some(mut ios) = project.ios() {
        println!("iOS: {}", ios.root().display());
        for target in ios.targets()? {
            println!("  target {} ({})", target.name, target.product_type.as_deref().unwrap_or("unknown"));
            let name = Some(target.name.as_str());
            for build in ios.build_configuration_names(name)? {
                let build_ref = Some(build.as_str());
                println!(
                    "    {}: bundle id {}, version {}, build {}",
                    build,
                    ios.bundle_id(name, build_ref)?.unwrap_or_else(|| "-".to_string()),
                    ios.version(name, build_ref)?.unwrap_or_else(|| "-".to_string()),
                    ios.build_property(name, build_ref, "CURRENT_PROJECT_VERSION")?
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
    } else {
        println!("iOS: not found");
    }

    if let Some(mut android) = project.android() {
        println!("Android: {}", android.root().display());
        println!("  package: {}", android.package_name()?.unwrap_or_else(|| "-".to_string()));
        match (android.version_name(), android.version_code()) {
            (Ok(name), Ok(code)) => println!(
                "  version: {} ({})",
                name.unwrap_or_else(|| "-".to_string()),
                code.map_or_else(|| "-".to_string(), |c| c.to_string())
            ),
            (Err(e), _) | (_, Err(e)) => println!("  version: unavailable ({})", e),
        }
    } else {
        println!("Android: not found");
    }

    Ok(())
}

/// 处理操作应用
fn handle_apply(cli: &Cli, project: &mut MobileProject, operations: &Path) -> Result<()> {
    let text = std::fs::read_to_string(operations)
        .with_context(|| format!("failed to read {}", operations.display()))?;
    let operations = Operation::parse_list(&text)
        .with_context(|| format!("invalid operations file {}", operations.display()))?;

    let report = project.apply_all(&operations).context("aborted")?;
    if !cli.quiet {
        println!("应用了 {} 个操作，跳过 {} 个", report.applied, report.skipped.len());
        for (index, name, error) in &report.skipped {
            println!("  跳过 #{} {}: {}", index, name, error);
        }
    }

    if cli.dry_run {
        for diff in project.diff()?.iter().filter(|d| d.is_changed()) {
            println!("{}", diff);
        }
        return Ok(());
    }

    let commit = project.commit();
    if !cli.quiet {
        println!("{}", commit.summary());
    }
    if !commit.is_success() {
        for (path, error) in &commit.failed {
            eprintln!("写入失败 {}: {}", path.display(), error);
        }
        bail!("{} file(s) failed to write", commit.failed.len());
    }
    Ok(())
}
