//! # vn
//!
//! 视觉小说工程的命令行宿主。
//!
//! ## 用法
//!
//! ```bash
//! vn check game.json
//! vn play game.json --choose 1,0 --frames-dir frames
//! vn export game.json --runtime-js target/web/loader.js --runtime-wasm target/web/vn_web_bg.wasm -o game.html
//! ```

mod assets;
mod config;
mod play;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use vn_core::{DiagnosticLevel, ExportOptions, Project, RuntimeBundle, analyze_project, export_html};

use config::{AppConfig, Overrides};

#[derive(Parser, Debug)]
#[command(name = "vn")]
#[command(about = "像素风视觉小说工程工具：检查、无头播放、导出单文件 HTML")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(long, default_value = "vn.json", global = true)]
    config: PathBuf,

    /// 日志级别（覆盖配置文件）
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 静态检查工程
    Check {
        /// 工程 JSON
        project: PathBuf,

        /// 同时输出 Info 级别诊断
        #[arg(short, long)]
        verbose: bool,
    },

    /// 无头播放，按帧输出 PNG
    Play {
        /// 工程 JSON
        project: PathBuf,

        /// 依次遇到选项时选择的索引，用完后选第 0 项
        #[arg(long, value_delimiter = ',')]
        choose: Vec<usize>,

        /// 资源根目录
        #[arg(long)]
        assets_dir: Option<PathBuf>,

        /// 帧输出目录
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// 模拟帧间隔（毫秒）
        #[arg(long)]
        frame_interval_ms: Option<u64>,

        /// 最多输出的帧数
        #[arg(long, default_value_t = 1000)]
        max_frames: usize,

        /// 显示场景编号
        #[arg(long)]
        show_scene_index: bool,

        /// 结束时把解释器状态写入存档文件
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// 导出单文件 HTML
    Export {
        /// 工程 JSON
        project: PathBuf,

        /// 运行时加载器脚本
        #[arg(long)]
        runtime_js: PathBuf,

        /// 运行时 wasm
        #[arg(long)]
        runtime_wasm: PathBuf,

        /// 输出文件
        #[arg(short, long, default_value = "game.html")]
        output: PathBuf,

        /// 覆盖缩放倍数
        #[arg(long)]
        scale: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut overrides = Overrides {
        log_level: cli.log_level.clone(),
        ..Overrides::default()
    };
    if let Commands::Play {
        assets_dir,
        frames_dir,
        frame_interval_ms,
        show_scene_index,
        ..
    } = &cli.command
    {
        overrides.assets_dir = assets_dir.clone();
        overrides.frames_dir = frames_dir.clone();
        overrides.frame_interval_ms = *frame_interval_ms;
        overrides.show_scene_index = *show_scene_index;
    }
    let config = AppConfig::load(&cli.config)?.apply(overrides);

    tracing_subscriber::fmt()
        .with_max_level(config.level()?)
        .with_ansi(true)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check { project, verbose } => cmd_check(&project, verbose),
        Commands::Play {
            project,
            choose,
            max_frames,
            save,
            ..
        } => {
            let project = load_project(&project)?;
            play::run(
                project,
                &config,
                &play::PlayOptions {
                    choices: choose,
                    max_frames,
                    save,
                },
            )
        }
        Commands::Export {
            project,
            runtime_js,
            runtime_wasm,
            output,
            scale,
        } => cmd_export(&project, &runtime_js, &runtime_wasm, &output, scale),
    }
}

fn load_project(path: &Path) -> anyhow::Result<Project> {
    let json = fs::read_to_string(path).with_context(|| format!("读取工程失败: {}", path.display()))?;
    let project = Project::from_json(&json).with_context(|| format!("解析工程失败: {}", path.display()))?;
    info!(
        path = %path.display(),
        scenes = project.scenes.len(),
        shared = project.shared_commands.len(),
        "工程已加载"
    );
    Ok(project)
}

fn cmd_check(path: &Path, verbose: bool) -> anyhow::Result<()> {
    let project = load_project(path)?;
    let result = analyze_project(&project);
    let min_level = if verbose {
        DiagnosticLevel::Info
    } else {
        DiagnosticLevel::Warn
    };

    for diagnostic in result.filter_by_level(min_level) {
        println!("{diagnostic}");
    }
    println!(
        "{}: {} 个错误，{} 个警告",
        path.display(),
        result.error_count(),
        result.warn_count()
    );

    if result.has_errors() {
        bail!("工程检查未通过");
    }
    Ok(())
}

fn cmd_export(
    path: &Path,
    runtime_js: &Path,
    runtime_wasm: &Path,
    output: &Path,
    scale: Option<u32>,
) -> anyhow::Result<()> {
    let project = load_project(path)?;
    let bundle = RuntimeBundle {
        loader_js: fs::read_to_string(runtime_js)
            .with_context(|| format!("读取加载器失败: {}", runtime_js.display()))?,
        wasm: fs::read(runtime_wasm).with_context(|| format!("读取运行时失败: {}", runtime_wasm.display()))?,
    };

    let html = export_html(&project, &bundle, &ExportOptions { scale })?;
    fs::write(output, html).with_context(|| format!("写入失败: {}", output.display()))?;
    println!("已导出: {}", output.display());
    Ok(())
}
