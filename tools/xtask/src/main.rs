//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-core`: 运行 vn-core 覆盖率
//! - `project-check`: 检查工程文件（引用、分支结构、共享命令、资源文件）
//! - `build-web`: 构建浏览器运行时（`vn export` 的 `--runtime-js` / `--runtime-wasm`）

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::bail;
use clap::{Parser, Subcommand};
use vn_core::{DiagnosticResult, Project, analyze_project, collect_asset_references};
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,
    /// 运行 vn-core 覆盖率报告
    CovCore,
    /// 检查工程文件
    ///
    /// 不带参数时检查 projects/ 下所有 .json 文件
    ProjectCheck {
        /// 工程文件或目录
        path: Option<PathBuf>,
    },
    /// 构建浏览器运行时到 target/web/
    BuildWeb,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    match cli.command {
        Task::CheckAll => {
            step("cargo fmt --all -- --check");
            cmd!(sh, "cargo fmt --all -- --check").run()?;

            step("cargo clippy --workspace --all-targets");
            cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;

            step("cargo test --workspace");
            cmd!(sh, "cargo test --workspace").run()?;
        }
        Task::CovCore => {
            if cmd!(sh, "cargo llvm-cov --version").quiet().run().is_err() {
                bail!(
                    "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
                );
            }
            step("cargo llvm-cov -p vn-core --html");
            cmd!(sh, "cargo llvm-cov -p vn-core --html").run()?;
            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        Task::ProjectCheck { path } => project_check(path.as_deref())?,
        Task::BuildWeb => build_web(&sh)?,
    }
    Ok(())
}

fn step(name: &str) {
    eprintln!("\n==> {name}");
}

const WEB_OUT_DIR: &str = "target/web";

fn build_web(sh: &Shell) -> anyhow::Result<()> {
    if cmd!(sh, "wasm-bindgen --version").quiet().run().is_err() {
        bail!(
            "wasm-bindgen 不可用。\n\
请先安装：\n\
  - rustup target add wasm32-unknown-unknown\n\
  - cargo install wasm-bindgen-cli\n\
然后重试。"
        );
    }

    step("cargo build -p vn-web --target wasm32-unknown-unknown --release");
    cmd!(sh, "cargo build -p vn-web --target wasm32-unknown-unknown --release").run()?;

    step("wasm-bindgen --target no-modules");
    cmd!(
        sh,
        "wasm-bindgen --target no-modules --no-typescript --out-dir {WEB_OUT_DIR} target/wasm32-unknown-unknown/release/vn_web.wasm"
    )
    .run()?;

    // 胶水代码定义全局 wasm_bindgen，启动脚本接在后面
    let glue = sh.read_file(format!("{WEB_OUT_DIR}/vn_web.js"))?;
    let bootstrap = sh.read_file("vn-web/bootstrap.js")?;
    sh.write_file(format!("{WEB_OUT_DIR}/loader.js"), format!("{glue}\n{bootstrap}"))?;

    eprintln!("\n运行时: {WEB_OUT_DIR}/vn_web_bg.wasm");
    eprintln!("加载器: {WEB_OUT_DIR}/loader.js");
    Ok(())
}

//=============================================================================
// project-check 命令实现
//=============================================================================

const DEFAULT_PROJECTS_DIR: &str = "projects";

/// 与工程文件同名的配置文件不参与检查
const CONFIG_FILE_NAME: &str = "vn.json";

#[derive(Default)]
struct CheckSummary {
    projects_checked: usize,
    parse_errors: usize,
    diagnostics: DiagnosticResult,
    missing_assets: Vec<String>,
}

fn project_check(path: Option<&Path>) -> anyhow::Result<()> {
    let root = path.unwrap_or(Path::new(DEFAULT_PROJECTS_DIR));
    if !root.exists() {
        bail!(
            "路径不存在: {}\n请在 workspace 根目录运行，或指定工程路径",
            root.display()
        );
    }

    let files = collect_project_files(root);
    if files.is_empty() {
        eprintln!("未找到工程文件（.json）");
        return Ok(());
    }
    eprintln!("==> 检查 {} 个工程文件...\n", files.len());

    let mut summary = CheckSummary::default();
    for file in &files {
        check_project_file(file, &mut summary);
    }
    print_summary(&summary);

    if summary.parse_errors > 0 || summary.diagnostics.has_errors() {
        bail!("工程检查发现错误");
    }
    Ok(())
}

fn collect_project_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| p.file_name().is_some_and(|name| name != CONFIG_FILE_NAME))
        .collect();
    files.sort();
    files
}

fn check_project_file(file: &Path, summary: &mut CheckSummary) {
    let id = file.display().to_string();
    summary.projects_checked += 1;

    let project = match std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|json| Project::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[ERROR] {id}: {e}");
            summary.parse_errors += 1;
            return;
        }
    };

    let mut result = analyze_project(&project);
    for diagnostic in &mut result.diagnostics {
        diagnostic.location = format!("{id} / {}", diagnostic.location);
    }
    summary.diagnostics.merge(result);

    // 资源相对于工程文件旁的 assets/ 目录
    let assets_root = file.parent().unwrap_or(Path::new(".")).join("assets");
    for reference in collect_asset_references(&project) {
        // 字体和音频的句柄本身就是路径
        let source = reference
            .image_source(&project)
            .unwrap_or(reference.handle.as_str());
        if source.starts_with("data:") {
            continue;
        }
        if !assets_root.join(source).exists() {
            summary
                .missing_assets
                .push(format!("{id}: 资源不存在 [{}] {source}", reference.kind));
        }
    }
}

fn print_summary(summary: &CheckSummary) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个工程", summary.projects_checked);
    eprintln!();

    for diagnostic in &summary.diagnostics.diagnostics {
        eprintln!("{diagnostic}");
    }
    for missing in &summary.missing_assets {
        eprintln!("[WARN] {missing}");
    }

    let error_count = summary.parse_errors + summary.diagnostics.error_count();
    let warn_count = summary.diagnostics.warn_count() + summary.missing_assets.len();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {error_count} 个错误, {warn_count} 个警告");
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {warn_count} 个警告");
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
