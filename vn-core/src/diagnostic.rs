//! # 诊断模块
//!
//! 工程静态检查，不依赖 IO 或解释器状态。
//!
//! ## 设计原则
//!
//! - 纯函数 API，可在编辑器保存前或 CI 中运行
//! - 诊断分级：Error（运行到该处必定失败）、Warn（建议修复）、Info（信息提示）
//! - 复用运行时的求值与展开逻辑，不重复实现规则

use std::collections::{BTreeSet, HashSet};

use crate::command::{Command, CommandKind, ConditionBranch};
use crate::condition::{evaluate, validate_branch_structure, SymbolTable};
use crate::error::{ReferenceKind, RuntimeError};
use crate::project::Project;
use crate::runtime::check_shared_group;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 诊断级别
    pub level: DiagnosticLevel,
    /// 位置，如 `场景 0 / 命令 #2`
    pub location: String,
    /// 诊断消息
    pub message: String,
    /// 诊断详情（可选）
    pub detail: Option<String>,
}

impl Diagnostic {
    /// 创建错误诊断
    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, location, message)
    }

    /// 创建警告诊断
    pub fn warn(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warn, location, message)
    }

    /// 创建信息诊断
    pub fn info(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, location, message)
    }

    fn with_level(level: DiagnosticLevel, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            location: location.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.location, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {}", detail)?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按最低级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

/// 资源种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    /// 背景图片
    Background,
    /// 角色立绘
    Character,
    /// 九宫格皮肤
    Skin,
    /// 过渡遮罩
    TransitionMask,
    /// 自定义字体
    Font,
    /// 音频
    Audio,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Background => write!(f, "背景"),
            Self::Character => write!(f, "立绘"),
            Self::Skin => write!(f, "皮肤"),
            Self::TransitionMask => write!(f, "过渡遮罩"),
            Self::Font => write!(f, "字体"),
            Self::Audio => write!(f, "音频"),
        }
    }
}

/// 资源引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// 资源句柄
    pub handle: String,
}

impl AssetReference {
    /// 图片来源
    ///
    /// 角色/背景取条目的 `image`（相对路径或 data URL），找不到条目时句柄本身即路径；
    /// 皮肤和过渡遮罩直接用句柄。字体和音频不是图片，返回 `None`。
    pub fn image_source<'a>(&'a self, project: &'a Project) -> Option<&'a str> {
        let entry = match self.kind {
            AssetKind::Background => project.background(&self.handle),
            AssetKind::Character => project.character(&self.handle),
            AssetKind::Skin | AssetKind::TransitionMask => None,
            AssetKind::Font | AssetKind::Audio => return None,
        };
        Some(entry.map_or(self.handle.as_str(), |e| e.image.as_str()))
    }
}

//=============================================================================
// 工程分析 API
//=============================================================================

/// 用工程声明的初始值充当符号表
struct DeclaredSymbols<'a>(&'a Project);

impl SymbolTable for DeclaredSymbols<'_> {
    fn flag(&self, name: &str) -> Option<bool> {
        self.0.flag(name).map(|f| f.value)
    }

    fn variable(&self, name: &str) -> Option<u8> {
        self.0.variable(name).map(|v| v.value)
    }
}

/// 分析工程，返回诊断结果
///
/// 执行以下检查：
/// - 未定义的标志/变量名（条件、setFlag、setVariable、选项）
/// - 不存在的共享命令 ID、共享命令循环调用
/// - goto / 选项跳转目标越界（未启用跳转的选项不检查）
/// - 分支结构不合法、标志使用了比较运算符
/// - 重名的标志/变量（警告）、空场景（提示）
pub fn analyze_project(project: &Project) -> DiagnosticResult {
    let mut lint = Lint {
        project,
        symbols: DeclaredSymbols(project),
        result: DiagnosticResult::new(),
    };

    lint.duplicate_names();

    if project.scenes.is_empty() {
        lint.result.push(Diagnostic::info("工程", "工程没有任何场景"));
    }
    for (index, scene) in project.scenes.iter().enumerate() {
        let label = if scene.name.is_empty() { &scene.id } else { &scene.name };
        let location = format!("场景 {index} ({label})");
        if scene.commands.is_empty() {
            lint.result.push(Diagnostic::info(&location, "场景没有命令"));
        }
        lint.commands(&scene.commands, &location);
    }
    for group in &project.shared_commands {
        let location = format!("共享命令 {}", group.id);
        lint.commands(&group.commands, &location);
    }

    lint.shared_cycles();
    lint.result
}

struct Lint<'a> {
    project: &'a Project,
    symbols: DeclaredSymbols<'a>,
    result: DiagnosticResult,
}

impl Lint<'_> {
    fn duplicate_names(&mut self) {
        let mut seen = HashSet::new();
        for flag in &self.project.flags {
            if !seen.insert(flag.name.as_str()) {
                self.result.push(
                    Diagnostic::warn("标志", format!("重复的标志名: {}", flag.name))
                        .with_detail("按名称引用时只会命中第一个"),
                );
            }
        }
        let mut seen = HashSet::new();
        for variable in &self.project.variables {
            if !seen.insert(variable.name.as_str()) {
                self.result.push(
                    Diagnostic::warn("变量", format!("重复的变量名: {}", variable.name))
                        .with_detail("按名称引用时只会命中第一个"),
                );
            }
        }
    }

    fn commands(&mut self, commands: &[Command], parent: &str) {
        for (index, command) in commands.iter().enumerate() {
            let location = format!("{parent} / 命令 #{index}");
            self.command(command, &location);
        }
    }

    fn command(&mut self, command: &Command, location: &str) {
        match &command.kind {
            CommandKind::Dialogue { choices, .. } => {
                for (i, choice) in choices.iter().enumerate() {
                    if choice.enable_goto {
                        self.scene_target(choice.goto, location, &format!("选项 {i}"));
                    }
                    if let Some((name, _)) = choice.flag_effect() {
                        if self.project.flag(name).is_none() {
                            let e = RuntimeError::UnresolvedReference {
                                kind: ReferenceKind::Flag,
                                name: name.to_string(),
                            };
                            self.error(location, e);
                        }
                    }
                }
            }
            CommandKind::Branching { conditions, .. } => self.branching(conditions, location),
            CommandKind::SetFlag { flag_name, .. } => {
                if self.project.flag(flag_name).is_none() {
                    self.error(location, RuntimeError::UnresolvedReference {
                        kind: ReferenceKind::Flag,
                        name: flag_name.clone(),
                    });
                }
            }
            CommandKind::SetVariable { variable_name, .. } => {
                if self.project.variable(variable_name).is_none() {
                    self.error(location, RuntimeError::UnresolvedReference {
                        kind: ReferenceKind::Variable,
                        name: variable_name.clone(),
                    });
                }
            }
            CommandKind::CallSharedCommand { shared_command_id } => {
                if let Err(e) = self.project.shared_group(shared_command_id) {
                    self.error(location, e);
                }
            }
            CommandKind::Goto { target_scene, .. } => {
                self.scene_target(*target_scene, location, "goto");
            }
            _ => {}
        }
    }

    fn branching(&mut self, conditions: &[ConditionBranch], location: &str) {
        if let Err(e) = validate_branch_structure(conditions) {
            self.error(location, e);
        }
        for (i, condition) in conditions.iter().enumerate() {
            // 每个条件都检查一遍，而不是像运行时那样命中即停
            if let Err(e) = evaluate(condition, &self.symbols) {
                self.error(location, e);
            }
            let nested = format!("{location} / 分支 {i}");
            self.commands(&condition.commands, &nested);
        }
    }

    fn scene_target(&mut self, target: usize, location: &str, what: &str) {
        if let Err(e) = self.project.check_scene_index(target) {
            self.result
                .push(Diagnostic::error(location, e.to_string()).with_detail(format!("{what} 的目标场景")));
        }
    }

    /// 每个环只报告一次
    fn shared_cycles(&mut self) {
        let project = self.project;
        let mut reported: HashSet<BTreeSet<String>> = HashSet::new();
        for group in &project.shared_commands {
            if let Err(RuntimeError::CyclicSharedCommand { id, chain }) =
                check_shared_group(project, &group.id)
            {
                let members: BTreeSet<String> = chain.iter().cloned().collect();
                if reported.insert(members) {
                    let e = RuntimeError::CyclicSharedCommand { id, chain };
                    self.error(&format!("共享命令 {}", group.id), e);
                }
            }
        }
    }

    fn error(&mut self, location: &str, error: RuntimeError) {
        self.result.push(Diagnostic::error(location, error.to_string()));
    }
}

/// 收集工程引用的全部资源（去重、有序）
pub fn collect_asset_references(project: &Project) -> Vec<AssetReference> {
    let mut refs = BTreeSet::new();
    let mut add = |kind: AssetKind, handle: &str| {
        if !handle.is_empty() {
            refs.insert(AssetReference {
                kind,
                handle: handle.to_string(),
            });
        }
    };

    for scene in &project.scenes {
        if let Some(id) = &scene.background_id {
            add(AssetKind::Background, id.as_str());
        }
        if let Some(id) = &scene.character_id {
            add(AssetKind::Character, id.as_str());
        }
    }

    let settings = &project.settings;
    for skin in [
        &settings.message_box_image,
        &settings.name_box_image,
        &settings.choice_box_image,
    ]
    .into_iter()
    .flatten()
    {
        add(AssetKind::Skin, skin.as_str());
    }
    if let Some(mask) = &settings.transition_image {
        add(AssetKind::TransitionMask, mask.as_str());
    }
    if let Some(font) = &settings.custom_font {
        add(AssetKind::Font, font.as_str());
    }

    let mut sources = Vec::new();
    for scene in &project.scenes {
        audio_sources(&scene.commands, &mut sources);
    }
    for group in &project.shared_commands {
        audio_sources(&group.commands, &mut sources);
    }
    for source in sources {
        add(AssetKind::Audio, source);
    }

    refs.into_iter().collect()
}

fn audio_sources<'a>(commands: &'a [Command], out: &mut Vec<&'a str>) {
    for command in commands {
        match &command.kind {
            CommandKind::PlayBgm(params) | CommandKind::PlayBgs(params) => out.push(&params.source),
            CommandKind::PlaySfx(params) => out.push(&params.source),
            CommandKind::Branching { conditions, .. } => {
                for condition in conditions {
                    audio_sources(&condition.commands, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AudioParams, BranchKind, Choice, Operator, SfxParams};
    use crate::project::{Flag, Scene, SharedCommandGroup, Variable};

    fn call(id: &str, target: &str) -> Command {
        Command::new(
            id,
            CommandKind::CallSharedCommand {
                shared_command_id: target.to_string(),
            },
        )
    }

    fn base() -> Project {
        Project {
            flags: vec![Flag {
                id: "f1".to_string(),
                name: "met".to_string(),
                value: false,
            }],
            variables: vec![Variable {
                id: "v1".to_string(),
                name: "trust".to_string(),
                value: 0,
            }],
            scenes: vec![Scene::new("a").with_commands(vec![Command::dialogue("1", "", "hi")])],
            ..Project::default()
        }
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error("场景 0 / 命令 #2", "标志 'x' 未定义").with_detail("setFlag");
        let display = diag.to_string();
        assert!(display.starts_with("[ERROR] 场景 0 / 命令 #2: "));
        assert!(display.contains("\n  | setFlag"));
    }

    #[test]
    fn test_clean_project_has_no_diagnostics() {
        let result = analyze_project(&base());
        assert!(result.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn test_unresolved_names() {
        let mut project = base();
        project.scenes[0].commands = vec![
            Command::new(
                "1",
                CommandKind::SetFlag {
                    flag_name: "gone".to_string(),
                    value: true,
                },
            ),
            Command::choice_dialogue("2", "", "?", vec![Choice::new("x").with_flag("missing", true)]),
            Command::new(
                "3",
                CommandKind::Branching {
                    label: String::new(),
                    conditions: vec![
                        ConditionBranch::variable(BranchKind::If, "nope", Operator::Greater, 1, vec![]),
                        ConditionBranch::otherwise(vec![]),
                    ],
                },
            ),
        ];
        let result = analyze_project(&project);
        assert_eq!(result.error_count(), 3);
        assert!(result.diagnostics[0].message.contains("gone"));
        assert!(result.diagnostics[1].message.contains("missing"));
        assert!(result.diagnostics[2].message.contains("nope"));
        assert_eq!(result.diagnostics[2].location, "场景 0 (a) / 命令 #2");
    }

    #[test]
    fn test_branch_structure_and_flag_operator() {
        let mut project = base();
        project.scenes[0].commands = vec![Command::new(
            "1",
            CommandKind::Branching {
                label: String::new(),
                conditions: vec![
                    ConditionBranch::otherwise(vec![]),
                    ConditionBranch::flag(BranchKind::If, "met", Operator::Greater, true, vec![]),
                ],
            },
        )];
        let result = analyze_project(&project);
        assert_eq!(result.error_count(), 2);
        assert!(result.diagnostics.iter().any(|d| d.message.contains("分支结构")));
        assert!(result.diagnostics.iter().any(|d| d.message.contains("'>'")));
    }

    #[test]
    fn test_scene_targets_and_disabled_goto() {
        let mut project = base();
        let mut disabled = Choice::new("stay");
        disabled.goto = 99;
        project.scenes[0].commands = vec![
            Command::choice_dialogue("1", "", "?", vec![disabled, Choice::new("go").with_goto(5)]),
            Command::new(
                "2",
                CommandKind::Goto {
                    target_scene: 0,
                    use_transition: true,
                },
            ),
        ];
        let result = analyze_project(&project);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.diagnostics[0].detail.as_deref(), Some("选项 1 的目标场景"));
    }

    #[test]
    fn test_shared_dangling_and_cycle_reported_once() {
        let mut project = base();
        project.shared_commands = vec![
            SharedCommandGroup {
                id: "a".to_string(),
                name: "A".to_string(),
                commands: vec![call("1", "b")],
            },
            SharedCommandGroup {
                id: "b".to_string(),
                name: "B".to_string(),
                commands: vec![call("2", "a")],
            },
        ];
        project.scenes[0].commands.push(call("9", "ghost"));

        let result = analyze_project(&project);
        assert_eq!(result.error_count(), 2);
        assert!(result.diagnostics[0].message.contains("ghost"));
        assert!(result.diagnostics[1].message.contains("循环"));
    }

    #[test]
    fn test_duplicates_and_empty_scene() {
        let mut project = base();
        project.flags.push(project.flags[0].clone());
        project.scenes.push(Scene::new("empty"));
        let result = analyze_project(&project);
        assert!(!result.has_errors());
        assert_eq!(result.warn_count(), 1);
        assert_eq!(result.filter_by_level(DiagnosticLevel::Info).len(), 2);
    }

    #[test]
    fn test_collect_asset_references() {
        let mut project = base();
        project.scenes[0].background_id = Some("bg/room".to_string());
        project.scenes[0].character_id = Some("ch/alice".to_string());
        project.settings.message_box_image = Some("skin/box".to_string());
        project.settings.transition_image = Some("mask/wipe".to_string());
        project.scenes[0].commands.push(Command::new(
            "2",
            CommandKind::PlayBgm(AudioParams {
                source: "bgm/theme".to_string(),
                volume: 100,
                pitch: 100,
            }),
        ));
        project.shared_commands.push(SharedCommandGroup {
            id: "g".to_string(),
            name: "G".to_string(),
            commands: vec![Command::new(
                "3",
                CommandKind::PlaySfx(SfxParams {
                    source: "sfx/door".to_string(),
                    volume: 100,
                    pitch: 100,
                    pan: 0,
                }),
            )],
        });

        let refs = collect_asset_references(&project);
        let kinds: Vec<_> = refs.iter().map(|r| (r.kind, r.handle.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (AssetKind::Background, "bg/room"),
                (AssetKind::Character, "ch/alice"),
                (AssetKind::Skin, "skin/box"),
                (AssetKind::TransitionMask, "mask/wipe"),
                (AssetKind::Audio, "bgm/theme"),
                (AssetKind::Audio, "sfx/door"),
            ]
        );
    }
}
