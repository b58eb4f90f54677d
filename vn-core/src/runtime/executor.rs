//! # Executor 模块
//!
//! 执行单条脚本命令。
//!
//! ## 职责
//!
//! - 读取 Command
//! - 修改运行时状态（标志、变量、舞台）
//! - 产生对应的 Effect
//! - 决定是否需要等待、进入子列表或跳转场景

use tracing::debug;

use crate::audio::{AudioChannel, AudioCommand};
use crate::command::{Command, CommandKind, FrameAnimation};
use crate::condition::select_branch;
use crate::effect::{Effect, StageLayer, VisibilityChange};
use crate::error::{ReferenceKind, RuntimeError};
use crate::project::Project;
use crate::runtime::expand::check_shared_group;
use crate::state::{ListFrame, RuntimeState, WaitingReason};

/// 执行后的控制流
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// 前进到下一条命令
    Next,
    /// 进入子列表（分支体或共享命令组）
    Enter(ListFrame),
    /// 跳转到场景开头
    Jump(usize),
}

/// 执行结果
#[derive(Debug)]
pub struct ExecuteResult {
    /// 产生的效果
    pub effects: Vec<Effect>,
    /// 等待原因（如果需要等待；此时位置停留在当前命令）
    pub waiting: Option<WaitingReason>,
    /// 后续控制流
    pub flow: Flow,
}

impl ExecuteResult {
    fn next(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            waiting: None,
            flow: Flow::Next,
        }
    }

    fn with_wait(effects: Vec<Effect>, waiting: WaitingReason) -> Self {
        Self {
            effects,
            waiting: Some(waiting),
            flow: Flow::Next,
        }
    }

    fn with_flow(flow: Flow) -> Self {
        Self {
            effects: Vec::new(),
            waiting: None,
            flow,
        }
    }
}

/// 命令执行器
///
/// 不缓存共享命令组的检查结果：工程可能在两次推进之间被编辑。
#[derive(Debug, Clone, Default)]
pub struct Executor;

impl Executor {
    /// 创建新的执行器
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行单条命令
    ///
    /// `command_index` 是命令在当前列表中的索引，用于构造子列表帧。
    pub fn execute(
        &self,
        command: &Command,
        command_index: usize,
        state: &mut RuntimeState,
        project: &Project,
    ) -> Result<ExecuteResult, RuntimeError> {
        debug!(
            scene = state.position.scene_index,
            depth = state.position.depth(),
            index = command_index,
            id = %command.id,
            "执行命令"
        );

        match &command.kind {
            CommandKind::Dialogue {
                speaker,
                text,
                choices,
            } => {
                let mut effects = vec![Effect::dialogue(speaker, text)];
                if choices.is_empty() {
                    Ok(ExecuteResult::with_wait(effects, WaitingReason::WaitForClick))
                } else {
                    effects.push(Effect::PresentChoices {
                        choices: choices.iter().map(|c| c.text.clone()).collect(),
                    });
                    Ok(ExecuteResult::with_wait(
                        effects,
                        WaitingReason::choice(choices.len()),
                    ))
                }
            }

            CommandKind::Branching { conditions, .. } => {
                match select_branch(conditions, &*state)? {
                    Some(condition_index) => Ok(ExecuteResult::with_flow(Flow::Enter(
                        ListFrame::Branch {
                            command_index,
                            condition_index,
                        },
                    ))),
                    None => Ok(ExecuteResult::next(Vec::new())),
                }
            }

            CommandKind::SetFlag { flag_name, value } => {
                set_flag(state, flag_name, *value).map(|e| ExecuteResult::next(vec![e]))
            }

            CommandKind::SetVariable {
                variable_name,
                operation,
                value,
            } => {
                let slot = state.variables.get_mut(variable_name).ok_or_else(|| {
                    RuntimeError::UnresolvedReference {
                        kind: ReferenceKind::Variable,
                        name: variable_name.clone(),
                    }
                })?;
                *slot = operation.apply(*slot, *value);
                Ok(ExecuteResult::next(vec![Effect::VariableChanged {
                    name: variable_name.clone(),
                    value: *slot,
                }]))
            }

            CommandKind::CallSharedCommand { shared_command_id } => {
                check_shared_group(project, shared_command_id)?;
                Ok(ExecuteResult::with_flow(Flow::Enter(ListFrame::Shared {
                    command_index,
                    group_id: shared_command_id.clone(),
                })))
            }

            CommandKind::Goto {
                target_scene,
                use_transition,
            } => {
                project.check_scene_index(*target_scene)?;
                if *use_transition {
                    Ok(ExecuteResult::with_wait(
                        vec![Effect::BeginTransition {
                            from_scene: state.position.scene_index,
                            to_scene: *target_scene,
                        }],
                        WaitingReason::WaitForTransition {
                            target_scene: *target_scene,
                        },
                    ))
                } else {
                    Ok(ExecuteResult::with_flow(Flow::Jump(*target_scene)))
                }
            }

            CommandKind::PlayBgm(params) => Ok(audio(AudioCommand::play(AudioChannel::Bgm, params))),
            CommandKind::StopBgm => Ok(audio(AudioCommand::Stop {
                channel: AudioChannel::Bgm,
            })),
            CommandKind::FadeBgm(params) => Ok(audio(AudioCommand::fade(AudioChannel::Bgm, params))),
            CommandKind::PlayBgs(params) => Ok(audio(AudioCommand::play(AudioChannel::Bgs, params))),
            CommandKind::StopBgs => Ok(audio(AudioCommand::Stop {
                channel: AudioChannel::Bgs,
            })),
            CommandKind::FadeBgs(params) => Ok(audio(AudioCommand::fade(AudioChannel::Bgs, params))),
            CommandKind::PlaySfx(params) => Ok(audio(AudioCommand::sfx(params))),

            CommandKind::ShowCharacter { fade_ms, animation } => {
                state.stage.character_visible = true;
                state.stage.character_animation = *animation;
                Ok(visibility(StageLayer::Character, true, *fade_ms, *animation))
            }
            CommandKind::HideCharacter { fade_ms } => {
                state.stage.character_visible = false;
                Ok(visibility(StageLayer::Character, false, *fade_ms, None))
            }
            CommandKind::ShowBackground { fade_ms } => {
                state.stage.background_visible = true;
                Ok(visibility(StageLayer::Background, true, *fade_ms, None))
            }
            CommandKind::HideBackground { fade_ms } => {
                state.stage.background_visible = false;
                Ok(visibility(StageLayer::Background, false, *fade_ms, None))
            }
        }
    }
}

/// 写入标志，名称不存在时报错
pub(crate) fn set_flag(
    state: &mut RuntimeState,
    name: &str,
    value: bool,
) -> Result<Effect, RuntimeError> {
    let slot = state
        .flags
        .get_mut(name)
        .ok_or_else(|| RuntimeError::UnresolvedReference {
            kind: ReferenceKind::Flag,
            name: name.to_string(),
        })?;
    *slot = value;
    Ok(Effect::FlagChanged {
        name: name.to_string(),
        value,
    })
}

fn audio(command: AudioCommand) -> ExecuteResult {
    ExecuteResult::next(vec![Effect::Audio(command)])
}

fn visibility(
    layer: StageLayer,
    visible: bool,
    fade_ms: u32,
    animation: Option<FrameAnimation>,
) -> ExecuteResult {
    ExecuteResult::next(vec![Effect::Visibility(VisibilityChange {
        layer,
        visible,
        fade_ms,
        animation,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AudioParams, VariableOp};
    use crate::project::{Flag, Scene, Variable};

    fn test_project() -> Project {
        Project {
            flags: vec![Flag {
                id: "f".to_string(),
                name: "met".to_string(),
                value: false,
            }],
            variables: vec![Variable {
                id: "v".to_string(),
                name: "hp".to_string(),
                value: 250,
            }],
            scenes: vec![Scene::new("s0"), Scene::new("s1")],
            ..Project::default()
        }
    }

    fn run(command: CommandKind) -> (Result<ExecuteResult, RuntimeError>, RuntimeState) {
        let project = test_project();
        let mut state = RuntimeState::new(&project);
        let result = Executor::new().execute(&Command::new("c", command), 3, &mut state, &project);
        (result, state)
    }

    #[test]
    fn test_dialogue_waits() {
        let (result, _) = run(CommandKind::Dialogue {
            speaker: "A".to_string(),
            text: "hi".to_string(),
            choices: vec![],
        });
        let result = result.unwrap();
        assert_eq!(result.waiting, Some(WaitingReason::WaitForClick));
        assert_eq!(result.effects.len(), 1);
    }

    #[test]
    fn test_set_variable_saturates() {
        let (result, state) = run(CommandKind::SetVariable {
            variable_name: "hp".to_string(),
            operation: VariableOp::Add,
            value: 20,
        });
        assert!(result.is_ok());
        assert_eq!(state.variables["hp"], 255);
    }

    #[test]
    fn test_set_unknown_flag_is_error() {
        let (result, _) = run(CommandKind::SetFlag {
            flag_name: "metAlice".to_string(),
            value: true,
        });
        assert!(matches!(
            result,
            Err(RuntimeError::UnresolvedReference {
                kind: ReferenceKind::Flag,
                ..
            })
        ));
    }

    #[test]
    fn test_goto_out_of_range() {
        let (result, _) = run(CommandKind::Goto {
            target_scene: 2,
            use_transition: false,
        });
        assert!(matches!(
            result,
            Err(RuntimeError::SceneIndexOutOfRange {
                index: 2,
                scene_count: 2
            })
        ));
    }

    #[test]
    fn test_goto_flows() {
        let (result, _) = run(CommandKind::Goto {
            target_scene: 1,
            use_transition: false,
        });
        assert_eq!(result.unwrap().flow, Flow::Jump(1));

        let (result, _) = run(CommandKind::Goto {
            target_scene: 1,
            use_transition: true,
        });
        let result = result.unwrap();
        assert_eq!(
            result.waiting,
            Some(WaitingReason::WaitForTransition { target_scene: 1 })
        );
    }

    #[test]
    fn test_call_enters_shared_frame() {
        let mut project = test_project();
        project.shared_commands.push(crate::project::SharedCommandGroup {
            id: "g".to_string(),
            name: String::new(),
            commands: vec![],
        });
        let mut state = RuntimeState::new(&project);
        let executor = Executor::new();
        let call = Command::new(
            "c",
            CommandKind::CallSharedCommand {
                shared_command_id: "g".to_string(),
            },
        );
        let result = executor.execute(&call, 5, &mut state, &project).unwrap();
        assert_eq!(
            result.flow,
            Flow::Enter(ListFrame::Shared {
                command_index: 5,
                group_id: "g".to_string()
            })
        );

        // 组被改成自调用后，同一个执行器再次调用必须报环
        project.shared_commands[0].commands.push(call.clone());
        assert!(matches!(
            executor.execute(&call, 5, &mut state, &project),
            Err(RuntimeError::CyclicSharedCommand { .. })
        ));
    }

    #[test]
    fn test_hide_character_updates_stage() {
        let (result, state) = run(CommandKind::HideCharacter { fade_ms: 200 });
        assert!(!state.stage.character_visible);
        assert!(matches!(
            &result.unwrap().effects[0],
            Effect::Visibility(VisibilityChange { layer: StageLayer::Character, visible: false, fade_ms: 200, .. })
        ));
    }

    #[test]
    fn test_audio_falls_through() {
        let (result, _) = run(CommandKind::PlayBgm(AudioParams {
            source: "bgm".to_string(),
            volume: 100,
            pitch: 100,
        }));
        let result = result.unwrap();
        assert_eq!(result.flow, Flow::Next);
        assert!(result.waiting.is_none());
    }
}
