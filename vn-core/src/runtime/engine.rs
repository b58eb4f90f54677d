//! # Engine 模块
//!
//! 场景脚本解释器。
//!
//! ## 执行模型
//!
//! ```text
//! tick(project, input) -> (Vec<Effect>, WaitingReason)
//! ```
//!
//! 1. 检查当前等待状态
//! 2. 根据 input 决定是否解除等待
//! 3. 若不再等待，继续执行脚本直到下一个阻塞点
//! 4. 返回执行过程中产生的 Effect 和新的等待状态
//!
//! 解释器不持有工程：工程由编辑器实时修改，每次推进都以引用传入。

use tracing::{debug, info};

use crate::command::{Command, CommandKind};
use crate::effect::Effect;
use crate::error::RuntimeError;
use crate::input::RuntimeInput;
use crate::project::Project;
use crate::runtime::executor::{set_flag, Executor, Flow};
use crate::state::{ListFrame, RuntimeState, ScriptPosition, StageState, WaitingReason};

/// 单次推进最多执行的命令数
pub const MAX_STEPS_PER_TICK: usize = 10_000;

/// 场景脚本解释器
///
/// # 使用示例
///
/// ```ignore
/// let mut interpreter = Interpreter::new(&project);
/// let (effects, waiting) = interpreter.start(&project)?;
///
/// loop {
///     // Host 处理 effects，重新布局画面...
///     // 根据 waiting 采集输入...
///     let (effects, waiting) = interpreter.tick(&project, Some(input))?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Interpreter {
    /// 运行时状态
    state: RuntimeState,
    /// 命令执行器
    executor: Executor,
    /// 是否已发出过首个场景的进入效果
    started: bool,
}

impl Interpreter {
    /// 创建解释器，定位到场景 0
    pub fn new(project: &Project) -> Self {
        Self {
            state: RuntimeState::new(project),
            executor: Executor::new(),
            started: false,
        }
    }

    /// 从保存的状态恢复
    pub fn restore(state: RuntimeState) -> Self {
        Self {
            state,
            executor: Executor::new(),
            started: true,
        }
    }

    /// 开始执行（首次推进）
    pub fn start(&mut self, project: &Project) -> Result<(Vec<Effect>, WaitingReason), RuntimeError> {
        self.tick(project, None)
    }

    /// 点击推进
    pub fn advance(&mut self, project: &Project) -> Result<(Vec<Effect>, WaitingReason), RuntimeError> {
        self.tick(project, Some(RuntimeInput::Click))
    }

    /// 选择选项
    pub fn resolve_choice(
        &mut self,
        project: &Project,
        index: usize,
    ) -> Result<(Vec<Effect>, WaitingReason), RuntimeError> {
        self.tick(project, Some(RuntimeInput::choice(index)))
    }

    /// 过渡动画结束，执行挂起的场景跳转
    pub fn finish_transition(
        &mut self,
        project: &Project,
    ) -> Result<(Vec<Effect>, WaitingReason), RuntimeError> {
        self.tick(project, Some(RuntimeInput::TransitionFinished))
    }

    /// 核心驱动函数
    ///
    /// 根据输入推进脚本执行，返回产生的 Effect 和新的等待状态。
    /// 执行完毕后再推进不会产生任何效果。
    pub fn tick(
        &mut self,
        project: &Project,
        input: Option<RuntimeInput>,
    ) -> Result<(Vec<Effect>, WaitingReason), RuntimeError> {
        let mut effects = Vec::new();

        if self.state.finished {
            return Ok((effects, WaitingReason::None));
        }

        if !self.started {
            self.started = true;
            self.enter_scene(project, self.state.position.scene_index, &mut effects)?;
        }

        // 1. 处理输入，尝试解除等待
        if let Some(input) = input {
            self.handle_input(project, input, &mut effects)?;
        }

        // 2. 如果仍在等待，直接返回
        if self.state.waiting.is_waiting() {
            return Ok((effects, self.state.waiting.clone()));
        }

        // 3. 继续执行脚本直到阻塞或结束
        self.run(project, &mut effects)?;
        Ok((effects, self.state.waiting.clone()))
    }

    fn run(&mut self, project: &Project, effects: &mut Vec<Effect>) -> Result<(), RuntimeError> {
        for _ in 0..MAX_STEPS_PER_TICK {
            let list = resolve_list(project, &self.state.position)?;
            let index = self.state.position.command_index;

            let Some(command) = list.get(index) else {
                // 子列表结束：回到拥有者之后
                if self.state.position.leave() {
                    continue;
                }
                // 场景结束：进入下一个场景或停机
                let next = self.state.position.scene_index + 1;
                if next < project.scenes.len() {
                    self.enter_scene(project, next, effects)?;
                    continue;
                }
                info!(scene = self.state.position.scene_index, "脚本执行完毕");
                self.state.finished = true;
                effects.push(Effect::Halted);
                return Ok(());
            };

            let result = self
                .executor
                .execute(command, index, &mut self.state, project)?;
            effects.extend(result.effects);

            // 等待时位置停留在当前命令
            if let Some(reason) = result.waiting {
                self.state.wait(reason);
                return Ok(());
            }

            match result.flow {
                Flow::Next => self.state.position.advance(),
                Flow::Enter(frame) => self.state.position.enter(frame),
                Flow::Jump(target) => self.enter_scene(project, target, effects)?,
            }
        }

        Err(RuntimeError::StepLimitExceeded {
            limit: MAX_STEPS_PER_TICK,
        })
    }

    /// 处理输入，解除等待状态
    ///
    /// 与当前等待不匹配的输入被忽略。
    fn handle_input(
        &mut self,
        project: &Project,
        input: RuntimeInput,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RuntimeError> {
        match (&self.state.waiting, input) {
            (WaitingReason::WaitForClick, RuntimeInput::Click) => {
                self.state.clear_wait();
                self.state.position.advance();
                Ok(())
            }

            (
                WaitingReason::WaitForChoice { choice_count },
                RuntimeInput::ChoiceSelected { index },
            ) => {
                if index >= *choice_count {
                    return Err(RuntimeError::InvalidChoiceIndex {
                        index,
                        max: *choice_count,
                    });
                }

                let choice = self
                    .current_command(project)?
                    .choices()
                    .and_then(|choices| choices.get(index))
                    .cloned()
                    .ok_or_else(|| RuntimeError::InvalidPosition {
                        message: "等待选择时当前命令不是带选项的对话".to_string(),
                    })?;
                debug!(index, text = %choice.text, "选择选项");

                if choice.enable_goto {
                    project.check_scene_index(choice.goto)?;
                }
                if let Some((name, value)) = choice.flag_effect() {
                    effects.push(set_flag(&mut self.state, name, value)?);
                }

                if choice.enable_goto {
                    effects.push(Effect::BeginTransition {
                        from_scene: self.state.position.scene_index,
                        to_scene: choice.goto,
                    });
                    self.state.wait(WaitingReason::WaitForTransition {
                        target_scene: choice.goto,
                    });
                } else {
                    self.state.clear_wait();
                    self.state.position.advance();
                }
                Ok(())
            }

            (
                WaitingReason::WaitForTransition { target_scene },
                RuntimeInput::TransitionFinished,
            ) => {
                let target = *target_scene;
                self.state.clear_wait();
                self.enter_scene(project, target, effects)
            }

            (waiting, input) => {
                debug!(?waiting, ?input, "忽略与等待状态不匹配的输入");
                Ok(())
            }
        }
    }

    /// 进入场景：清空子列表路径并按场景定义重置舞台
    fn enter_scene(
        &mut self,
        project: &Project,
        scene_index: usize,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RuntimeError> {
        let scene = project.scene(scene_index)?;
        info!(scene = scene_index, id = %scene.id, "进入场景");
        self.state.position.jump_to_scene(scene_index);
        self.state.stage = StageState::for_scene(scene);
        effects.push(Effect::SceneEntered { scene_index });
        Ok(())
    }

    fn current_command<'a>(&self, project: &'a Project) -> Result<&'a Command, RuntimeError> {
        let list = resolve_list(project, &self.state.position)?;
        list.get(self.state.position.command_index)
            .ok_or_else(|| RuntimeError::InvalidPosition {
                message: format!(
                    "命令索引 {} 超出当前列表长度 {}",
                    self.state.position.command_index,
                    list.len()
                ),
            })
    }

    /// 当前活动命令
    ///
    /// 只有处于等待状态时才有活动命令（对话、选项或过渡中的跳转）。
    pub fn active_command<'a>(
        &self,
        project: &'a Project,
    ) -> Result<Option<&'a Command>, RuntimeError> {
        if !self.state.waiting.is_waiting() || self.state.finished {
            return Ok(None);
        }
        self.current_command(project).map(Some)
    }

    /// 活动命令之后是否还有内容（决定是否显示推进箭头）
    pub fn has_following_content(&self, project: &Project) -> bool {
        if self.state.finished {
            return false;
        }
        let position = &self.state.position;
        let mut scratch = position.clone();

        // 从最内层向外逐层检查
        let mut index = position.command_index;
        for depth in (0..=position.frames.len()).rev() {
            scratch.frames.truncate(depth);
            match resolve_list(project, &scratch) {
                Ok(list) if index + 1 < list.len() => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
            if depth > 0 {
                index = position.frames[depth - 1].owner_index();
            }
        }
        position.scene_index + 1 < project.scenes.len()
    }

    /// 获取当前状态（用于存档）
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// 获取当前等待状态
    pub fn waiting(&self) -> &WaitingReason {
        &self.state.waiting
    }

    /// 当前场景索引
    pub fn scene_index(&self) -> usize {
        self.state.position.scene_index
    }

    /// 检查脚本是否执行完毕
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }
}

/// 沿子列表路径解析当前命令列表
///
/// 工程在暂停期间被修改导致路径无法解析时返回 `InvalidPosition`。
pub fn resolve_list<'a>(
    project: &'a Project,
    position: &ScriptPosition,
) -> Result<&'a [Command], RuntimeError> {
    let mut list: &'a [Command] = &project.scene(position.scene_index)?.commands;

    for frame in &position.frames {
        let owner = list
            .get(frame.owner_index())
            .ok_or_else(|| RuntimeError::InvalidPosition {
                message: format!("子列表拥有者索引 {} 已不存在", frame.owner_index()),
            })?;
        list = match (frame, &owner.kind) {
            (
                ListFrame::Branch {
                    condition_index, ..
                },
                CommandKind::Branching { conditions, .. },
            ) => &conditions
                .get(*condition_index)
                .ok_or_else(|| RuntimeError::InvalidPosition {
                    message: format!("分支 {} 已不存在", condition_index),
                })?
                .commands,
            (
                ListFrame::Shared { group_id, .. },
                CommandKind::CallSharedCommand { shared_command_id },
            ) if shared_command_id == group_id => &project.shared_group(group_id)?.commands,
            _ => {
                return Err(RuntimeError::InvalidPosition {
                    message: format!("命令 '{}' 已不是子列表的拥有者", owner.id),
                });
            }
        };
    }
    Ok(list)
}
